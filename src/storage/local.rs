use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::provider::is_valid_content_id;
use crate::storage::BlobStore;

/// Content-addressed store on the local file system.
///
/// Content id is the hex SHA-256 of the stored bytes; files live under
/// `<base>/<first two chars>/<id>`.
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn get_full_path(&self, content_id: &str) -> PathBuf {
        self.base_path.join(&content_id[..2]).join(content_id)
    }

    fn content_id_for(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn check_id(content_id: &str) -> Result<()> {
        if content_id.len() != 64 || !is_valid_content_id(content_id) {
            return Err(AppError::UpstreamUnavailable(format!(
                "Invalid content id: {}",
                content_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<String> {
        let content_id = Self::content_id_for(&data);
        let full_path = self.get_full_path(&content_id);

        if fs::try_exists(&full_path).await? {
            tracing::debug!("Blob {} already stored", content_id);
            return Ok(content_id);
        }

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write under a temp name first so a partial write never carries the id
        let tmp_path = full_path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&tmp_path, &full_path).await?;

        tracing::debug!("Stored {} ({} bytes) as {}", name, data.len(), content_id);
        Ok(content_id)
    }

    async fn get(&self, content_id: &str) -> Result<Bytes> {
        Self::check_id(content_id)?;
        let full_path = self.get_full_path(content_id);

        let data = fs::read(&full_path).await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to read blob {}: {}", content_id, e))
        })?;

        Ok(Bytes::from(data))
    }

    async fn unpin(&self, content_id: &str) -> Result<()> {
        Self::check_id(content_id)?;
        let full_path = self.get_full_path(content_id);

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn store_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let cid = store.put("a.bin", Bytes::from_static(b"ciphertext")).await.unwrap();
        assert_eq!(cid.len(), 64);
        assert_eq!(store.get(&cid).await.unwrap(), Bytes::from_static(b"ciphertext"));
    }

    #[tokio::test]
    async fn test_content_id_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let a = store.put("a", Bytes::from_static(b"same")).await.unwrap();
        let b = store.put("b", Bytes::from_static(b"same")).await.unwrap();
        let c = store.put("c", Bytes::from_static(b"different")).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_unknown_id_is_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let err = store.get(&"0".repeat(64)).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));

        let err = store.get("../../secret").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unpin_removes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let cid = store.put("a", Bytes::from_static(b"bytes")).await.unwrap();
        store.unpin(&cid).await.unwrap();
        assert!(store.get(&cid).await.is_err());

        // Second unpin is a no-op
        store.unpin(&cid).await.unwrap();
    }
}
