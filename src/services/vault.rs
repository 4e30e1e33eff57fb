use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::crypto::EnvelopeCodec;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::FileRecord;
use crate::services::{FileRecordService, UserService};
use crate::storage::BlobStore;

/// A file received from the client, still in plaintext
#[derive(Debug)]
pub struct PlainUpload {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Upload and retrieval paths tying the codec, blob store and records together
pub struct VaultService;

impl VaultService {
    /// Encrypt, pin and record an uploaded image.
    ///
    /// The record is written only after the blob store accepted the ciphertext.
    pub async fn upload(
        db: &Database,
        blobs: &dyn BlobStore,
        codec: &EnvelopeCodec,
        auth_subject: &str,
        upload: PlainUpload,
    ) -> Result<FileRecord> {
        // MIME types compare case-insensitively
        let mime_type = upload.mime_type.trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(AppError::BadRequest(format!(
                "Only images can be uploaded, got {}",
                upload.mime_type
            )));
        }

        let user = UserService::get_by_subject(db, auth_subject).await?;

        let envelope = codec.encrypt(&upload.data);
        let blob_name = format!("{}.enc", Uuid::new_v4());
        let content_id = blobs
            .put(&blob_name, Bytes::from(envelope.ciphertext))
            .await?;

        let record = FileRecord::new(
            content_id,
            envelope.iv,
            mime_type,
            upload.name,
            Utc::now(),
        );
        FileRecordService::create_record(db, &user.id, &record).await?;

        tracing::info!(
            "Stored {} ({} bytes) for {} as {}",
            record.original_name,
            upload.data.len(),
            auth_subject,
            record.content_id
        );
        Ok(record)
    }

    /// List the caller's records; a caller never synced has none
    pub async fn list(db: &Database, auth_subject: &str) -> Result<Vec<FileRecord>> {
        match UserService::find_by_subject(db, auth_subject).await? {
            Some(user) => FileRecordService::list_for_user(db, &user.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Resolve, fetch and decrypt one of the caller's files
    pub async fn fetch(
        db: &Database,
        blobs: &dyn BlobStore,
        codec: &EnvelopeCodec,
        auth_subject: &str,
        content_id: &str,
    ) -> Result<(FileRecord, Vec<u8>)> {
        let user = UserService::get_by_subject(db, auth_subject).await?;
        let record = FileRecordService::resolve(db, &user.id, content_id).await?;

        let ciphertext = blobs.get(&record.content_id).await?;

        let plaintext = codec
            .decrypt(&ciphertext, record.iv.as_bytes())
            .map_err(|e| {
                tracing::warn!("Decryption of {} failed: {}", record.content_id, e);
                AppError::DecryptionFailed(e)
            })?;

        Ok((record, plaintext))
    }

    /// Drop the caller's record, then ask the blob store to unpin.
    ///
    /// Unpin failures are logged only; the record removal is what counts.
    pub async fn delete(
        db: &Database,
        blobs: &dyn BlobStore,
        auth_subject: &str,
        content_id: &str,
    ) -> Result<()> {
        let user = UserService::get_by_subject(db, auth_subject).await?;
        let record = FileRecordService::delete_record(db, &user.id, content_id).await?;

        if let Err(e) = blobs.unpin(&record.content_id).await {
            tracing::warn!("Failed to unpin {} from {}: {}", record.content_id, blobs.store_type(), e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CodecError;
    use crate::models::UserSync;
    use crate::storage::LocalBlobStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that rejects every write and read
    struct DownStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for DownStore {
        async fn put(&self, _name: &str, _data: Bytes) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::UpstreamUnavailable("down".into()))
        }

        async fn get(&self, _content_id: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::UpstreamUnavailable("down".into()))
        }

        async fn unpin(&self, _content_id: &str) -> Result<()> {
            Err(AppError::UpstreamUnavailable("down".into()))
        }

        fn store_type(&self) -> &'static str {
            "down"
        }
    }

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::from_secret("vault-test-secret-0123456789abcdef").unwrap()
    }

    fn image(data: &'static [u8]) -> PlainUpload {
        PlainUpload {
            name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            data: Bytes::from_static(data),
        }
    }

    async fn setup() -> (Database, tempfile::TempDir, LocalBlobStore) {
        let db = Database::in_memory().await.unwrap();
        for subject in ["user_alice", "user_bob"] {
            UserService::upsert(
                &db,
                &UserSync {
                    auth_subject: subject.to_string(),
                    email: format!("{}@example.com", subject),
                    first_name: None,
                    last_name: None,
                },
            )
            .await
            .unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        (db, dir, store)
    }

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let (db, _dir, store) = setup().await;
        let codec = codec();

        let record = VaultService::upload(&db, &store, &codec, "user_alice", image(b"hello-img!"))
            .await
            .unwrap();
        assert_eq!(record.iv_hex().len(), 32);
        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.original_name, "cat.png");

        // The store holds ciphertext, not the image
        let stored = store.get(&record.content_id).await.unwrap();
        assert_eq!(stored.len(), 16);
        assert_ne!(&stored[..], b"hello-img!");

        let (fetched, plaintext) =
            VaultService::fetch(&db, &store, &codec, "user_alice", &record.content_id)
                .await
                .unwrap();
        assert_eq!(fetched, record);
        assert_eq!(plaintext, b"hello-img!");
    }

    #[tokio::test]
    async fn test_repeat_upload_gets_new_content_id() {
        let (db, _dir, store) = setup().await;
        let codec = codec();

        let a = VaultService::upload(&db, &store, &codec, "user_alice", image(b"same"))
            .await
            .unwrap();
        let b = VaultService::upload(&db, &store, &codec, "user_alice", image(b"same"))
            .await
            .unwrap();

        assert_ne!(a.content_id, b.content_id);
        assert_ne!(a.iv, b.iv);
        assert_eq!(VaultService::list(&db, "user_alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_both_recorded() {
        let (db, _dir, store) = setup().await;
        let codec = codec();

        let (a, b) = tokio::join!(
            VaultService::upload(&db, &store, &codec, "user_alice", image(b"first")),
            VaultService::upload(&db, &store, &codec, "user_alice", image(b"second")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.content_id, b.content_id);

        let listed = VaultService::list(&db, "user_alice").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|r| r.content_id == a.content_id));
        assert!(listed.iter().any(|r| r.content_id == b.content_id));
    }

    #[tokio::test]
    async fn test_fetch_from_unavailable_store() {
        let (db, _dir, store) = setup().await;
        let record = VaultService::upload(&db, &store, &codec(), "user_alice", image(b"x"))
            .await
            .unwrap();

        let down = DownStore {
            calls: AtomicUsize::new(0),
        };
        let err = VaultService::fetch(&db, &down, &codec(), "user_alice", &record.content_id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mime_type_case_insensitive() {
        let (db, _dir, store) = setup().await;
        let upload = PlainUpload {
            name: "cat.png".to_string(),
            mime_type: "Image/PNG".to_string(),
            data: Bytes::from_static(b"pixels"),
        };

        let record = VaultService::upload(&db, &store, &codec(), "user_alice", upload)
            .await
            .unwrap();
        assert_eq!(record.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_other_user_cannot_fetch() {
        let (db, _dir, store) = setup().await;
        let codec = codec();

        let record = VaultService::upload(&db, &store, &codec, "user_alice", image(b"private"))
            .await
            .unwrap();

        let err = VaultService::fetch(&db, &store, &codec, "user_bob", &record.content_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_record() {
        let (db, _dir, _store) = setup().await;
        let store = DownStore {
            calls: AtomicUsize::new(0),
        };

        let err = VaultService::upload(&db, &store, &codec(), "user_alice", image(b"x"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(VaultService::list(&db, "user_alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_key_is_decryption_failure() {
        let (db, _dir, store) = setup().await;

        let record = VaultService::upload(&db, &store, &codec(), "user_alice", image(b"pixels"))
            .await
            .unwrap();

        let other = EnvelopeCodec::new([0x11; 32]);
        match VaultService::fetch(&db, &store, &other, "user_alice", &record.content_id).await {
            Err(AppError::DecryptionFailed(CodecError::Decryption(_))) => {}
            // Garbage that happens to carry valid padding is still not the original
            Ok((_, plaintext)) => assert_ne!(plaintext, b"pixels"),
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_image_rejected() {
        let (db, _dir, store) = setup().await;
        let upload = PlainUpload {
            name: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            data: Bytes::from_static(b"hi"),
        };

        let err = VaultService::upload(&db, &store, &codec(), "user_alice", upload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_unsynced_user() {
        let (db, _dir, store) = setup().await;

        assert!(VaultService::list(&db, "user_ghost").await.unwrap().is_empty());
        let err = VaultService::upload(&db, &store, &codec(), "user_ghost", image(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_survives_unpin_failure() {
        let (db, _dir, store) = setup().await;
        let record = VaultService::upload(&db, &store, &codec(), "user_alice", image(b"x"))
            .await
            .unwrap();

        let down = DownStore {
            calls: AtomicUsize::new(0),
        };
        VaultService::delete(&db, &down, "user_alice", &record.content_id)
            .await
            .unwrap();

        assert!(VaultService::list(&db, "user_alice").await.unwrap().is_empty());
        let err = VaultService::delete(&db, &store, "user_alice", &record.content_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
