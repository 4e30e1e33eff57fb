use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Content-addressed blob store.
///
/// The content id returned by `put` is a deterministic function of the bytes
/// submitted. Possessing the id is enough to fetch the bytes, so callers must
/// authorize access before calling `get`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content id
    async fn put(&self, name: &str, data: Bytes) -> Result<String>;

    /// Fetch the bytes stored under a content id
    async fn get(&self, content_id: &str) -> Result<Bytes>;

    /// Release the content; best effort, the bytes may stay reachable
    async fn unpin(&self, content_id: &str) -> Result<()>;

    /// Get the store type name
    fn store_type(&self) -> &'static str;
}

/// Reject ids that could escape a path or URL segment
pub(crate) fn is_valid_content_id(content_id: &str) -> bool {
    !content_id.is_empty()
        && content_id.len() <= 128
        && content_id.chars().all(|c| c.is_ascii_alphanumeric())
}
