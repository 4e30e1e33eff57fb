use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::crypto::{Iv, IvError};

/// An encrypted file owned by one user.
///
/// The IV travels with the record, never with the ciphertext. It serializes as
/// 32 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    #[serde(rename = "cid")]
    pub content_id: String,
    pub iv: Iv,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        content_id: impl Into<String>,
        iv: Iv,
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            iv,
            mime_type: mime_type.into(),
            original_name: original_name.into(),
            created_at,
        }
    }

    /// Build from a stored hex IV, rejecting anything that is not 16 bytes.
    pub fn from_parts(
        content_id: String,
        iv_hex: &str,
        mime_type: String,
        original_name: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, IvError> {
        let iv = Iv::from_hex(iv_hex)?;
        Ok(Self::new(content_id, iv, mime_type, original_name, created_at))
    }

    pub fn iv_hex(&self) -> String {
        self.iv.to_hex()
    }
}

/// Row in the `file_records` table
#[derive(Debug, Clone, FromRow)]
pub struct FileRecordRow {
    pub id: i64,
    pub content_id: String,
    pub iv: String,
    pub mime_type: String,
    pub original_name: String,
    pub created_at: String,
}

/// File list response
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
}
