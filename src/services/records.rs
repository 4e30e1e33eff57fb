use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, FileRecordRow};

/// Per-user file records.
///
/// Lookups never leave the caller's own collection: a content id owned by
/// someone else resolves exactly like one that does not exist.
pub struct FileRecordService;

impl FileRecordService {
    /// Append a record to the user's collection
    pub async fn create_record(db: &Database, user_id: &str, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_records (user_id, content_id, iv, mime_type, original_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&record.content_id)
        .bind(record.iv_hex())
        .bind(&record.mime_type)
        .bind(&record.original_name)
        .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(db.pool())
        .await?;

        tracing::debug!("Recorded {} for user {}", record.content_id, user_id);
        Ok(())
    }

    /// Load the user's whole collection in insertion order
    pub async fn load_records(db: &Database, user_id: &str) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRecordRow> = sqlx::query_as(
            "SELECT id, content_id, iv, mime_type, original_name, created_at \
             FROM file_records WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;

        rows.into_iter().map(Self::from_row).collect()
    }

    /// Linear search within an already loaded collection
    pub fn find_record(records: Vec<FileRecord>, content_id: &str) -> Option<FileRecord> {
        records.into_iter().find(|r| r.content_id == content_id)
    }

    /// Resolve a content id within the user's own collection
    pub async fn resolve(db: &Database, user_id: &str, content_id: &str) -> Result<FileRecord> {
        let records = Self::load_records(db, user_id).await?;
        Self::find_record(records, content_id)
            .ok_or_else(|| AppError::NotFound("File not found or access denied".to_string()))
    }

    /// All of the user's records, newest first
    pub async fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<FileRecord>> {
        let mut records = Self::load_records(db, user_id).await?;
        // Stable sort: equal timestamps keep insertion order
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Remove a record from the user's own collection
    pub async fn delete_record(db: &Database, user_id: &str, content_id: &str) -> Result<FileRecord> {
        let record = Self::resolve(db, user_id, content_id).await?;

        sqlx::query("DELETE FROM file_records WHERE user_id = ? AND content_id = ?")
            .bind(user_id)
            .bind(content_id)
            .execute(db.pool())
            .await?;

        tracing::debug!("Removed {} from user {}", content_id, user_id);
        Ok(record)
    }

    fn from_row(row: FileRecordRow) -> Result<FileRecord> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| {
                AppError::Internal(format!("Bad created_at on file record {}: {}", row.id, e))
            })?
            .with_timezone(&Utc);

        FileRecord::from_parts(
            row.content_id,
            &row.iv,
            row.mime_type,
            row.original_name,
            created_at,
        )
        .map_err(|e| AppError::Internal(format!("Bad iv on file record {}: {}", row.id, e)))
    }
}
