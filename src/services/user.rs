use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{User, UserSync};

/// User service
pub struct UserService;

impl UserService {
    /// Find a user by the identity provider's subject id
    pub async fn find_by_subject(db: &Database, auth_subject: &str) -> Result<Option<User>> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE auth_subject = ?")
            .bind(auth_subject)
            .fetch_optional(db.pool())
            .await?;

        Ok(user)
    }

    /// Get a user by subject id, failing when it was never synced
    pub async fn get_by_subject(db: &Database, auth_subject: &str) -> Result<User> {
        Self::find_by_subject(db, auth_subject)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Create or update a user from identity provider data
    pub async fn upsert(db: &Database, sync: &UserSync) -> Result<User> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, auth_subject, email, first_name, last_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(auth_subject) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sync.auth_subject)
        .bind(&sync.email)
        .bind(&sync.first_name)
        .bind(&sync.last_name)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                AppError::BadRequest("Email already registered to another account".to_string())
            }
            _ => AppError::Database(e),
        })?;

        tracing::info!("Synced user {}", sync.auth_subject);
        Self::get_by_subject(db, &sync.auth_subject).await
    }
}
