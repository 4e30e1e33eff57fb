use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;

use crate::error::{ApiResponse, AppError, Result};
use crate::services::{UserService, WebhookAction, WebhookService};
use crate::AppState;

/// Identity provider webhook
/// POST /api/webhooks/identity
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<()>>> {
    let secret = state
        .config
        .auth
        .webhook_signing_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Internal("Webhook signing secret not configured".to_string()))?;

    WebhookService::verify(secret, &headers, &body, Utc::now().timestamp())?;

    match WebhookService::parse(&body)? {
        WebhookAction::SyncUser(sync) => {
            let user = UserService::upsert(&state.db, &sync).await?;
            tracing::info!("Synced user {} ({})", user.auth_subject, user.id);
        }
        WebhookAction::Ignore(event_type) => {
            tracing::debug!("Ignoring webhook event {}", event_type);
        }
    }

    Ok(Json(ApiResponse::<()>::success_message("Webhook processed")))
}
