use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, FileListResponse};
use crate::services::VaultService;
use crate::AppState;

/// List the caller's images, newest first
/// GET /api/images
pub async fn list_images(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<FileListResponse>>> {
    let files = VaultService::list(&state.db, &current_user.auth_subject).await?;
    Ok(Json(ApiResponse::success(FileListResponse { files })))
}

/// Serve a decrypted image
/// GET /api/image/:cid
pub async fn get_image(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(cid): Path<String>,
) -> Result<Response> {
    let (record, plaintext) = VaultService::fetch(
        &state.db,
        state.blobs.as_ref(),
        &state.codec,
        &current_user.auth_subject,
        &cid,
    )
    .await?;

    let content_type = if record.mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        record.mime_type
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, plaintext.len())
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(plaintext))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Delete an image from the caller's collection
/// DELETE /api/image/:cid
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(cid): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    VaultService::delete(
        &state.db,
        state.blobs.as_ref(),
        &current_user.auth_subject,
        &cid,
    )
    .await?;

    Ok(Json(ApiResponse::<()>::success_message("Image deleted")))
}
