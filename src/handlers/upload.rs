use axum::{
    extract::{Multipart, State},
    Extension, Json,
};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, FileRecord};
use crate::services::{PlainUpload, VaultService};
use crate::AppState;

/// Upload an image
/// POST /api/upload
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileRecord>>> {
    let mut upload: Option<PlainUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to process multipart: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .filter(|s| !s.is_empty())
            .unwrap_or("upload")
            .to_string();
        // Clients that omit the part's content type get one guessed from the name
        let mime_type = match field.content_type() {
            Some(ct) => ct.to_string(),
            None => mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;

        upload = Some(PlainUpload {
            name,
            mime_type,
            data,
        });
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let record = VaultService::upload(
        &state.db,
        state.blobs.as_ref(),
        &state.codec,
        &current_user.auth_subject,
        upload,
    )
    .await?;

    Ok(Json(ApiResponse::success(record)))
}
