//! Upload Handler
//!
//! Multipart upload of one `file` field. The returned URL is what clients put
//! in a message's `attachment_url`.

use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::application::dto::UploadResponse;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read file", e))?;

        let stored = state.storage.store(&file_name, &content_type, &bytes).await?;
        info!(user_id = auth.user_id, url = %stored.url, size = stored.size, "File uploaded");
        return Ok((StatusCode::CREATED, Json(stored.into())));
    }

    Err(AppError::BadRequest("No file provided".into()))
}

/// A body over the request size limit is reported as 413, like an oversized
/// file the storage rejects.
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{}: {}", context, err.body_text()))
    } else {
        AppError::BadRequest(format!("{}: {}", context, err.body_text()))
    }
}
