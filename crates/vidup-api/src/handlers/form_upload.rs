//! Single-request multipart uploads.
//!
//! The storage target comes from the route, not from client metadata.

use crate::error::{ErrorResponse, HttpAppError};
use crate::services::upload::gateway::NO_FILE_MESSAGE;
use crate::state::UploadState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use vidup_core::{AppError, StorageLocation, StorageTarget};
use vidup_storage::keys::DEFAULT_CONTENT_TYPE;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormUploadResponse {
    pub message: String,
    /// Generated name the video is stored under
    pub file_name: String,
    pub location: StorageLocation,
}

/// Upload a video to the local videos directory
#[utoipa::path(
    post,
    path = "/video/upload/form-data/local",
    tag = "form-upload",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video stored locally", body = FormUploadResponse),
        (status = 400, description = "No file was uploaded", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn upload_form_local(
    State(uploads): State<UploadState>,
    multipart: Multipart,
) -> Result<Json<FormUploadResponse>, HttpAppError> {
    upload_form(uploads, StorageTarget::Local, multipart).await
}

/// Upload a video to the configured S3 bucket
#[utoipa::path(
    post,
    path = "/video/upload/form-data/s3",
    tag = "form-upload",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video stored in S3", body = FormUploadResponse),
        (status = 400, description = "No file was uploaded", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "S3 not configured or upload failed", body = ErrorResponse)
    )
)]
pub async fn upload_form_s3(
    State(uploads): State<UploadState>,
    multipart: Multipart,
) -> Result<Json<FormUploadResponse>, HttpAppError> {
    upload_form(uploads, StorageTarget::Remote, multipart).await
}

async fn upload_form(
    uploads: UploadState,
    target: StorageTarget,
    mut multipart: Multipart,
) -> Result<Json<FormUploadResponse>, HttpAppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(String::from);
        // A generic part type says nothing; let the extension decide instead
        let content_type = field
            .content_type()
            .filter(|ct| *ct != DEFAULT_CONTENT_TYPE)
            .map(String::from);

        let artifact = uploads
            .gateway
            .upload_single(filename, content_type, target, field)
            .await?;

        let message = match target {
            StorageTarget::Local => "Video uploaded successfully",
            StorageTarget::Remote => "Video uploaded to S3 successfully",
        };

        return Ok(Json(FormUploadResponse {
            message: message.to_string(),
            file_name: artifact.generated_name,
            location: artifact.location,
        }));
    }

    Err(AppError::BadRequest(NO_FILE_MESSAGE.to_string()).into())
}
