//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vidup_core::models;

/// Returns the OpenAPI spec served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vidup API",
        version = "0.1.0",
        description = "Video upload service. Videos arrive either as a single multipart request or as a resumable (tus 1.0.0) transfer, and are stored on the local filesystem or in an S3 bucket depending on the `storageType` metadata."
    ),
    paths(
        // Resumable
        handlers::resumable_upload::upload_options,
        handlers::resumable_upload::create_upload,
        handlers::resumable_upload::upload_status,
        handlers::resumable_upload::append_chunk,
        handlers::resumable_upload::terminate_upload,
        // Single request
        handlers::form_upload::upload_form_local,
        handlers::form_upload::upload_form_s3,
        // Health
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::FinalizedArtifact,
            models::StorageLocation,
            handlers::form_upload::FormUploadResponse,
            handlers::health::HealthCheckResponse,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "resumable", description = "Resumable uploads over the tus 1.0.0 core protocol"),
        (name = "form-upload", description = "Single-request multipart uploads"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
