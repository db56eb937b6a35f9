//! Route paths and resumable-transfer protocol constants

/// Resumable uploads are created here; each upload lives at `{RESUMABLE_UPLOAD_PATH}/{id}`.
pub const RESUMABLE_UPLOAD_PATH: &str = "/videos";

pub const FORM_UPLOAD_LOCAL_PATH: &str = "/video/upload/form-data/local";
pub const FORM_UPLOAD_S3_PATH: &str = "/video/upload/form-data/s3";

/// Finished local uploads are served below this prefix.
pub const MEDIA_PATH: &str = "/media";

pub const OPENAPI_JSON_PATH: &str = "/api/openapi.json";

pub const TUS_VERSION: &str = "1.0.0";
pub const TUS_EXTENSIONS: &str = "creation,creation-defer-length,termination";
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

pub mod headers {
    pub const TUS_RESUMABLE: &str = "tus-resumable";
    pub const TUS_VERSION: &str = "tus-version";
    pub const TUS_EXTENSION: &str = "tus-extension";
    pub const TUS_MAX_SIZE: &str = "tus-max-size";
    pub const UPLOAD_OFFSET: &str = "upload-offset";
    pub const UPLOAD_LENGTH: &str = "upload-length";
    pub const UPLOAD_DEFER_LENGTH: &str = "upload-defer-length";
    pub const UPLOAD_METADATA: &str = "upload-metadata";
    /// Generated name of the stored video, sent on the request that completed the upload.
    pub const VIDEO_NAME: &str = "x-video-name";
}
