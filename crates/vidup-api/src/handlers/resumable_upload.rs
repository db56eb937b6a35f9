//! Resumable upload handlers (tus 1.0.0 core protocol).
//!
//! Creation, offset query, append and termination. Metadata values travel
//! base64-encoded in `Upload-Metadata` and are kept encoded until finalization.

use crate::constants::{headers, OFFSET_OCTET_STREAM, RESUMABLE_UPLOAD_PATH, TUS_EXTENSIONS, TUS_VERSION};
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::UploadState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use vidup_core::{AppError, FinalizedArtifact, RawMetadata};

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::BadRequest(format!("Header {} is not valid text", name)))
        })
        .transpose()
}

fn parse_u64_header(headers: &HeaderMap, name: &str) -> Result<Option<u64>, AppError> {
    header_str(headers, name)?
        .map(|value| {
            value.parse::<u64>().map_err(|_| {
                AppError::BadRequest(format!("Header {} must be a non-negative integer", name))
            })
        })
        .transpose()
}

fn require_tus_resumable(headers: &HeaderMap) -> Result<(), AppError> {
    match header_str(headers, headers::TUS_RESUMABLE)? {
        Some(TUS_VERSION) => Ok(()),
        Some(other) => Err(AppError::PreconditionFailed(format!(
            "Unsupported Tus-Resumable version {}; this server speaks {}",
            other, TUS_VERSION
        ))),
        None => Err(AppError::PreconditionFailed(
            "Missing Tus-Resumable header".to_string(),
        )),
    }
}

/// Parse `key value,key2 value2`. Values stay base64-encoded; a key without a
/// value maps to an empty string.
pub(crate) fn parse_upload_metadata(raw: &str) -> Result<RawMetadata, AppError> {
    let mut metadata = RawMetadata::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let mut parts = pair.splitn(2, ' ');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default().trim();

        if key.is_empty() || metadata.contains_key(key) {
            return Err(AppError::BadRequest(format!(
                "Invalid Upload-Metadata entry: {}",
                pair
            )));
        }
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

fn format_upload_metadata(metadata: &RawMetadata) -> String {
    let mut pairs: Vec<String> = metadata
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{} {}", key, value)
            }
        })
        .collect();
    pairs.sort();
    pairs.join(",")
}

fn tus_response(status: StatusCode) -> Response {
    let mut response = status.into_response();
    response.headers_mut().insert(
        HeaderName::from_static(headers::TUS_RESUMABLE),
        HeaderValue::from_static(TUS_VERSION),
    );
    response
}

fn insert_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

fn attach_artifact(response: &mut Response, artifact: Option<&FinalizedArtifact>) {
    if let Some(artifact) = artifact {
        insert_header(response, headers::VIDEO_NAME, &artifact.generated_name);
    }
}

/// Advertise protocol capabilities
///
/// Invoked from `tus_options_middleware`, outside the CORS layer.
#[utoipa::path(
    options,
    path = "/videos",
    tag = "resumable",
    responses(
        (status = 204, description = "Server capabilities in Tus-* headers")
    )
)]
pub async fn upload_options(State(uploads): State<UploadState>) -> Response {
    let mut response = tus_response(StatusCode::NO_CONTENT);
    insert_header(&mut response, headers::TUS_VERSION, TUS_VERSION);
    insert_header(&mut response, headers::TUS_EXTENSION, TUS_EXTENSIONS);
    insert_header(
        &mut response,
        headers::TUS_MAX_SIZE,
        uploads.transfers.max_upload_size_bytes(),
    );
    response
}

/// Create a resumable upload
#[utoipa::path(
    post,
    path = "/videos",
    tag = "resumable",
    params(
        ("Tus-Resumable" = String, Header, description = "Protocol version, must be 1.0.0"),
        ("Upload-Length" = Option<u64>, Header, description = "Total size in bytes"),
        ("Upload-Defer-Length" = Option<u8>, Header, description = "Set to 1 when the size is not known yet"),
        ("Upload-Metadata" = Option<String>, Header, description = "Comma-separated `key base64value` pairs; `filename` and `storageType` are used for routing")
    ),
    responses(
        (status = 201, description = "Upload created; Location points at the upload"),
        (status = 400, description = "Invalid headers", body = ErrorResponse),
        (status = 412, description = "Unsupported protocol version", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse)
    )
)]
pub async fn create_upload(
    State(uploads): State<UploadState>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    require_tus_resumable(&headers)?;

    let upload_length = parse_u64_header(&headers, headers::UPLOAD_LENGTH)?;
    let defer_length = header_str(&headers, headers::UPLOAD_DEFER_LENGTH)?;
    let declared_length = match (upload_length, defer_length) {
        (Some(length), None) => Some(length),
        (None, Some("1")) => None,
        (None, Some(_)) => {
            return Err(AppError::BadRequest("Upload-Defer-Length must be 1".to_string()).into())
        }
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "Upload-Length and Upload-Defer-Length are mutually exclusive".to_string(),
            )
            .into())
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "Upload-Length or Upload-Defer-Length is required".to_string(),
            )
            .into())
        }
    };

    let metadata = match header_str(&headers, headers::UPLOAD_METADATA)? {
        Some(raw) => parse_upload_metadata(raw)?,
        None => RawMetadata::new(),
    };

    let created = uploads.transfers.create(declared_length, metadata).await?;

    let mut response = tus_response(StatusCode::CREATED);
    insert_header(
        &mut response,
        "location",
        format!("{}/{}", RESUMABLE_UPLOAD_PATH, created.upload_id),
    );
    insert_header(&mut response, headers::UPLOAD_OFFSET, 0);
    attach_artifact(&mut response, created.artifact.as_ref());
    Ok(response)
}

/// Query the current offset of an upload
#[utoipa::path(
    head,
    path = "/videos/{id}",
    tag = "resumable",
    params(
        ("id" = String, Path, description = "Upload ID"),
        ("Tus-Resumable" = String, Header, description = "Protocol version, must be 1.0.0")
    ),
    responses(
        (status = 200, description = "Upload-Offset and Upload-Length headers"),
        (status = 404, description = "Unknown or finalized upload")
    )
)]
pub async fn upload_status(
    State(uploads): State<UploadState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    require_tus_resumable(&headers)?;

    let session = uploads.transfers.status(&id).await?;

    let mut response = tus_response(StatusCode::OK);
    insert_header(&mut response, "cache-control", "no-store");
    insert_header(&mut response, headers::UPLOAD_OFFSET, session.bytes_received);
    match session.declared_length {
        Some(length) => insert_header(&mut response, headers::UPLOAD_LENGTH, length),
        None => insert_header(&mut response, headers::UPLOAD_DEFER_LENGTH, 1),
    }
    if !session.metadata.is_empty() {
        insert_header(
            &mut response,
            headers::UPLOAD_METADATA,
            format_upload_metadata(&session.metadata),
        );
    }
    Ok(response)
}

/// Append a chunk to an upload
#[utoipa::path(
    patch,
    path = "/videos/{id}",
    tag = "resumable",
    params(
        ("id" = String, Path, description = "Upload ID"),
        ("Tus-Resumable" = String, Header, description = "Protocol version, must be 1.0.0"),
        ("Upload-Offset" = u64, Header, description = "Offset the chunk starts at; must equal the current offset"),
        ("Upload-Length" = Option<u64>, Header, description = "Total size, for uploads created with a deferred length")
    ),
    request_body(content = Vec<u8>, content_type = "application/offset+octet-stream"),
    responses(
        (status = 204, description = "Chunk stored; Upload-Offset holds the new offset"),
        (status = 404, description = "Unknown or finalized upload", body = ErrorResponse),
        (status = 409, description = "Offset mismatch or upload already finalized", body = ErrorResponse),
        (status = 413, description = "Chunk exceeds the upload length", body = ErrorResponse),
        (status = 415, description = "Wrong Content-Type", body = ErrorResponse),
        (status = 423, description = "Another request is writing to this upload", body = ErrorResponse),
        (status = 500, description = "Finalization failed", body = ErrorResponse)
    )
)]
pub async fn append_chunk(
    State(uploads): State<UploadState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpAppError> {
    require_tus_resumable(&headers)?;

    let content_type = header_str(&headers, header::CONTENT_TYPE.as_str())?;
    if content_type != Some(OFFSET_OCTET_STREAM) {
        return Err(AppError::UnsupportedMediaType(format!(
            "Content-Type must be {}",
            OFFSET_OCTET_STREAM
        ))
        .into());
    }

    let offset = parse_u64_header(&headers, headers::UPLOAD_OFFSET)?
        .ok_or_else(|| AppError::BadRequest("Upload-Offset header is required".to_string()))?;
    let upload_length = parse_u64_header(&headers, headers::UPLOAD_LENGTH)?;

    let outcome = uploads
        .transfers
        .append(&id, offset, &body, upload_length)
        .await?;

    let mut response = tus_response(StatusCode::NO_CONTENT);
    insert_header(&mut response, headers::UPLOAD_OFFSET, outcome.offset);
    attach_artifact(&mut response, outcome.artifact.as_ref());
    Ok(response)
}

/// Abandon an upload
#[utoipa::path(
    delete,
    path = "/videos/{id}",
    tag = "resumable",
    params(
        ("id" = String, Path, description = "Upload ID"),
        ("Tus-Resumable" = String, Header, description = "Protocol version, must be 1.0.0")
    ),
    responses(
        (status = 204, description = "Upload terminated and its data removed"),
        (status = 404, description = "Unknown or finalized upload", body = ErrorResponse),
        (status = 409, description = "Upload is being finalized", body = ErrorResponse)
    )
)]
pub async fn terminate_upload(
    State(uploads): State<UploadState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    require_tus_resumable(&headers)?;
    uploads.transfers.abort(&id).await?;
    Ok(tus_response(StatusCode::NO_CONTENT))
}
