//! Route configuration and setup

use crate::constants::{
    headers, FORM_UPLOAD_LOCAL_PATH, FORM_UPLOAD_S3_PATH, MEDIA_PATH, OPENAPI_JSON_PATH,
    RESUMABLE_UPLOAD_PATH,
};
use crate::handlers::{form_upload, health, resumable_upload};
use crate::middleware::tus_options_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, head, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use vidup_core::Config;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    // Upload services enforce the exact limit; this only bounds a single request
    let body_limit = usize::try_from(
        config
            .max_upload_size_bytes()
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let app = upload_routes()
        .merge(health_routes())
        .route(
            OPENAPI_JSON_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_JSON_PATH).path("/docs"))
        .nest_service(MEDIA_PATH, ServeDir::new(config.videos_path()))
        .layer(DefaultBodyLimit::disable())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tus_options_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn upload_routes() -> Router<Arc<AppState>> {
    let upload_path = format!("{}/{{id}}", RESUMABLE_UPLOAD_PATH);

    Router::new()
        .route(
            RESUMABLE_UPLOAD_PATH,
            post(resumable_upload::create_upload),
        )
        .route(
            &upload_path,
            head(resumable_upload::upload_status)
                .patch(resumable_upload::append_chunk)
                .delete(resumable_upload::terminate_upload),
        )
        .route(FORM_UPLOAD_LOCAL_PATH, post(form_upload::upload_form_local))
        .route(FORM_UPLOAD_S3_PATH, post(form_upload::upload_form_s3))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
}

/// Setup CORS configuration
///
/// Browser tus clients need to read the offset and location headers, so they are exposed.
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::HEAD,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let exposed = [
        header::LOCATION,
        HeaderName::from_static(headers::TUS_RESUMABLE),
        HeaderName::from_static(headers::TUS_VERSION),
        HeaderName::from_static(headers::TUS_EXTENSION),
        HeaderName::from_static(headers::TUS_MAX_SIZE),
        HeaderName::from_static(headers::UPLOAD_OFFSET),
        HeaderName::from_static(headers::UPLOAD_LENGTH),
        HeaderName::from_static(headers::UPLOAD_DEFER_LENGTH),
        HeaderName::from_static(headers::UPLOAD_METADATA),
        HeaderName::from_static(headers::VIDEO_NAME),
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new().allow_origin(origins)
    };

    Ok(cors
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers(exposed))
}
