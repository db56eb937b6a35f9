//! Health check handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub chunk_store: String,
    pub videos: String,
    /// "configured" or "not_configured"; remote uploads fail while not configured
    pub remote_storage: String,
}

async fn check_dir(path: &Path) -> String {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => "healthy".to_string(),
        Ok(_) => "unhealthy: not a directory".to_string(),
        Err(e) => format!("unhealthy: {}", e),
    }
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Health check: chunk store and videos directories, remote configuration.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy", body = HealthCheckResponse),
        (status = 503, description = "A storage directory is unreachable", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let chunk_store = check_dir(state.uploads.chunks.root()).await;
    let videos = check_dir(state.config.videos_path()).await;
    let remote_storage = if state.config.remote().is_complete() {
        "configured"
    } else {
        "not_configured"
    };

    let healthy = chunk_store == "healthy" && videos == "healthy";
    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        chunk_store,
        videos,
        remote_storage: remote_storage.to_string(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
