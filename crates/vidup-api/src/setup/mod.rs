//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;
pub mod storage;

use crate::state::{AppState, UploadState};
use anyhow::{Context, Result};
use std::sync::Arc;
use vidup_core::Config;
use vidup_storage::{ObjectStoreConnector, S3Connector};

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    build_app(config, Arc::new(S3Connector::from_env())).await
}

/// Build state and router without touching global tracing state.
///
/// `connector` opens the remote object store; tests pass an in-memory one.
pub async fn build_app(
    config: Config,
    connector: Arc<dyn ObjectStoreConnector>,
) -> Result<(Arc<AppState>, axum::Router)> {
    let (chunks, backends) = storage::setup_storage(&config, connector).await?;

    let uploads = UploadState::new(chunks, backends, config.max_upload_size_bytes());
    let state = Arc::new(AppState::new(config.clone(), uploads));

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
