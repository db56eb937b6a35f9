//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use vidup_core::Config;
use vidup_storage::{create_backends, ChunkStore, ObjectStoreConnector, StorageBackends};

/// Open the chunk store and build both storage backends.
pub async fn setup_storage(
    config: &Config,
    connector: Arc<dyn ObjectStoreConnector>,
) -> Result<(ChunkStore, StorageBackends)> {
    tracing::info!("Initializing storage...");

    let chunks = ChunkStore::new(config.chunk_store_path())
        .await
        .context("Failed to open chunk store")?;
    let backends = create_backends(config, connector)
        .await
        .context("Failed to create storage backends")?;

    tracing::info!(
        chunk_store = %config.chunk_store_path().display(),
        videos = %config.videos_path().display(),
        remote_configured = config.remote().is_complete(),
        "Storage initialized successfully"
    );

    Ok((chunks, backends))
}
