use crate::local::LocalStorage;
use crate::s3::{ObjectStoreConnector, S3Storage};
use crate::traits::{StorageBackend, StorageResult};
use std::sync::Arc;
use vidup_core::{Config, StorageTarget};

/// One backend per storage target.
#[derive(Clone)]
pub struct StorageBackends {
    local: Arc<dyn StorageBackend>,
    remote: Arc<dyn StorageBackend>,
}

impl StorageBackends {
    pub fn new(local: Arc<dyn StorageBackend>, remote: Arc<dyn StorageBackend>) -> Self {
        Self { local, remote }
    }

    /// Backend responsible for `target`.
    pub fn select(&self, target: StorageTarget) -> Arc<dyn StorageBackend> {
        match target {
            StorageTarget::Local => self.local.clone(),
            StorageTarget::Remote => self.remote.clone(),
        }
    }
}

/// Create both storage backends based on configuration.
///
/// Incomplete remote settings are not an error here: the remote backend is still
/// built and reports the missing settings on each upload routed to it.
pub async fn create_backends(
    config: &Config,
    connector: Arc<dyn ObjectStoreConnector>,
) -> StorageResult<StorageBackends> {
    let local = LocalStorage::new(
        config.videos_path(),
        config.local_storage_base_url().map(String::from),
    )
    .await?;

    let remote = config.remote();
    if !remote.is_complete() {
        tracing::warn!(
            missing = %remote.missing_fields().join(", "),
            "Remote storage is not configured; uploads with storageType \"s3\" will fail"
        );
    }

    let s3 = S3Storage::new(remote.clone(), connector)
        .with_multipart_threshold(config.s3_multipart_threshold_bytes());

    Ok(StorageBackends::new(Arc::new(local), Arc::new(s3)))
}
