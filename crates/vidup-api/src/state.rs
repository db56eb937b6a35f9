//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers can extract only what they need
//! via Axum's `FromRef`.

use crate::services::upload::{TransferService, UploadFinalizer, UploadGateway};
use std::sync::Arc;
use vidup_core::Config;
use vidup_storage::{ChunkStore, StorageBackends};

/// Upload services sharing one chunk store and one finalizer.
#[derive(Clone)]
pub struct UploadState {
    pub chunks: ChunkStore,
    pub transfers: TransferService,
    pub gateway: UploadGateway,
}

impl UploadState {
    pub fn new(chunks: ChunkStore, backends: StorageBackends, max_upload_size_bytes: u64) -> Self {
        let finalizer = UploadFinalizer::new(chunks.clone(), backends);
        let transfers =
            TransferService::new(chunks.clone(), finalizer.clone(), max_upload_size_bytes);
        let gateway = UploadGateway::new(chunks.clone(), finalizer, max_upload_size_bytes);

        Self {
            chunks,
            transfers,
            gateway,
        }
    }
}

pub struct AppState {
    pub uploads: UploadState,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, uploads: UploadState) -> Self {
        Self { uploads, config }
    }
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for UploadState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.uploads.clone()
    }
}
