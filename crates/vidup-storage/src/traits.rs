//! Storage abstraction trait
//!
//! This module defines the StorageBackend trait that every durable destination implements.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use vidup_core::{AppError, FinalizedArtifact, StorageTarget};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown upload: {0}")]
    UnknownUpload(String),

    #[error("Range conflict for upload {upload_id}: expected offset {expected}, got {actual}")]
    RangeConflict {
        upload_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Upload already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("Upload is busy: {0}")]
    Busy(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RangeConflict {
                upload_id,
                expected,
                actual,
            } => AppError::RangeConflict {
                upload_id,
                expected,
                actual,
            },
            StorageError::AlreadyFinalized(id) => AppError::AlreadyFinalized(id),
            StorageError::Busy(id) => AppError::Locked(id),
            StorageError::UnknownUpload(id) => {
                AppError::NotFound(format!("Upload not found: {}", id))
            }
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Durable destination for finished uploads.
///
/// `store` takes ownership of the file at `source`: the caller must not use that
/// path afterwards. Backends never delete the source themselves; removing whatever
/// is left behind is the finalizer's job.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Move or upload `source` to its durable home under `generated_name`.
    async fn store(
        &self,
        source: PathBuf,
        generated_name: &str,
        content_type: &str,
    ) -> StorageResult<FinalizedArtifact>;

    /// Which storage target this backend serves
    fn target(&self) -> StorageTarget;
}
