//! Vidup Core Library
//!
//! This crate provides the domain models, error types, configuration and upload
//! metadata decoding shared by the storage and API crates.

pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, RemoteConfig, UploadServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use metadata::{MetadataCodec, MetadataError, RawMetadata, UploadMetadata};
pub use models::{FinalizedArtifact, StorageLocation, UploadSession};
pub use storage_types::StorageTarget;
