//! Data models for the application

mod upload;

pub use upload::{FinalizedArtifact, StorageLocation, UploadSession};
