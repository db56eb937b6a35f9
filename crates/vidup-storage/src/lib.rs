//! Vidup Storage Library
//!
//! Temporary and durable storage for uploads:
//!
//! - [`ChunkStore`] holds partially received uploads on disk, keyed by upload id,
//!   and hands out a [`ChunkLease`] that guarantees the chunk file is removed once
//!   finalization has started.
//! - [`StorageBackend`] is implemented by [`LocalStorage`] (atomic rename into the
//!   served videos directory) and [`S3Storage`] (upload to an object-store bucket).
//!
//! Keys for finished uploads are generated in the `keys` module so both backends
//! produce the same names.

pub mod chunks;
pub mod factory;
pub mod keys;
pub mod local;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use chunks::{ChunkHandle, ChunkLease, ChunkStore};
pub use factory::{create_backends, StorageBackends};
pub use local::LocalStorage;
pub use s3::{ObjectStoreConnector, S3Connector, S3Storage};
pub use traits::{StorageBackend, StorageError, StorageResult};
pub use vidup_core::StorageTarget;
