//! Upload finalization
//!
//! Moves a completed upload from the chunk store to its durable home:
//! decode metadata → generate name → select backend → store → remove chunk files.
//! The chunk files are removed on every exit path once the upload has been claimed.

use std::time::Instant;

use vidup_core::{AppError, FinalizedArtifact, MetadataCodec, RawMetadata, UploadMetadata};
use vidup_storage::keys::{generate_name, guess_content_type, DEFAULT_CONTENT_TYPE};
use vidup_storage::{ChunkStore, StorageBackends, StorageError};

#[derive(Clone)]
pub struct UploadFinalizer {
    chunks: ChunkStore,
    backends: StorageBackends,
}

impl UploadFinalizer {
    pub fn new(chunks: ChunkStore, backends: StorageBackends) -> Self {
        Self { chunks, backends }
    }

    /// Finalize an upload whose metadata is still transport-encoded.
    ///
    /// Undecodable metadata never fails the upload: it is stored locally under a
    /// name derived from the upload id.
    pub async fn finalize(
        &self,
        upload_id: &str,
        raw: &RawMetadata,
    ) -> Result<FinalizedArtifact, AppError> {
        let metadata = match MetadataCodec::decode(raw) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(
                    upload_id = %upload_id,
                    error = %e,
                    "Upload metadata unusable, storing locally under the upload id"
                );
                UploadMetadata::fallback(upload_id)
            }
        };

        self.finalize_decoded(upload_id, metadata).await
    }

    /// Finalize an upload with plain-text metadata.
    ///
    /// Fails with `AlreadyFinalized` when the chunk files are gone or another
    /// finalization holds the upload; no backend is called in that case.
    pub async fn finalize_decoded(
        &self,
        upload_id: &str,
        metadata: UploadMetadata,
    ) -> Result<FinalizedArtifact, AppError> {
        let handle = match self.chunks.lookup(upload_id).await {
            Ok(handle) => handle,
            Err(StorageError::UnknownUpload(_)) => {
                return Err(AppError::AlreadyFinalized(upload_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let lease = self.chunks.claim(&handle).await?;

        let start = Instant::now();
        let generated_name = generate_name(&metadata.filename);
        let content_type = resolve_content_type(&metadata);
        let target = metadata.target();
        let backend = self.backends.select(target);

        let stored = backend
            .store(lease.path().to_path_buf(), &generated_name, &content_type)
            .await;

        if let Err(e) = lease.release().await {
            tracing::warn!(
                upload_id = %upload_id,
                error = %e,
                "Failed to remove chunk files after finalization"
            );
        }

        match stored {
            Ok(artifact) => {
                tracing::info!(
                    upload_id = %upload_id,
                    generated_name = %artifact.generated_name,
                    target = %target,
                    size_bytes = artifact.size_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload finalized"
                );
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(
                    upload_id = %upload_id,
                    generated_name = %generated_name,
                    target = %target,
                    error = %e,
                    "Upload finalization failed"
                );
                Err(e.into())
            }
        }
    }
}

/// Client-declared type first, then a guess from the extension.
fn resolve_content_type(metadata: &UploadMetadata) -> String {
    metadata
        .content_type
        .clone()
        .or_else(|| guess_content_type(&metadata.filename).map(String::from))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use object_store::memory::InMemory;
    use object_store::ObjectStore;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use vidup_core::{RemoteConfig, StorageLocation, StorageTarget};
    use vidup_storage::{
        LocalStorage, ObjectStoreConnector, S3Storage, StorageBackend, StorageResult,
    };

    struct CountingConnector {
        calls: AtomicUsize,
    }

    impl ObjectStoreConnector for CountingConnector {
        fn connect(&self, _remote: &RemoteConfig) -> StorageResult<Arc<dyn ObjectStore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
            Ok(store)
        }
    }

    /// Backend double that records calls and optionally fails.
    struct RecordingBackend {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StorageBackend for RecordingBackend {
        async fn store(
            &self,
            source: PathBuf,
            generated_name: &str,
            content_type: &str,
        ) -> StorageResult<FinalizedArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::UploadFailed("network unreachable".to_string()));
            }
            assert!(source.exists());
            Ok(FinalizedArtifact {
                generated_name: generated_name.to_string(),
                location: StorageLocation::Local {
                    path: generated_name.to_string(),
                    url: None,
                },
                content_type: content_type.to_string(),
                size_bytes: 0,
            })
        }

        fn target(&self) -> StorageTarget {
            StorageTarget::Local
        }
    }

    struct Fixture {
        _dir: TempDir,
        videos: PathBuf,
        chunks: ChunkStore,
        connector: Arc<CountingConnector>,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let chunks = ChunkStore::new(dir.path().join("uploads")).await.unwrap();
            Self {
                videos: dir.path().join("videos"),
                _dir: dir,
                chunks,
                connector: Arc::new(CountingConnector {
                    calls: AtomicUsize::new(0),
                }),
            }
        }

        async fn finalizer(&self, remote: RemoteConfig) -> UploadFinalizer {
            let local = LocalStorage::new(&self.videos, None).await.unwrap();
            let s3 = S3Storage::new(remote, self.connector.clone());
            UploadFinalizer::new(
                self.chunks.clone(),
                StorageBackends::new(Arc::new(local), Arc::new(s3)),
            )
        }

        fn with_backend(&self, backend: Arc<RecordingBackend>) -> UploadFinalizer {
            UploadFinalizer::new(
                self.chunks.clone(),
                StorageBackends::new(backend.clone(), backend),
            )
        }

        async fn completed_upload(&self, id: &str, data: &[u8]) -> PathBuf {
            let handle = self.chunks.open(id).await.unwrap();
            self.chunks.append(&handle, 0, data).await.unwrap();
            handle.data_path().to_path_buf()
        }
    }

    fn metadata(filename: &str, storage_type: &str) -> RawMetadata {
        let mut raw = RawMetadata::new();
        raw.insert("filename".to_string(), MetadataCodec::encode_value(filename));
        raw.insert(
            "storageType".to_string(),
            MetadataCodec::encode_value(storage_type),
        );
        raw
    }

    fn configured_remote() -> RemoteConfig {
        RemoteConfig::new("eu-west-1", "videos")
    }

    #[tokio::test]
    async fn test_s3_metadata_routes_to_remote() {
        let fixture = Fixture::new().await;
        let finalizer = fixture.finalizer(configured_remote()).await;
        let chunk_path = fixture.completed_upload("up1", b"remote video").await;

        let artifact = finalizer
            .finalize("up1", &metadata("clip.mp4", "s3"))
            .await
            .unwrap();

        assert_eq!(artifact.location.target(), StorageTarget::Remote);
        assert!(artifact.generated_name.ends_with(".mp4"));
        assert_eq!(artifact.content_type, "video/mp4");
        assert_eq!(fixture.connector.calls.load(Ordering::SeqCst), 1);
        assert!(!chunk_path.exists());
    }

    #[tokio::test]
    async fn test_local_metadata_routes_to_local() {
        let fixture = Fixture::new().await;
        let finalizer = fixture.finalizer(configured_remote()).await;
        let chunk_path = fixture.completed_upload("up2", b"local video").await;

        let artifact = finalizer
            .finalize("up2", &metadata("clip.mp4", "local"))
            .await
            .unwrap();

        assert_eq!(artifact.location.target(), StorageTarget::Local);
        let stored = fixture.videos.join(&artifact.generated_name);
        assert_eq!(std::fs::read(stored).unwrap(), b"local video");
        assert_eq!(fixture.connector.calls.load(Ordering::SeqCst), 0);
        assert!(!chunk_path.exists());
    }

    #[tokio::test]
    async fn test_malformed_metadata_falls_back_to_local() {
        let fixture = Fixture::new().await;
        let finalizer = fixture.finalizer(configured_remote()).await;
        let chunk_path = fixture.completed_upload("up3", b"data").await;

        let mut raw = RawMetadata::new();
        raw.insert("filename".to_string(), "***".to_string());
        raw.insert("storageType".to_string(), MetadataCodec::encode_value("s3"));

        let artifact = finalizer.finalize("up3", &raw).await.unwrap();

        assert_eq!(artifact.location.target(), StorageTarget::Local);
        // The upload id has no extension, so neither does the generated name
        assert!(!artifact.generated_name.contains('.'));
        assert_eq!(artifact.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(fixture.connector.calls.load(Ordering::SeqCst), 0);
        assert!(!chunk_path.exists());
    }

    #[tokio::test]
    async fn test_generated_name_keeps_original_extension() {
        let fixture = Fixture::new().await;
        let finalizer = fixture.finalizer(configured_remote()).await;
        fixture.completed_upload("up4", b"mov").await;

        let artifact = finalizer
            .finalize("up4", &metadata("movie.mov", "local"))
            .await
            .unwrap();

        assert!(artifact.generated_name.ends_with(".mov"));
        assert!(!artifact.generated_name.contains("movie"));
        assert_eq!(artifact.content_type, "video/quicktime");
    }

    #[tokio::test]
    async fn test_second_finalize_is_rejected_without_backend_call() {
        let fixture = Fixture::new().await;
        let backend = Arc::new(RecordingBackend {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let finalizer = fixture.with_backend(backend.clone());
        fixture.completed_upload("up5", b"once").await;

        finalizer
            .finalize("up5", &metadata("clip.mp4", "local"))
            .await
            .unwrap();
        let err = finalizer
            .finalize("up5", &metadata("clip.mp4", "local"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AlreadyFinalized(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_still_removes_chunk_file() {
        let fixture = Fixture::new().await;
        let backend = Arc::new(RecordingBackend {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let finalizer = fixture.with_backend(backend.clone());
        let chunk_path = fixture.completed_upload("up6", b"doomed").await;

        let err = finalizer
            .finalize("up6", &metadata("clip.mp4", "local"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!chunk_path.exists());
    }

    #[tokio::test]
    async fn test_missing_remote_config_surfaces_configuration_error() {
        let fixture = Fixture::new().await;
        let finalizer = fixture.finalizer(RemoteConfig::new("eu-west-1", "")).await;
        let chunk_path = fixture.completed_upload("up7", b"data").await;

        let err = finalizer
            .finalize("up7", &metadata("clip.mp4", "s3"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Configuration(_)));
        assert_eq!(fixture.connector.calls.load(Ordering::SeqCst), 0);
        assert!(!chunk_path.exists());
    }

    #[tokio::test]
    async fn test_declared_filetype_wins_over_guess() {
        let fixture = Fixture::new().await;
        let finalizer = fixture.finalizer(configured_remote()).await;
        fixture.completed_upload("up8", b"data").await;

        let mut raw = metadata("clip.mp4", "local");
        raw.insert(
            "filetype".to_string(),
            MetadataCodec::encode_value("video/x-custom"),
        );

        let artifact = finalizer.finalize("up8", &raw).await.unwrap();
        assert_eq!(artifact.content_type, "video/x-custom");
    }
}
