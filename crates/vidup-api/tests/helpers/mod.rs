//! Test helpers: build the router over temporary directories for integration tests.
//!
//! Run from workspace root: `cargo test -p vidup-api`. The remote object store is
//! an in-memory one, so no network or credentials are needed.

#![allow(dead_code)]

use axum_test::TestServer;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, ObjectStoreExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use vidup_core::{BaseConfig, Config, MetadataCodec, RemoteConfig, UploadServiceConfig};
use vidup_storage::{ObjectStoreConnector, StorageResult};

pub const TUS_RESUMABLE: &str = "1.0.0";
pub const TEST_BUCKET: &str = "vidup-test";

/// Hands out one shared in-memory store and counts how often it was asked to.
pub struct InMemoryConnector {
    pub store: Arc<InMemory>,
    calls: AtomicUsize,
}

impl InMemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(InMemory::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ObjectStoreConnector for InMemoryConnector {
    fn connect(&self, _remote: &RemoteConfig) -> StorageResult<Arc<dyn ObjectStore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let store: Arc<dyn ObjectStore> = self.store.clone();
        Ok(store)
    }
}

/// Test application: server, connector, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub connector: Arc<InMemoryConnector>,
    pub _temp_dir: TempDir,
    videos_path: PathBuf,
    chunk_store_path: PathBuf,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn video_path(&self, name: &str) -> PathBuf {
        self.videos_path.join(name)
    }

    /// Number of entries left in the chunk store directory.
    pub fn chunk_store_entries(&self) -> usize {
        std::fs::read_dir(&self.chunk_store_path)
            .expect("Failed to read chunk store")
            .count()
    }

    pub async fn remote_object(&self, key: &str) -> Bytes {
        self.connector
            .store
            .get(&ObjectPath::from(key))
            .await
            .expect("Object not found in remote store")
            .bytes()
            .await
            .expect("Failed to read remote object")
    }
}

pub fn create_test_config(temp_dir: &TempDir, remote: RemoteConfig) -> Config {
    Config::new(UploadServiceConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
        },
        videos_path: temp_dir.path().join("videos"),
        chunk_store_path: temp_dir.path().join("uploads"),
        local_storage_base_url: None,
        remote,
        max_upload_size_bytes: 1024 * 1024,
        s3_multipart_threshold_bytes: 8 * 1024 * 1024,
    })
}

/// Setup test app with remote storage configured against the in-memory store.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_remote(RemoteConfig::new("eu-west-1", TEST_BUCKET)).await
}

/// Setup test app with remote storage left unconfigured.
pub async fn setup_test_app_without_remote() -> TestApp {
    setup_test_app_with_remote(RemoteConfig::default()).await
}

pub async fn setup_test_app_with_remote(remote: RemoteConfig) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(&temp_dir, remote);
    let connector = InMemoryConnector::new();

    let (_state, app) = vidup_api::build_app(config.clone(), connector.clone())
        .await
        .expect("Failed to build app");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        connector,
        videos_path: config.videos_path().to_path_buf(),
        chunk_store_path: config.chunk_store_path().to_path_buf(),
        _temp_dir: temp_dir,
    }
}

/// `Upload-Metadata` value for `filename` and `storageType`.
pub fn upload_metadata(filename: &str, storage_type: &str) -> String {
    format!(
        "filename {},storageType {}",
        MetadataCodec::encode_value(filename),
        MetadataCodec::encode_value(storage_type)
    )
}

/// Create a resumable upload and return its path (`/videos/{id}`).
pub async fn create_upload(client: &TestServer, length: u64, metadata: &str) -> String {
    let response = client
        .post("/videos")
        .add_header("Tus-Resumable", TUS_RESUMABLE)
        .add_header("Upload-Length", length.to_string())
        .add_header("Upload-Metadata", metadata.to_string())
        .await;
    assert_eq!(response.status_code(), 201);

    response
        .header("location")
        .to_str()
        .expect("Location is not text")
        .to_string()
}

/// PATCH a chunk at `offset`.
pub async fn patch_chunk(
    client: &TestServer,
    path: &str,
    offset: u64,
    data: &'static [u8],
) -> axum_test::TestResponse {
    client
        .patch(path)
        .add_header("Tus-Resumable", TUS_RESUMABLE)
        .add_header("Upload-Offset", offset.to_string())
        .add_header("Content-Type", "application/offset+octet-stream")
        .bytes(Bytes::from_static(data))
        .await
}
