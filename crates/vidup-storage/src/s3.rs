use crate::keys::{validate_name, DEFAULT_CONTENT_TYPE};
use crate::traits::{StorageBackend, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3Builder, AwsCredentialProvider};
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, MultipartUpload, ObjectStore, PutOptions, PutPayload,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use vidup_core::{FinalizedArtifact, RemoteConfig, StorageLocation, StorageTarget};

/// Objects larger than this are sent as multipart uploads.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;
/// S3 rejects non-final parts smaller than 5 MiB.
pub const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;

/// Builds the object store client for a remote configuration.
///
/// Only called once the configuration has been checked, so a connector is never
/// reached for an upload that is doomed by missing settings.
pub trait ObjectStoreConnector: Send + Sync {
    fn connect(&self, remote: &RemoteConfig) -> StorageResult<Arc<dyn ObjectStore>>;
}

/// Connects to AWS S3 or an S3-compatible provider.
#[derive(Default)]
pub struct S3Connector {
    credentials: Option<AwsCredentialProvider>,
}

impl S3Connector {
    /// Credentials come from the environment (AWS_ACCESS_KEY_ID, profile, instance role...).
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: AwsCredentialProvider) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }
}

impl ObjectStoreConnector for S3Connector {
    fn connect(&self, remote: &RemoteConfig) -> StorageResult<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(remote.region.clone())
            .with_bucket_name(remote.bucket.clone());

        if let Some(credentials) = &self.credentials {
            builder = builder.with_credentials(credentials.clone());
        }

        if let Some(ref endpoint) = remote.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Arc::new(store))
    }
}

/// S3 storage: finished uploads are sent to a bucket under their generated name.
#[derive(Clone)]
pub struct S3Storage {
    remote: RemoteConfig,
    connector: Arc<dyn ObjectStoreConnector>,
    multipart_threshold: u64,
    part_size: usize,
}

impl S3Storage {
    pub fn new(remote: RemoteConfig, connector: Arc<dyn ObjectStoreConnector>) -> Self {
        Self {
            remote,
            connector,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    pub fn with_multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    pub fn with_part_size(mut self, bytes: usize) -> Self {
        self.part_size = bytes.max(1);
        self
    }

    fn check_config(&self) -> StorageResult<()> {
        let missing = self.remote.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        Err(StorageError::ConfigError(format!(
            "Remote storage {} not configured",
            missing.join(" and ")
        )))
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style: {endpoint}/{bucket}/{key}
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.remote.endpoint {
            format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.remote.bucket,
                key
            )
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.remote.bucket, self.remote.region, key
            )
        }
    }

    async fn put_whole(
        &self,
        store: &dyn ObjectStore,
        location: &Path,
        source: &std::path::Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let data = fs::read(source).await?;
        let options = PutOptions {
            attributes: content_type_attributes(content_type),
            ..Default::default()
        };

        store
            .put_opts(location, PutPayload::from(Bytes::from(data)), options)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    /// Stream the file in `part_size` pieces so large videos never sit in memory whole.
    async fn put_multipart(
        &self,
        store: &dyn ObjectStore,
        location: &Path,
        source: &std::path::Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let mut file = fs::File::open(source).await?;
        let mut upload = store
            .put_multipart_opts(location, content_type_attributes(content_type).into())
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        match send_parts(&mut file, &mut *upload, self.part_size).await {
            Ok(()) => {
                upload
                    .complete()
                    .await
                    .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        key = %location,
                        "Failed to abort S3 multipart upload"
                    );
                }
                Err(e)
            }
        }
    }
}

fn content_type_attributes(content_type: &str) -> Attributes {
    let content_type = if content_type.trim().is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        content_type
    };

    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, content_type.to_string().into());
    attributes
}

async fn send_parts(
    file: &mut fs::File,
    upload: &mut dyn MultipartUpload,
    part_size: usize,
) -> StorageResult<()> {
    let mut buffer = vec![0u8; part_size];
    loop {
        let filled = fill_buffer(file, &mut buffer).await?;
        if filled == 0 {
            return Ok(());
        }

        upload
            .put_part(PutPayload::from(Bytes::copy_from_slice(&buffer[..filled])))
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        if filled < buffer.len() {
            return Ok(());
        }
    }
}

/// Read until the buffer is full or the file ends.
async fn fill_buffer(file: &mut fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn store(
        &self,
        source: PathBuf,
        generated_name: &str,
        content_type: &str,
    ) -> StorageResult<FinalizedArtifact> {
        // Nothing may reach the network with a blank region or bucket
        self.check_config()?;
        validate_name(generated_name)?;

        let size = match fs::metadata(&source).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(source.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let store = self.connector.connect(&self.remote)?;
        let location = Path::from(generated_name);
        let start = std::time::Instant::now();

        let result = if size > self.multipart_threshold {
            self.put_multipart(store.as_ref(), &location, &source, content_type)
                .await
        } else {
            self.put_whole(store.as_ref(), &location, &source, content_type)
                .await
        };

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                bucket = %self.remote.bucket,
                key = %generated_name,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            return Err(e);
        }

        tracing::info!(
            bucket = %self.remote.bucket,
            key = %generated_name,
            size_bytes = size,
            multipart = size > self.multipart_threshold,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(FinalizedArtifact {
            generated_name: generated_name.to_string(),
            location: StorageLocation::S3 {
                bucket: self.remote.bucket.clone(),
                key: generated_name.to_string(),
                url: self.generate_url(generated_name),
            },
            content_type: content_type.to_string(),
            size_bytes: size,
        })
    }

    fn target(&self) -> StorageTarget {
        StorageTarget::Remote
    }
}
