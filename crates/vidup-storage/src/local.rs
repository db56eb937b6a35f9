use crate::keys::validate_name;
use crate::traits::{StorageBackend, StorageError, StorageResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use vidup_core::{FinalizedArtifact, StorageLocation, StorageTarget};

/// Local filesystem storage: finished uploads are moved into the served videos directory.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: Option<String>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Directory that receives finished uploads (e.g., "videos")
    /// * `base_url` - Optional base URL the directory is served under (e.g., "http://localhost:4000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: Option<String>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn name_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.base_path.join(name))
    }

    fn generate_url(&self, name: &str) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), name))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn store(
        &self,
        source: PathBuf,
        generated_name: &str,
        content_type: &str,
    ) -> StorageResult<FinalizedArtifact> {
        let dest = self.name_to_path(generated_name)?;
        let start = std::time::Instant::now();

        // The directory may have been removed since startup
        fs::create_dir_all(&self.base_path).await?;

        let size = match fs::metadata(&source).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(source.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        // Same filesystem as the chunk store, so this is an atomic rename
        fs::rename(&source, &dest).await.map_err(|e| {
            tracing::error!(
                error = %e,
                source = %source.display(),
                path = %dest.display(),
                "Local storage move failed"
            );
            match e.kind() {
                ErrorKind::NotFound => StorageError::NotFound(source.display().to_string()),
                _ => StorageError::UploadFailed(format!(
                    "Failed to move {} to {}: {}",
                    source.display(),
                    dest.display(),
                    e
                )),
            }
        })?;

        tracing::info!(
            path = %dest.display(),
            key = %generated_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(FinalizedArtifact {
            generated_name: generated_name.to_string(),
            location: StorageLocation::Local {
                path: dest.display().to_string(),
                url: self.generate_url(generated_name),
            },
            content_type: content_type.to_string(),
            size_bytes: size,
        })
    }

    fn target(&self) -> StorageTarget {
        StorageTarget::Local
    }
}
