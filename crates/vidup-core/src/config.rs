//! Configuration module
//!
//! Environment-driven configuration for the upload service: HTTP settings, the
//! chunk-store and videos directories, and the optional remote object store.

use std::env;
use std::path::{Path, PathBuf};

const SERVER_PORT: u16 = 4000;
const MAX_UPLOAD_SIZE_MB: u64 = 500;
const S3_MULTIPART_THRESHOLD_MB: u64 = 8;

/// Base HTTP configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Remote object store settings. Both `region` and `bucket` must be non-blank
/// before anything is sent to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    pub region: String,
    pub bucket: String,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub endpoint: Option<String>,
}

impl RemoteConfig {
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the settings that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.region.trim().is_empty() {
            missing.push("region");
        }
        if self.bucket.trim().is_empty() {
            missing.push("bucket");
        }
        missing
    }
}

/// Upload service configuration
#[derive(Clone, Debug)]
pub struct UploadServiceConfig {
    pub base: BaseConfig,
    /// Publicly served directory that receives finished local uploads
    pub videos_path: PathBuf,
    /// Holding area for partially received uploads
    pub chunk_store_path: PathBuf,
    pub local_storage_base_url: Option<String>,
    pub remote: RemoteConfig,
    pub max_upload_size_bytes: u64,
    pub s3_multipart_threshold_bytes: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<UploadServiceConfig>);

impl Config {
    fn as_upload(&self) -> &UploadServiceConfig {
        &self.0
    }

    pub fn new(config: UploadServiceConfig) -> Self {
        Config(Box::new(config))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_upload().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = UploadServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_upload().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_upload().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_upload().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_upload().base.environment
    }

    pub fn videos_path(&self) -> &Path {
        &self.as_upload().videos_path
    }

    pub fn chunk_store_path(&self) -> &Path {
        &self.as_upload().chunk_store_path
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_upload().local_storage_base_url.as_deref()
    }

    pub fn remote(&self) -> &RemoteConfig {
        &self.as_upload().remote
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.as_upload().max_upload_size_bytes
    }

    pub fn s3_multipart_threshold_bytes(&self) -> u64 {
        self.as_upload().s3_multipart_threshold_bytes
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl UploadServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let s3_multipart_threshold_mb = env::var("S3_MULTIPART_THRESHOLD_MB")
            .unwrap_or_else(|_| S3_MULTIPART_THRESHOLD_MB.to_string())
            .parse::<u64>()
            .unwrap_or(S3_MULTIPART_THRESHOLD_MB);

        let remote = RemoteConfig {
            region: non_empty_var("S3_REGION")
                .or_else(|| non_empty_var("AWS_REGION"))
                .unwrap_or_default(),
            bucket: non_empty_var("S3_BUCKET").unwrap_or_default(),
            endpoint: non_empty_var("S3_ENDPOINT"),
        };

        let config = UploadServiceConfig {
            base: BaseConfig {
                server_port: env::var("PORT")
                    .unwrap_or_else(|_| SERVER_PORT.to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
                cors_origins,
                environment,
            },
            videos_path: PathBuf::from(
                env::var("VIDEOS_PATH").unwrap_or_else(|_| "videos".to_string()),
            ),
            chunk_store_path: PathBuf::from(
                env::var("CHUNK_STORE_PATH").unwrap_or_else(|_| "uploads".to_string()),
            ),
            local_storage_base_url: non_empty_var("LOCAL_STORAGE_BASE_URL"),
            remote,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            s3_multipart_threshold_bytes: s3_multipart_threshold_mb * 1024 * 1024,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.videos_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("VIDEOS_PATH must not be empty"));
        }

        if self.chunk_store_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("CHUNK_STORE_PATH must not be empty"));
        }

        // Partial uploads must never be reachable through the served directory
        if self.chunk_store_path == self.videos_path
            || self.chunk_store_path.starts_with(&self.videos_path)
        {
            return Err(anyhow::anyhow!(
                "CHUNK_STORE_PATH must not be inside VIDEOS_PATH"
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        // Remote storage is optional; uploads routed to it fail individually when unset
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> UploadServiceConfig {
        UploadServiceConfig {
            base: BaseConfig {
                server_port: 4000,
                cors_origins: vec!["*".to_string()],
                environment: "test".to_string(),
            },
            videos_path: PathBuf::from("/srv/videos"),
            chunk_store_path: PathBuf::from("/srv/uploads"),
            local_storage_base_url: None,
            remote: RemoteConfig::default(),
            max_upload_size_bytes: 1024,
            s3_multipart_threshold_bytes: 1024,
        }
    }

    #[test]
    fn test_validate_accepts_sibling_directories() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_chunk_store_inside_videos() {
        let mut config = test_config();
        config.chunk_store_path = PathBuf::from("/srv/videos/partial");
        assert!(config.validate().is_err());

        config.chunk_store_path = PathBuf::from("/srv/videos");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_remote_settings_do_not_fail_validation() {
        let config = test_config();
        assert!(!config.remote.is_complete());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_missing_fields() {
        assert_eq!(
            RemoteConfig::new(" ", "").missing_fields(),
            vec!["region", "bucket"]
        );
        assert_eq!(
            RemoteConfig::new("eu-west-1", "").missing_fields(),
            vec!["bucket"]
        );
        assert!(RemoteConfig::new("eu-west-1", "videos").is_complete());
    }

    #[test]
    fn test_production_detection() {
        let mut config = test_config();
        config.base.environment = "Prod".to_string();
        assert!(Config::new(config).is_production());
    }
}
