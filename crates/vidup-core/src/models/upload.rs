use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::metadata::RawMetadata;
use crate::storage_types::StorageTarget;

/// One in-flight or completed transfer.
///
/// The serialized form is what the chunk store persists next to the data file;
/// `bytes_received` and `chunk_store_path` are always re-derived from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub upload_id: String,
    #[serde(skip)]
    pub bytes_received: u64,
    /// Total length announced by the client. `None` while the length is deferred.
    pub declared_length: Option<u64>,
    /// Client metadata, values still transport-encoded.
    pub metadata: RawMetadata,
    #[serde(skip)]
    pub chunk_store_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(upload_id: impl Into<String>, declared_length: Option<u64>, metadata: RawMetadata) -> Self {
        Self {
            upload_id: upload_id.into(),
            bytes_received: 0,
            declared_length,
            metadata,
            chunk_store_path: PathBuf::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.declared_length == Some(self.bytes_received)
    }

    /// Bytes still expected, if the length is known.
    pub fn remaining(&self) -> Option<u64> {
        self.declared_length
            .map(|declared| declared.saturating_sub(self.bytes_received))
    }
}

/// Durable home of a finalized upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageLocation {
    Local {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    S3 {
        bucket: String,
        key: String,
        url: String,
    },
}

impl StorageLocation {
    pub fn target(&self) -> StorageTarget {
        match self {
            StorageLocation::Local { .. } => StorageTarget::Local,
            StorageLocation::S3 { .. } => StorageTarget::Remote,
        }
    }
}

/// A finished upload in its final location. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinalizedArtifact {
    /// Random identifier plus the original extension, e.g. `3f2a…9c.mp4`
    pub generated_name: String,
    pub location: StorageLocation,
    pub content_type: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_completion() {
        let mut session = UploadSession::new("abc", Some(10), RawMetadata::new());
        assert!(!session.is_complete());
        assert_eq!(session.remaining(), Some(10));

        session.bytes_received = 10;
        assert!(session.is_complete());
        assert_eq!(session.remaining(), Some(0));
    }

    #[test]
    fn test_deferred_length_never_complete() {
        let mut session = UploadSession::new("abc", None, RawMetadata::new());
        session.bytes_received = 42;
        assert!(!session.is_complete());
        assert_eq!(session.remaining(), None);
    }

    #[test]
    fn test_persisted_form_skips_derived_fields() {
        let mut session = UploadSession::new("abc", Some(3), RawMetadata::new());
        session.bytes_received = 2;
        session.chunk_store_path = PathBuf::from("/tmp/abc");

        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("bytes_received").is_none());
        assert!(json.get("chunk_store_path").is_none());

        let restored: UploadSession = serde_json::from_value(json).unwrap();
        assert_eq!(restored.upload_id, "abc");
        assert_eq!(restored.declared_length, Some(3));
        assert_eq!(restored.bytes_received, 0);
    }

    #[test]
    fn test_location_serialization() {
        let location = StorageLocation::S3 {
            bucket: "videos".to_string(),
            key: "a.mp4".to_string(),
            url: "https://videos.s3.eu-west-1.amazonaws.com/a.mp4".to_string(),
        };
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["backend"], "s3");
        assert_eq!(json["key"], "a.mp4");
        assert_eq!(location.target(), StorageTarget::Remote);
    }
}
