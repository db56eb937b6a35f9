//! Upload metadata decoding
//!
//! Clients attach key/value metadata to an upload. Values travel base64 encoded
//! inside the transfer envelope and decode to UTF-8 text. Only `filename` and
//! `storageType` are required; `filetype` is picked up when present.

use std::collections::HashMap;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;

use crate::storage_types::StorageTarget;

/// Metadata exactly as supplied by the transfer layer: key -> encoded value.
pub type RawMetadata = HashMap<String, String>;

pub const FILENAME_KEY: &str = "filename";
pub const STORAGE_TYPE_KEY: &str = "storageType";
pub const FILETYPE_KEY: &str = "filetype";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("Missing upload metadata key: {0}")]
    MissingKey(&'static str),

    #[error("Upload metadata value for '{0}' is not valid base64")]
    InvalidEncoding(&'static str),

    #[error("Upload metadata value for '{0}' is not valid UTF-8 text")]
    InvalidText(&'static str),
}

/// Decoded, plain-text upload metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    pub filename: String,
    pub storage_type: String,
    pub content_type: Option<String>,
}

impl UploadMetadata {
    /// Metadata used when the client's metadata cannot be decoded: the upload id
    /// stands in for the filename and the upload goes to local storage.
    pub fn fallback(upload_id: &str) -> Self {
        Self {
            filename: upload_id.to_string(),
            storage_type: StorageTarget::Local.to_string(),
            content_type: None,
        }
    }

    pub fn target(&self) -> StorageTarget {
        StorageTarget::from_storage_type(&self.storage_type)
    }
}

/// Decoder for transport-encoded upload metadata.
pub struct MetadataCodec;

impl MetadataCodec {
    /// Decode the required `filename` and `storageType` keys (and the optional `filetype`).
    pub fn decode(raw: &RawMetadata) -> Result<UploadMetadata, MetadataError> {
        let filename = Self::required(raw, FILENAME_KEY)?;
        let storage_type = Self::required(raw, STORAGE_TYPE_KEY)?;

        // filetype is advisory; a broken value is ignored rather than failing the decode
        let content_type = raw
            .get(FILETYPE_KEY)
            .and_then(|value| Self::decode_value(FILETYPE_KEY, value).ok())
            .filter(|value| !value.trim().is_empty());

        Ok(UploadMetadata {
            filename,
            storage_type,
            content_type,
        })
    }

    /// Decode a single base64 value into UTF-8 text.
    pub fn decode_value(key: &'static str, value: &str) -> Result<String, MetadataError> {
        let value = value.trim();
        let bytes = STANDARD
            .decode(value)
            .or_else(|_| STANDARD_NO_PAD.decode(value))
            .map_err(|_| MetadataError::InvalidEncoding(key))?;

        String::from_utf8(bytes).map_err(|_| MetadataError::InvalidText(key))
    }

    /// Encode a plain value the way clients are expected to send it.
    pub fn encode_value(value: &str) -> String {
        STANDARD.encode(value.as_bytes())
    }

    fn required(raw: &RawMetadata, key: &'static str) -> Result<String, MetadataError> {
        let value = raw.get(key).ok_or(MetadataError::MissingKey(key))?;
        Self::decode_value(key, value)
    }
}
