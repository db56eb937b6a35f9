use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where a finished upload ends up.
///
/// Resolved once from the `storageType` upload metadata value and then used to
/// pick a backend. Only `"s3"` selects the remote object store; every other value,
/// including a missing or undecodable one, falls back to local storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum StorageTarget {
    #[default]
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "s3")]
    Remote,
}

impl StorageTarget {
    pub fn from_storage_type(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("s3") {
            StorageTarget::Remote
        } else {
            StorageTarget::Local
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTarget::Local => "local",
            StorageTarget::Remote => "s3",
        }
    }
}

impl Display for StorageTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
