//! Block identifiers and container/blob property types

use base64::{engine::general_purpose::URL_SAFE, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque token identifying one staged block within a transfer session.
///
/// Generated from a random UUID and base64-encoded (URL-safe alphabet) so
/// it can ride in query strings and XML untouched. Never reused across
/// sessions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    /// Generate a fresh, unique block ID
    pub fn generate() -> Self {
        Self(URL_SAFE.encode(Uuid::new_v4().to_string()))
    }

    /// Wrap an existing encoded token
    pub fn from_encoded(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The encoded token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Container public access level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicAccess {
    /// No anonymous access
    #[default]
    None,
    /// Anonymous read access to blobs only
    Blob,
    /// Anonymous read access to blobs and container listings
    Container,
}

impl PublicAccess {
    /// Parse the wire representation, defaulting to `None` for unknown values
    pub fn parse(value: &str) -> Self {
        match value {
            "blob" => Self::Blob,
            "container" => Self::Container,
            _ => Self::None,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Blob => "blob",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for PublicAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties of a container
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerProperties {
    /// Public access level
    pub public_access: PublicAccess,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// User-defined metadata
    pub metadata: BTreeMap<String, String>,
}

/// Properties of a committed blob
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobProperties {
    /// Total size in bytes
    pub content_length: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
}
