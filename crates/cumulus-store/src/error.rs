//! Error types for the cumulus-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Rejection of a single staged block.
///
/// `status` is the HTTP status reported by the store, or 0 when the
/// request never reached it (connection-level fault).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("block staging rejected ({status} {code}): {message}")]
pub struct StageError {
    /// HTTP status code, 0 for transport faults
    pub status: u16,
    /// Service error code, e.g. "ContainerNotFound"
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl StageError {
    /// Build from a service rejection
    pub fn rejected(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build from a connection-level fault that never produced a response
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            code: "Transport".to_string(),
            message: message.into(),
        }
    }
}

/// Rejection of a final block list.
///
/// Terminal for a transfer: staged blocks may have expired, so a commit
/// is never retried with the same manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("block list commit rejected ({status} {code}): {message}")]
pub struct CommitError {
    /// HTTP status code, 0 for transport faults
    pub status: u16,
    /// Service error code, e.g. "InvalidBlockList"
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl CommitError {
    /// Build from a service rejection
    pub fn rejected(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build from a connection-level fault that never produced a response
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            code: "Transport".to_string(),
            message: message.into(),
        }
    }
}

/// Errors from the non-transfer storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Block staging rejection
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Block list commit rejection
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Container does not exist
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Blob does not exist
    #[error("blob not found: {container}/{blob}")]
    BlobNotFound { container: String, blob: String },

    /// Requested byte range outside the blob
    #[error("invalid range: offset {offset} + length {length} exceeds blob size {size}")]
    InvalidRange { offset: u64, length: u64, size: u64 },

    /// Service rejected the request
    #[error("service error ({status} {code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// Response could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    /// HTTP error
    #[error("http error: {0}")]
    Http(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connect() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Http(err.to_string())
        }
    }
}
