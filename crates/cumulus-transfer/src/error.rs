//! Error types for the cumulus-transfer crate

use cumulus_store::{CommitError, StageError, StoreError};
use thiserror::Error;

/// Result type alias using `TransferError`
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors that can occur during a transfer.
///
/// A transfer surfaces the first error it observes and stops; there is no
/// partial recovery. Either the whole object commits or nothing does.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Local I/O fault while splitting the source
    #[error("source read failed: {0}")]
    SourceRead(#[source] std::io::Error),

    /// The store rejected one staged block
    #[error(transparent)]
    Stage(#[from] StageError),

    /// The store rejected the final block list
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// A non-transfer store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Caller configuration rejected before any I/O
    #[error("invalid transfer options: {0}")]
    InvalidOptions(String),

    /// Local I/O fault while writing downloaded bytes
    #[error("sink write failed: {0}")]
    Sink(#[source] std::io::Error),

    /// A staging task ended without producing a result
    #[error("staging task failed: {0}")]
    TaskFailed(String),
}
