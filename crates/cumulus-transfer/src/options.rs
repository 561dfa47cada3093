//! Tunable transfer parameters

use crate::error::{Result, TransferError};
use cumulus_store::MAX_STAGE_SIZE;

/// Default number of parallel staging workers
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

/// Default single-shot threshold for seekable, size-known sources (8 MiB)
pub const DEFAULT_INITIAL_TRANSFER_SIZE: u64 = 8 * 1024 * 1024;

/// Default maximum length of one transfer request (4 MiB)
pub const DEFAULT_MAX_TRANSFER_SIZE: u64 = 4 * 1024 * 1024;

/// Default block size for staged uploads (4 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Tunable parameters for uploads and downloads.
///
/// `block_size <= max_transfer_size` is recommended but not enforced.
/// `initial_transfer_size` only affects seekable, size-known sources: an
/// upload at or below it goes out as one request instead of staged blocks,
/// and a download's first range request uses it.
#[derive(Clone, Debug)]
pub struct TransferOptions {
    /// Maximum number of staging operations in flight at once
    pub max_concurrency: usize,
    /// Single-shot threshold and first download range length
    pub initial_transfer_size: u64,
    /// Maximum length of one download range request
    pub max_transfer_size: u64,
    /// Size of each staged block
    pub block_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            initial_transfer_size: DEFAULT_INITIAL_TRANSFER_SIZE,
            max_transfer_size: DEFAULT_MAX_TRANSFER_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl TransferOptions {
    /// Set the maximum number of parallel staging workers
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the single-shot threshold
    pub fn with_initial_transfer_size(mut self, size: u64) -> Self {
        self.initial_transfer_size = size;
        self
    }

    /// Set the maximum download range length
    pub fn with_max_transfer_size(mut self, size: u64) -> Self {
        self.max_transfer_size = size;
        self
    }

    /// Set the staged block size
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Validate and canonicalize. Pure: no I/O happens before this passes.
    pub fn resolve(self) -> Result<Self> {
        if self.max_concurrency < 1 {
            return Err(TransferError::InvalidOptions(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(TransferError::InvalidOptions(
                "block_size must be greater than 0".to_string(),
            ));
        }
        if self.max_transfer_size == 0 {
            return Err(TransferError::InvalidOptions(
                "max_transfer_size must be greater than 0".to_string(),
            ));
        }
        if self.initial_transfer_size == 0 {
            return Err(TransferError::InvalidOptions(
                "initial_transfer_size must be greater than 0".to_string(),
            ));
        }
        if self.block_size as u64 > MAX_STAGE_SIZE {
            return Err(TransferError::InvalidOptions(format!(
                "block_size exceeds the {MAX_STAGE_SIZE} byte staging limit"
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let options = TransferOptions::default().resolve().unwrap();
        assert_eq!(options.max_concurrency, 2);
        assert_eq!(options.block_size, 4 * 1024 * 1024);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = TransferOptions::default()
            .with_max_concurrency(0)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidOptions(_)));
    }

    #[test]
    fn zero_block_size_rejected() {
        let err = TransferOptions::default()
            .with_block_size(0)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidOptions(_)));
    }

    #[test]
    fn zero_max_transfer_size_rejected() {
        let err = TransferOptions::default()
            .with_max_transfer_size(0)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidOptions(_)));
    }

    #[test]
    fn oversized_block_is_permitted() {
        // Recommended to stay within max_transfer_size, but not enforced.
        let options = TransferOptions::default()
            .with_block_size(16 * 1024 * 1024)
            .resolve()
            .unwrap();
        assert_eq!(options.block_size, 16 * 1024 * 1024);
    }
}
