//! # Cumulus Transfer
//!
//! Chunked blob transfer engine: splits a byte source into bounded-size
//! blocks, stages them concurrently against a
//! [`StorageService`](cumulus_store::StorageService), and commits an
//! index-ordered block list to assemble the remote object.
//!
//! The one invariant everything here serves: **commit order equals source
//! order**, regardless of the order staging operations happen to complete
//! in. In-flight staging is bounded by `max_concurrency`, so memory use is
//! bounded by `max_concurrency * block_size` rather than by source size.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cumulus_store::{Config, RemoteStore};
//! use cumulus_transfer::{TransferCoordinator, TransferOptions};
//! use std::sync::Arc;
//!
//! let store = Arc::new(RemoteStore::new(Config::new("http://localhost:10000"))?);
//! let options = TransferOptions::default()
//!     .with_max_concurrency(4)
//!     .with_block_size(4 * 1024 * 1024);
//! let coordinator = TransferCoordinator::new(store, options)?;
//!
//! let file = std::fs::File::open("data.bin")?;
//! let len = file.metadata()?.len();
//! coordinator.upload("container", "data.bin", file, len).await?;
//! ```

mod downloader;
pub mod error;
pub mod options;
pub mod splitter;
pub mod uploader;

pub use error::{Result, TransferError};
pub use options::{
    TransferOptions, DEFAULT_BLOCK_SIZE, DEFAULT_INITIAL_TRANSFER_SIZE, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_TRANSFER_SIZE,
};
pub use splitter::{block_count, Block, BlockSplitter};
pub use uploader::{ProgressCallback, TransferCoordinator, UploadProgress};
