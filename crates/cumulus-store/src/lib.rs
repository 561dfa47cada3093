//! # Cumulus Store
//!
//! Storage service boundary for the Cumulus blob transfer engine.
//!
//! This crate provides:
//! - **`StorageService` trait**: block staging, block list commit, and
//!   container/blob operations behind one narrow async interface
//! - **`RemoteStore`**: HTTP client for a block-oriented object store
//! - **`MemoryStore`**: in-memory reference implementation for tests and
//!   local experimentation
//!
//! The transfer engine in `cumulus-transfer` only ever talks to the
//! [`StorageService`] trait; everything wire-level lives here.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cumulus_store::{Config, RemoteStore, StorageService, BlockId};
//!
//! let store = RemoteStore::new(Config::new("http://localhost:10000"))?;
//! let id = BlockId::generate();
//! store.stage_block("container", "blob.bin", &id, payload).await?;
//! store.commit_block_list("container", "blob.bin", &[id]).await?;
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod remote;
pub mod types;

pub use config::Config;
pub use error::{CommitError, Result, StageError, StoreError};
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use types::{BlobProperties, BlockId, ContainerProperties, PublicAccess};

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Maximum size of a single staged block (4000 MiB, service limit)
pub const MAX_STAGE_SIZE: u64 = 4000 * 1024 * 1024;

/// Maximum number of blocks in one committed block list
pub const MAX_BLOCK_COUNT: usize = 50_000;

/// Narrow interface to a block-oriented object store.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and
/// safe to call from many tasks at once. Retry and backoff, if any, belong
/// to the implementation; callers treat every error as final.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Upload one block to the staging area under `block_id`.
    ///
    /// Staged blocks are not visible until committed and are garbage
    /// collected by the store after a retention window if never committed.
    async fn stage_block(
        &self,
        container: &str,
        blob: &str,
        block_id: &BlockId,
        payload: Bytes,
    ) -> std::result::Result<(), StageError>;

    /// Assemble previously staged blocks, in the given order, into one
    /// durable blob. An empty list commits an empty blob.
    async fn commit_block_list(
        &self,
        container: &str,
        blob: &str,
        block_ids: &[BlockId],
    ) -> std::result::Result<(), CommitError>;

    /// Create a container
    async fn create_container(&self, container: &str) -> Result<()>;

    /// Fetch container properties and metadata
    async fn get_container_properties(&self, container: &str) -> Result<ContainerProperties>;

    /// Replace the container's user metadata
    async fn set_container_metadata(
        &self,
        container: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<()>;

    /// Upload a blob in one request, replacing any existing blob
    async fn put_blob(&self, container: &str, blob: &str, payload: Bytes) -> Result<()>;

    /// Fetch blob properties
    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties>;

    /// Read `length` bytes of a blob starting at `offset`
    async fn get_blob_range(
        &self,
        container: &str,
        blob: &str,
        offset: u64,
        length: u64,
    ) -> Result<Bytes>;

    /// Replace the blob's searchable index tags
    async fn set_blob_tags(
        &self,
        container: &str,
        blob: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<()>;
}
