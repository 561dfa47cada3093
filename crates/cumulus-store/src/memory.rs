//! In-memory storage service for tests and local experimentation

use crate::error::{CommitError, Result, StageError, StoreError};
use crate::types::{BlobProperties, BlockId, ContainerProperties, PublicAccess};
use crate::StorageService;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct ContainerState {
    public_access: PublicAccess,
    last_modified: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
struct BlobState {
    data: Bytes,
    last_modified: DateTime<Utc>,
    tags: BTreeMap<String, String>,
}

/// An in-memory storage service.
///
/// Behaves like the remote store for the operations the transfer engine
/// needs: blocks staged under a `(container, blob)` pair stay invisible
/// until a commit assembles them in manifest order, and a commit consumes
/// the whole staging set for that blob, tracked or not.
///
/// Operation counters are exposed so tests can assert on call counts.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    containers: Arc<DashMap<String, ContainerState>>,
    staged: Arc<DashMap<(String, String), HashMap<BlockId, Bytes>>>,
    blobs: Arc<DashMap<(String, String), BlobState>>,
    stage_calls: Arc<AtomicUsize>,
    commit_calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with `container` already present
    pub fn with_container(container: &str) -> Self {
        let store = Self::new();
        store.insert_container(container);
        store
    }

    fn insert_container(&self, container: &str) {
        self.containers.insert(
            container.to_string(),
            ContainerState {
                public_access: PublicAccess::None,
                last_modified: Utc::now(),
                metadata: BTreeMap::new(),
            },
        );
    }

    /// Number of `stage_block` calls received
    pub fn stage_calls(&self) -> usize {
        self.stage_calls.load(Ordering::Relaxed)
    }

    /// Number of `commit_block_list` calls received
    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::Relaxed)
    }

    /// The committed bytes of a blob, if it exists
    pub fn blob(&self, container: &str, blob: &str) -> Option<Bytes> {
        self.blobs
            .get(&(container.to_string(), blob.to_string()))
            .map(|state| state.data.clone())
    }

    /// The tags of a committed blob, if it exists
    pub fn blob_tags(&self, container: &str, blob: &str) -> Option<BTreeMap<String, String>> {
        self.blobs
            .get(&(container.to_string(), blob.to_string()))
            .map(|state| state.tags.clone())
    }

    /// Number of blocks currently staged for a blob
    pub fn staged_count(&self, container: &str, blob: &str) -> usize {
        self.staged
            .get(&(container.to_string(), blob.to_string()))
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Drop all uncommitted staged blocks
    pub fn clear_staged(&self) {
        self.staged.clear();
    }
}

#[async_trait]
impl StorageService for MemoryStore {
    async fn stage_block(
        &self,
        container: &str,
        blob: &str,
        block_id: &BlockId,
        payload: Bytes,
    ) -> std::result::Result<(), StageError> {
        self.stage_calls.fetch_add(1, Ordering::Relaxed);
        if !self.containers.contains_key(container) {
            return Err(StageError::rejected(
                404,
                "ContainerNotFound",
                format!("container {container} does not exist"),
            ));
        }
        self.staged
            .entry((container.to_string(), blob.to_string()))
            .or_default()
            .insert(block_id.clone(), payload);
        Ok(())
    }

    async fn commit_block_list(
        &self,
        container: &str,
        blob: &str,
        block_ids: &[BlockId],
    ) -> std::result::Result<(), CommitError> {
        self.commit_calls.fetch_add(1, Ordering::Relaxed);
        if !self.containers.contains_key(container) {
            return Err(CommitError::rejected(
                404,
                "ContainerNotFound",
                format!("container {container} does not exist"),
            ));
        }

        let key = (container.to_string(), blob.to_string());
        // Commit consumes the staging set whether it succeeds or not;
        // a failed manifest leaves no stragglers behind.
        let staged = self.staged.remove(&key).map(|(_, set)| set).unwrap_or_default();

        let mut assembled = Vec::new();
        for id in block_ids {
            match staged.get(id) {
                Some(payload) => assembled.extend_from_slice(payload),
                None => {
                    return Err(CommitError::rejected(
                        400,
                        "InvalidBlockList",
                        format!("block {id} was never staged or has expired"),
                    ));
                }
            }
        }

        self.blobs.insert(
            key,
            BlobState {
                data: Bytes::from(assembled),
                last_modified: Utc::now(),
                tags: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        if self.containers.contains_key(container) {
            return Err(StoreError::Service {
                status: 409,
                code: "ContainerAlreadyExists".to_string(),
                message: format!("container {container} already exists"),
            });
        }
        self.insert_container(container);
        Ok(())
    }

    async fn get_container_properties(&self, container: &str) -> Result<ContainerProperties> {
        let state = self
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(ContainerProperties {
            public_access: state.public_access,
            last_modified: state.last_modified,
            metadata: state.metadata.clone(),
        })
    }

    async fn set_container_metadata(
        &self,
        container: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        state.metadata = metadata;
        state.last_modified = Utc::now();
        Ok(())
    }

    async fn put_blob(&self, container: &str, blob: &str, payload: Bytes) -> Result<()> {
        if !self.containers.contains_key(container) {
            return Err(StoreError::ContainerNotFound(container.to_string()));
        }
        self.blobs.insert(
            (container.to_string(), blob.to_string()),
            BlobState {
                data: payload,
                last_modified: Utc::now(),
                tags: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        let state = self
            .blobs
            .get(&(container.to_string(), blob.to_string()))
            .ok_or_else(|| StoreError::BlobNotFound {
                container: container.to_string(),
                blob: blob.to_string(),
            })?;
        Ok(BlobProperties {
            content_length: state.data.len() as u64,
            last_modified: state.last_modified,
        })
    }

    async fn get_blob_range(
        &self,
        container: &str,
        blob: &str,
        offset: u64,
        length: u64,
    ) -> Result<Bytes> {
        let state = self
            .blobs
            .get(&(container.to_string(), blob.to_string()))
            .ok_or_else(|| StoreError::BlobNotFound {
                container: container.to_string(),
                blob: blob.to_string(),
            })?;
        let size = state.data.len() as u64;
        if offset.checked_add(length).is_none() || offset + length > size {
            return Err(StoreError::InvalidRange {
                offset,
                length,
                size,
            });
        }
        Ok(state.data.slice(offset as usize..(offset + length) as usize))
    }

    async fn set_blob_tags(
        &self,
        container: &str,
        blob: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self
            .blobs
            .get_mut(&(container.to_string(), blob.to_string()))
            .ok_or_else(|| StoreError::BlobNotFound {
                container: container.to_string(),
                blob: blob.to_string(),
            })?;
        state.tags = tags;
        Ok(())
    }
}
