//! Transfer coordination
//!
//! The coordinator pulls blocks lazily from the splitter, keeps at most
//! `max_concurrency` staging operations in flight, records `(index,
//! BlockId)` pairs in whatever order staging completes, and commits the
//! pairs sorted by index. Commit order always equals source order, never
//! staging-completion order.

use crate::error::{Result, TransferError};
use crate::options::TransferOptions;
use crate::splitter::{block_count, BlockSplitter};
use bytes::Bytes;
use cumulus_store::{BlockId, StageError, StorageService, MAX_BLOCK_COUNT};
use std::io::Read;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Upload progress information
#[derive(Clone, Debug)]
pub struct UploadProgress {
    /// Bytes staged so far
    pub bytes_uploaded: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
    /// Blocks staged so far
    pub blocks_staged: u64,
    /// Total number of blocks
    pub total_blocks: u64,
}

impl UploadProgress {
    /// Percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_uploaded as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Outcome of a staging task: source index, assigned ID, payload size
type Staged = std::result::Result<(u64, BlockId, usize), StageError>;

/// Coordinates chunked transfers against one storage service.
///
/// Holds no global state: the store and options are supplied at
/// construction and the options are validated there, before any I/O.
#[derive(Debug)]
pub struct TransferCoordinator<S> {
    store: Arc<S>,
    options: TransferOptions,
}

impl<S: StorageService + 'static> TransferCoordinator<S> {
    /// Create a coordinator, rejecting invalid options up front
    pub fn new(store: Arc<S>, options: TransferOptions) -> Result<Self> {
        let options = options.resolve()?;
        Ok(Self { store, options })
    }

    /// The resolved options in effect
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// The storage service this coordinator talks to
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Upload a source of known length, picking the cheapest path.
    ///
    /// At or below `initial_transfer_size` the whole source goes out as a
    /// single `put_blob` request (this is where a zero-length source lands
    /// by default). Larger sources take the staged block path.
    pub async fn upload<R: Read>(
        &self,
        container: &str,
        blob: &str,
        source: R,
        len: u64,
    ) -> Result<()> {
        if len <= self.options.initial_transfer_size {
            let payload = read_fully(source, len)?;
            debug!(len, "single-shot upload");
            self.store.put_blob(container, blob, payload).await?;
            return Ok(());
        }
        self.upload_blocks(container, blob, source, len, None).await
    }

    /// Upload a source as staged blocks and commit them in source order.
    ///
    /// Memory use is bounded by `max_concurrency * block_size`: block
    /// production suspends while the in-flight window is full. The first
    /// error aborts the remaining staging operations best-effort and no
    /// commit is attempted. A zero-length source commits an empty block
    /// list, which produces an empty blob.
    ///
    /// Dropping the returned future cancels the transfer: in-flight
    /// staging tasks are aborted and no commit is issued.
    pub async fn upload_blocks<R: Read>(
        &self,
        container: &str,
        blob: &str,
        source: R,
        len: u64,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let total_blocks = block_count(len, self.options.block_size);
        if total_blocks > MAX_BLOCK_COUNT as u64 {
            return Err(TransferError::InvalidOptions(format!(
                "{len} bytes at block_size {} needs {total_blocks} blocks, over the {MAX_BLOCK_COUNT} block list limit",
                self.options.block_size
            )));
        }
        let mut splitter = BlockSplitter::new(source, len, self.options.block_size);
        let mut tasks: JoinSet<Staged> = JoinSet::new();
        let mut staged: Vec<(u64, BlockId)> = Vec::with_capacity(total_blocks as usize);
        let mut bytes_uploaded = 0u64;

        debug!(len, total_blocks, "staging");
        loop {
            // Backpressure: wait for a slot before pulling the next block.
            while tasks.len() >= self.options.max_concurrency {
                if let Err(e) = record_staged(
                    &mut tasks,
                    &mut staged,
                    &mut bytes_uploaded,
                    len,
                    total_blocks,
                    progress.as_deref(),
                )
                .await
                {
                    abandon(&mut tasks).await;
                    return Err(e);
                }
            }

            let block = match splitter.next_block() {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(e) => {
                    abandon(&mut tasks).await;
                    return Err(e);
                }
            };

            let store = Arc::clone(&self.store);
            let container = container.to_string();
            let blob = blob.to_string();
            let block_id = BlockId::generate();
            tasks.spawn(async move {
                let size = block.data.len();
                store
                    .stage_block(&container, &blob, &block_id, block.data)
                    .await?;
                Ok((block.index, block_id, size))
            });
        }

        debug!(in_flight = tasks.len(), "awaiting remaining blocks");
        while !tasks.is_empty() {
            if let Err(e) = record_staged(
                &mut tasks,
                &mut staged,
                &mut bytes_uploaded,
                len,
                total_blocks,
                progress.as_deref(),
            )
            .await
            {
                abandon(&mut tasks).await;
                return Err(e);
            }
        }

        // Restore source order regardless of staging completion order.
        staged.sort_unstable_by_key(|(index, _)| *index);
        let manifest: Vec<BlockId> = staged.into_iter().map(|(_, id)| id).collect();

        debug!(blocks = manifest.len(), "committing");
        self.store
            .commit_block_list(container, blob, &manifest)
            .await?;
        debug!("done");
        Ok(())
    }
}

/// Join the next staging task and record its outcome
async fn record_staged(
    tasks: &mut JoinSet<Staged>,
    staged: &mut Vec<(u64, BlockId)>,
    bytes_uploaded: &mut u64,
    total_bytes: u64,
    total_blocks: u64,
    progress: Option<&(dyn Fn(UploadProgress) + Send + Sync)>,
) -> Result<()> {
    let joined = tasks
        .join_next()
        .await
        .expect("record_staged called with an empty window");
    let (index, block_id, size) = joined
        .map_err(|e| TransferError::TaskFailed(e.to_string()))??;

    staged.push((index, block_id));
    *bytes_uploaded += size as u64;
    if let Some(report) = progress {
        report(UploadProgress {
            bytes_uploaded: *bytes_uploaded,
            total_bytes,
            blocks_staged: staged.len() as u64,
            total_blocks,
        });
    }
    Ok(())
}

/// Best-effort cancellation of the in-flight window
async fn abandon(tasks: &mut JoinSet<Staged>) {
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}

fn read_fully<R: Read>(mut source: R, len: u64) -> Result<Bytes> {
    let mut buf = vec![0u8; len as usize];
    source
        .read_exact(&mut buf)
        .map_err(TransferError::SourceRead)?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_store::MemoryStore;
    use std::io::Cursor;

    fn coordinator(store: &MemoryStore, options: TransferOptions) -> TransferCoordinator<MemoryStore> {
        TransferCoordinator::new(Arc::new(store.clone()), options).unwrap()
    }

    #[tokio::test]
    async fn zero_length_source_commits_empty_manifest() {
        let store = MemoryStore::with_container("c");
        let coordinator = coordinator(&store, TransferOptions::default());

        coordinator
            .upload_blocks("c", "empty.bin", Cursor::new(Vec::<u8>::new()), 0, None)
            .await
            .unwrap();

        assert_eq!(store.stage_calls(), 0);
        assert_eq!(store.commit_calls(), 1);
        assert_eq!(store.blob("c", "empty.bin").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn small_upload_takes_single_shot_path() {
        let store = MemoryStore::with_container("c");
        let coordinator = coordinator(&store, TransferOptions::default());

        let data = b"Sample blob data".to_vec();
        coordinator
            .upload("c", "small.txt", Cursor::new(data.clone()), data.len() as u64)
            .await
            .unwrap();

        assert_eq!(store.stage_calls(), 0);
        assert_eq!(store.commit_calls(), 0);
        assert_eq!(store.blob("c", "small.txt").unwrap().as_ref(), &data[..]);
    }

    #[tokio::test]
    async fn large_upload_takes_block_path() {
        let store = MemoryStore::with_container("c");
        let options = TransferOptions::default()
            .with_initial_transfer_size(16)
            .with_block_size(32);
        let coordinator = coordinator(&store, options);

        let data: Vec<u8> = (0..100u8).collect();
        coordinator
            .upload("c", "big.bin", Cursor::new(data.clone()), data.len() as u64)
            .await
            .unwrap();

        // 100 bytes in 32-byte blocks: 4 staged blocks, 1 commit.
        assert_eq!(store.stage_calls(), 4);
        assert_eq!(store.commit_calls(), 1);
        assert_eq!(store.blob("c", "big.bin").unwrap().as_ref(), &data[..]);
    }

    #[tokio::test]
    async fn invalid_options_fail_before_any_store_call() {
        let store = MemoryStore::with_container("c");
        let err =
            TransferCoordinator::new(Arc::new(store.clone()), TransferOptions::default().with_max_concurrency(0))
                .unwrap_err();
        assert!(matches!(err, TransferError::InvalidOptions(_)));
        assert_eq!(store.stage_calls(), 0);
        assert_eq!(store.commit_calls(), 0);
    }

    #[tokio::test]
    async fn block_count_over_service_limit_is_rejected() {
        let store = MemoryStore::with_container("c");
        let options = TransferOptions::default().with_block_size(1);
        let coordinator = coordinator(&store, options);

        // 60000 one-byte blocks would blow the 50000-entry block list limit.
        let err = coordinator
            .upload_blocks("c", "b", Cursor::new(vec![0u8; 60_000]), 60_000, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidOptions(_)));
        assert_eq!(store.stage_calls(), 0);
        assert_eq!(store.commit_calls(), 0);
    }

    #[tokio::test]
    async fn progress_reaches_completion() {
        let store = MemoryStore::with_container("c");
        let options = TransferOptions::default().with_block_size(8);
        let coordinator = coordinator(&store, options);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));

        let data = vec![9u8; 50];
        coordinator
            .upload_blocks("c", "p.bin", Cursor::new(data), 50, Some(progress))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 7); // ceil(50 / 8)
        let last = seen.last().unwrap();
        assert_eq!(last.bytes_uploaded, 50);
        assert_eq!(last.blocks_staged, 7);
        assert_eq!(last.total_blocks, 7);
        assert!((last.percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn source_fault_mid_transfer_aborts_without_commit() {
        let store = MemoryStore::with_container("c");
        let options = TransferOptions::default().with_block_size(4);
        let coordinator = coordinator(&store, options);

        // Declared 20 bytes, only 10 available: the splitter faults after
        // emitting two full blocks.
        let err = coordinator
            .upload_blocks("c", "t.bin", Cursor::new(vec![0u8; 10]), 20, None)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::SourceRead(_)));
        assert_eq!(store.commit_calls(), 0);
        assert!(store.blob("c", "t.bin").is_none());
    }
}
