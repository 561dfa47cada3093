//! Tunable ranged download
//!
//! The blob is read as one `initial_transfer_size` range followed by
//! `max_transfer_size` ranges, fetched in windows of `max_concurrency` and
//! written to the sink strictly in offset order.

use crate::error::{Result, TransferError};
use crate::uploader::TransferCoordinator;
use cumulus_store::StorageService;
use futures::future::try_join_all;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

impl<S: StorageService + 'static> TransferCoordinator<S> {
    /// Download a blob into `sink`, returning the number of bytes written.
    ///
    /// A zero-length blob writes nothing and succeeds.
    pub async fn download<W: Write>(
        &self,
        container: &str,
        blob: &str,
        sink: &mut W,
    ) -> Result<u64> {
        let store = self.store();
        let options = self.options();

        let props = store.get_blob_properties(container, blob).await?;
        let len = props.content_length;
        if len == 0 {
            return Ok(0);
        }

        let mut ranges: Vec<(u64, u64)> = Vec::new();
        let first = len.min(options.initial_transfer_size);
        ranges.push((0, first));
        let mut offset = first;
        while offset < len {
            let take = (len - offset).min(options.max_transfer_size);
            ranges.push((offset, take));
            offset += take;
        }

        debug!(len, ranges = ranges.len(), "downloading");
        for window in ranges.chunks(options.max_concurrency) {
            let fetches = window.iter().map(|&(offset, take)| {
                let store = Arc::clone(store);
                async move { store.get_blob_range(container, blob, offset, take).await }
            });
            // Window results arrive position-ordered, so writes stay in
            // offset order no matter which fetch finished first.
            let parts = try_join_all(fetches).await?;
            for part in parts {
                sink.write_all(&part).map_err(TransferError::Sink)?;
            }
        }

        Ok(len)
    }
}
