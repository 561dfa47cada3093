//! Block splitting
//!
//! Divides a byte source of known length into an ordered sequence of
//! bounded-size blocks covering it exactly, with no gaps or overlaps.

use crate::error::{Result, TransferError};
use bytes::Bytes;
use std::io::Read;

/// One bounded-size contiguous chunk of a source
#[derive(Clone, Debug)]
pub struct Block {
    /// Position in the source, starting at 0
    pub index: u64,
    /// The chunk payload, never empty
    pub data: Bytes,
}

impl Block {
    /// Size of the payload in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Lazy, finite, non-restartable splitter over a source of known length.
///
/// Every block has a size in `(0, block_size]`; the final block carries
/// `len % block_size` bytes when that is nonzero, else exactly
/// `block_size`. The source cursor advances monotonically; a splitter must
/// not be shared between callers. A read fault discards any partially read
/// bytes and surfaces [`TransferError::SourceRead`] with no block emitted.
pub struct BlockSplitter<R> {
    source: R,
    block_size: usize,
    remaining: u64,
    next_index: u64,
}

impl<R: Read> BlockSplitter<R> {
    /// Split `source`, of exactly `len` bytes, into blocks of `block_size`.
    ///
    /// `block_size` must already be validated nonzero by the options
    /// resolver.
    pub fn new(source: R, len: u64, block_size: usize) -> Self {
        debug_assert!(block_size > 0);
        Self {
            source,
            block_size,
            remaining: len,
            next_index: 0,
        }
    }

    /// Pull the next block. Returns `Ok(None)` once the source is covered.
    ///
    /// A source that ends before the declared length is a read fault.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let size = self.remaining.min(self.block_size as u64) as usize;
        let mut buf = vec![0u8; size];
        self.source
            .read_exact(&mut buf)
            .map_err(TransferError::SourceRead)?;

        self.remaining -= size as u64;
        let block = Block {
            index: self.next_index,
            data: Bytes::from(buf),
        };
        self.next_index += 1;
        Ok(Some(block))
    }

    /// Bytes not yet emitted
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

/// Number of blocks a source of `len` bytes splits into
pub fn block_count(len: u64, block_size: usize) -> u64 {
    if len == 0 {
        return 0;
    }
    len.div_ceil(block_size as u64)
}
