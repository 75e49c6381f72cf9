//! FIFO of blocks awaiting consumption.
//!
//! Every block except possibly the newest is full, and an end-of-stream
//! marker, once pushed, stays at the tail.

use crate::block::Block;
use crate::error::{StreamError, StreamResult};
use std::collections::VecDeque;

/// Ordered queue of same-sized blocks, oldest first.
#[derive(Debug, Default)]
pub struct BlockBuffer {
    blocks: VecDeque<Block>,
}

impl BlockBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block at the tail.
    pub fn push_back(&mut self, block: Block) -> StreamResult<()> {
        if self.is_terminated() {
            return Err(StreamError::Terminated);
        }
        self.blocks.push_back(block);
        Ok(())
    }

    /// Remove the head block, if any
    pub fn pop_front(&mut self) -> Option<Block> {
        self.blocks.pop_front()
    }

    /// Oldest block
    pub fn front(&self) -> Option<&Block> {
        self.blocks.front()
    }

    /// Newest block
    pub fn back(&self) -> Option<&Block> {
        self.blocks.back()
    }

    /// Whether no blocks are queued
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of queued blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Whether the tail is the end-of-stream marker
    pub fn is_terminated(&self) -> bool {
        self.blocks.back().is_some_and(Block::is_end_of_stream)
    }

    /// Fold `bytes` into the buffer using blocks of `block_size`.
    ///
    /// The tail is topped up first and new blocks are started whenever the tail
    /// is full or absent, so block boundaries never depend on how the bytes were
    /// split across reads. Returns the number of blocks started.
    pub fn append_bytes(&mut self, mut bytes: &[u8], block_size: usize) -> StreamResult<usize> {
        if self.is_terminated() {
            return Err(StreamError::Terminated);
        }
        debug_assert!(block_size > 0, "block size must be non-zero");

        let mut started = 0;
        while !bytes.is_empty() {
            let needs_block = self
                .blocks
                .back()
                .map_or(true, |tail| tail.remaining() == 0);
            if needs_block {
                self.blocks.push_back(Block::with_capacity(block_size));
                started += 1;
            }
            let Some(tail) = self.blocks.back_mut() else {
                break;
            };
            let taken = tail.fill_from(bytes);
            bytes = &bytes[taken..];
        }
        Ok(started)
    }

    /// Seal the buffer with the end-of-stream marker.
    pub fn push_end_of_stream(&mut self) -> StreamResult<()> {
        self.push_back(Block::end_of_stream())
    }

    /// True when the head is a complete unit: the head is full or the stream
    /// has ended.
    pub fn has_available_block(&self) -> bool {
        match (self.blocks.front(), self.blocks.back()) {
            (Some(head), Some(tail)) => tail.is_end_of_stream() || head.is_full(),
            _ => false,
        }
    }

    /// Bytes held ahead of the end-of-stream marker
    pub fn available_bytes(&self) -> u64 {
        self.blocks
            .iter()
            .take_while(|block| !block.is_end_of_stream())
            .map(|block| block.size() as u64)
            .sum()
    }
}
