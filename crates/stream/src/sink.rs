//! Capability interfaces between a provider and the rest of the system.

use crate::block::{Block, BlockId};
use std::fmt;
use std::sync::Arc;

/// Largest block size shift a provider accepts (1 GiB blocks).
pub const MAX_BLOCK_SIZE_SHIFT: u32 = 30;

/// The consumer-facing contract of a block producer.
pub trait DataProvider {
    /// Id of the block the next [`read`](Self::read) returns
    fn current_position(&self) -> BlockId;

    /// Whether a complete block sits at the front of the buffer
    fn has_available_block(&self) -> bool;

    /// Bytes buffered ahead of the end-of-stream marker
    fn available_byte_count(&self) -> u64;

    /// Pop the head block and advance the position.
    ///
    /// # Panics
    ///
    /// Panics if [`has_available_block`](Self::has_available_block) is false.
    fn read(&mut self) -> Block;

    /// Pause or resume I/O
    fn set_deferred(&mut self, deferred: bool);
}

/// The block cache a provider publishes into.
pub trait BlockSink: Send + Sync {
    /// Block size as a power of two
    fn block_size_shift(&self) -> u32;

    /// Block size in bytes, or `None` when the shift exceeds
    /// [`MAX_BLOCK_SIZE_SHIFT`].
    fn block_size(&self) -> Option<usize> {
        let shift = self.block_size_shift();
        if shift > MAX_BLOCK_SIZE_SHIFT {
            return None;
        }
        1usize.checked_shl(shift)
    }

    /// New blocks or the end-of-stream marker were appended.
    ///
    /// The provider is lent for the duration of the call so the cache can
    /// drain it right away.
    fn on_data_provider_event(&self, provider: &mut dyn DataProvider);
}

/// The source object that owns the stream address.
pub trait SourceFailureSink: Send + Sync {
    /// The stream failed permanently
    fn fail(&self);

    /// Raw bytes received by one read
    fn add_bytes_read(&self, _count: u64) {}
}

/// The single collaborator pair a provider reports to.
#[derive(Clone)]
pub struct Binding {
    /// Receives failure and byte telemetry
    pub source: Arc<dyn SourceFailureSink>,
    /// Receives availability notifications
    pub sink: Arc<dyn BlockSink>,
}

impl Binding {
    /// Pair a source with a sink
    pub fn new(source: Arc<dyn SourceFailureSink>, sink: Arc<dyn BlockSink>) -> Self {
        Self { source, sink }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("block_size_shift", &self.sink.block_size_shift())
            .finish_non_exhaustive()
    }
}
