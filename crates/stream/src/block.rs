//! Block types
//!
//! A [`Block`] is a fixed-capacity chunk of stream bytes. Blocks are addressed
//! by a [`BlockId`] giving their logical position in the overall stream.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical position of a block within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BlockId(u64);

impl BlockId {
    /// Create a block id from its raw index
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Raw index of this block
    pub const fn index(self) -> u64 {
        self.0
    }

    /// The id immediately after this one
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for BlockId {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fixed-capacity byte buffer with a used length and an end-of-stream flag.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    data: BytesMut,
    capacity: usize,
    end_of_stream: bool,
}

impl Block {
    /// Create an empty data block that can hold `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
            end_of_stream: false,
        }
    }

    /// Create the end-of-stream marker: an empty block that carries no data
    pub fn end_of_stream() -> Self {
        Self {
            data: BytesMut::new(),
            capacity: 0,
            end_of_stream: true,
        }
    }

    /// Number of bytes held
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Maximum number of bytes this block can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Space left before the block is full
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Whether a data block has reached its capacity
    pub fn is_full(&self) -> bool {
        !self.end_of_stream && self.data.len() == self.capacity
    }

    /// Whether this is the end-of-stream marker
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Bytes held
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy as much of `bytes` as fits, returning the number of bytes taken.
    pub fn fill_from(&mut self, bytes: &[u8]) -> usize {
        let take = bytes.len().min(self.remaining());
        self.data.extend_from_slice(&bytes[..take]);
        take
    }

    /// Freeze the block into an immutable byte buffer
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("size", &self.size())
            .field("capacity", &self.capacity)
            .field("end_of_stream", &self.end_of_stream)
            .finish()
    }
}
