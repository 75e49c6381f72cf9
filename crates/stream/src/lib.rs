//! blockfeed stream
//!
//! Streaming block provider: pulls bytes from a remote stream on a dedicated
//! worker thread, folds them into fixed-size blocks and publishes the blocks
//! to a consumer-facing block cache.

#![warn(missing_docs)]

pub mod block;
pub mod buffer;
pub mod cancel;
pub mod error;
pub mod io;
pub mod options;
pub mod provider;
pub mod session;
pub mod sink;
pub mod worker;

pub use block::{Block, BlockId};
pub use buffer::BlockBuffer;
pub use cancel::{CancellationToken, InterruptPredicate};
pub use error::{StreamError, StreamResult};
pub use io::{DefaultStreamIo, FileStreamIo, OpenRequest, StreamHandle, StreamIo, TcpStreamIo};
pub use options::SessionOptions;
pub use provider::{Provider, ProviderState, ProviderStats};
pub use session::{ReadOutcome, StreamSession};
pub use sink::{Binding, BlockSink, DataProvider, SourceFailureSink, MAX_BLOCK_SIZE_SHIFT};
pub use worker::WorkerContext;
