//! Streaming block provider.
//!
//! The provider pulls bytes from a [`StreamIo`] backend on a dedicated worker
//! thread, folds them into fixed-size blocks and publishes them to a
//! [`BlockSink`]. All blocking calls happen on the worker; every result is
//! sent back as a [`Completion`] and handled on the owning context when it
//! calls [`Provider::process_pending`] or [`Provider::process_next`].
//!
//! The cycle is open, then read / fold / notify repeated until the stream ends
//! or fails. Both terminal conditions are reported once and stop further I/O.

use crate::block::{Block, BlockId};
use crate::buffer::BlockBuffer;
use crate::cancel::CancellationToken;
use crate::error::{StreamError, StreamResult};
use crate::io::{OpenRequest, StreamIo};
use crate::options::SessionOptions;
use crate::session::{ReadOutcome, StreamSession};
use crate::sink::{Binding, DataProvider, MAX_BLOCK_SIZE_SHIFT};
use crate::worker::WorkerContext;
use blockfeed_core::ProviderConfig;
use bytes::Bytes;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use url::Url;

/// Lifecycle of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderState {
    /// Waiting for the open to complete
    Opening,
    /// Reading data
    Streaming,
    /// The end-of-stream marker has been queued
    EndOfStream,
    /// The source has been told the stream failed
    Failed,
    /// Torn down
    ShutDown,
}

impl ProviderState {
    /// Whether no further I/O will be scheduled
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::EndOfStream | Self::Failed | Self::ShutDown)
    }
}

/// Counters maintained by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    /// Reads that returned data
    pub reads: u64,
    /// Raw bytes received
    pub bytes_received: u64,
    /// Blocks started by folding
    pub blocks_started: u64,
    /// Blocks handed out by `read`
    pub blocks_drained: u64,
}

/// Result of a worker task, marshalled back to the owning context.
#[derive(Debug)]
enum Completion {
    Opened(StreamResult<()>),
    Read(ReadOutcome),
}

/// Produces blocks from a remote stream.
pub struct Provider {
    url: Url,
    buffer: BlockBuffer,
    pos: BlockId,
    binding: Binding,
    session: Arc<StreamSession>,
    worker: Option<WorkerContext>,
    cancel: CancellationToken,
    replies: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    state: ProviderState,
    deferred: bool,
    io_in_flight: bool,
    read_parked: bool,
    stats: ProviderStats,
    last_error: Option<StreamError>,
}

impl Provider {
    /// Create a provider with default tuning and schedule the open.
    pub fn new(
        url: Url,
        pos: BlockId,
        binding: Binding,
        io: Arc<dyn StreamIo>,
    ) -> StreamResult<Self> {
        Self::with_config(&ProviderConfig::default(), url, pos, binding, io)
    }

    /// Create a provider and schedule the open.
    ///
    /// Malformed session options are not returned here; they surface through
    /// the source's `fail` like any other open failure.
    pub fn with_config(
        config: &ProviderConfig,
        url: Url,
        pos: BlockId,
        binding: Binding,
        io: Arc<dyn StreamIo>,
    ) -> StreamResult<Self> {
        config.validate()?;

        let options = SessionOptions::from_url(&url);
        let read_chunk_size = options
            .as_ref()
            .ok()
            .and_then(|o| o.buffer_size().ok().flatten())
            .unwrap_or(config.read_chunk_size);

        let worker = WorkerContext::spawn(&config.worker_thread_name)?;
        let (replies, completions) = mpsc::unbounded_channel();

        let mut provider = Self {
            url,
            buffer: BlockBuffer::new(),
            pos,
            binding,
            session: Arc::new(StreamSession::new(io, read_chunk_size)),
            worker: Some(worker),
            cancel: CancellationToken::new(),
            replies,
            completions,
            state: ProviderState::Opening,
            deferred: false,
            io_in_flight: false,
            read_parked: false,
            stats: ProviderStats::default(),
            last_error: None,
        };

        match options {
            Ok(options) => {
                let request = OpenRequest {
                    url: provider.url.clone(),
                    options,
                    interrupt: provider.cancel.interrupt_predicate(),
                    poll_interval: config.interrupt_poll_interval(),
                    connect_timeout: config.connect_timeout(),
                };
                debug!(url = %provider.url, pos = %pos, read_chunk_size, "Scheduling open");
                let session = Arc::clone(&provider.session);
                let url = provider.url.to_string();
                let panic_url = url.clone();
                provider.post(
                    move || {
                        Completion::Opened(
                            session
                                .open(&request)
                                .map_err(|source| StreamError::Open { url, source }),
                        )
                    },
                    move |message| {
                        Completion::Opened(Err(StreamError::Open {
                            url: panic_url,
                            source: io::Error::other(message),
                        }))
                    },
                );
            }
            Err(e) => {
                warn!(url = %provider.url, error = %e, "Rejecting session options");
                provider.io_in_flight = provider.replies.send(Completion::Opened(Err(e))).is_ok();
            }
        }

        Ok(provider)
    }

    /// Target address
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Lifecycle state
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Counters so far
    pub fn stats(&self) -> ProviderStats {
        self.stats
    }

    /// Whether reads are currently paused
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Whether a worker task is outstanding
    pub fn has_pending_io(&self) -> bool {
        self.io_in_flight
    }

    /// Why the stream failed, once [`ProviderState::Failed`] is reached
    pub fn last_error(&self) -> Option<&StreamError> {
        self.last_error.as_ref()
    }

    /// Number of queued blocks, including the end-of-stream marker
    pub fn buffered_blocks(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the head block if a complete one is available.
    pub fn try_read(&mut self) -> Option<Block> {
        if self.buffer.has_available_block() {
            Some(self.read())
        } else {
            None
        }
    }

    /// Replace the collaborator pair, returning the previous one.
    ///
    /// Used when ownership moves to another index, e.g. after a redirect.
    pub fn rebind(&mut self, binding: Binding) -> Binding {
        debug!(url = %self.url, pos = %self.pos, "Rebinding provider");
        std::mem::replace(&mut self.binding, binding)
    }

    /// Handle every completion already queued without waiting.
    ///
    /// Returns the number of completions handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.completions.try_recv() {
            self.dispatch(completion);
            handled += 1;
        }
        handled
    }

    /// Wait for the next completion and handle it.
    ///
    /// Returns `false` without waiting when no worker task is outstanding.
    pub async fn process_next(&mut self) -> bool {
        if !self.io_in_flight {
            return false;
        }
        match self.completions.recv().await {
            Some(completion) => {
                self.dispatch(completion);
                true
            }
            None => false,
        }
    }

    /// Handle completions until no I/O is outstanding: the stream ended,
    /// failed, or reads are parked by deferral.
    pub async fn run_until_idle(&mut self) {
        while self.process_next().await {}
    }

    /// Tear down: interrupt the in-flight read, close the session and join
    /// the worker. No collaborator is called after this returns. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        self.cancel.cancel();

        let session = Arc::clone(&self.session);
        if !worker.post(move || session.close()) {
            self.session.close();
        }
        worker.stop();
        self.session.close();

        let mut discarded = 0usize;
        while let Ok(completion) = self.completions.try_recv() {
            if let Completion::Read(ReadOutcome::EndOfStream) = completion {
                if let Err(e) = self.buffer.push_end_of_stream() {
                    trace!(error = %e, "End of stream already queued");
                }
            }
            discarded += 1;
        }

        self.io_in_flight = false;
        self.read_parked = false;
        self.state = ProviderState::ShutDown;
        debug!(url = %self.url, discarded, "Provider shut down");
    }

    fn post<F, P>(&mut self, task: F, recover: P)
    where
        F: FnOnce() -> Completion + Send + 'static,
        P: FnOnce(String) -> Completion + Send + 'static,
    {
        let posted = match &self.worker {
            Some(worker) => worker.post_and_reply(task, recover, self.replies.clone()),
            None => false,
        };
        if !posted {
            debug!(url = %self.url, "Worker stopped, task dropped");
        }
        self.io_in_flight = posted;
    }

    fn dispatch(&mut self, completion: Completion) {
        self.io_in_flight = false;
        if self.cancel.is_cancelled() {
            trace!(?completion, "Discarding completion after shutdown");
            return;
        }
        match completion {
            Completion::Opened(result) => self.on_opened(result),
            Completion::Read(outcome) => self.on_read(outcome),
        }
    }

    fn on_opened(&mut self, result: StreamResult<()>) {
        match result {
            Ok(()) => {
                info!(url = %self.url, "Provider streaming");
                self.state = ProviderState::Streaming;
                self.schedule_read();
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Open failed, reporting stream failure");
                self.fail(e);
            }
        }
    }

    fn schedule_read(&mut self) {
        if self.state != ProviderState::Streaming || self.io_in_flight {
            return;
        }
        if self.deferred {
            debug!(url = %self.url, "Deferred, parking next read");
            self.read_parked = true;
            return;
        }
        let session = Arc::clone(&self.session);
        self.post(
            move || Completion::Read(session.read()),
            |message| Completion::Read(ReadOutcome::Failed(io::Error::other(message))),
        );
    }

    fn on_read(&mut self, outcome: ReadOutcome) {
        match outcome {
            ReadOutcome::Data(bytes) => self.on_data(bytes),
            ReadOutcome::EndOfStream => self.terminate(),
            ReadOutcome::Failed(e) => {
                warn!(url = %self.url, error = %e, "Read failed, reporting stream failure");
                self.fail(StreamError::Read(e));
            }
        }
    }

    fn on_data(&mut self, bytes: Bytes) {
        let len = bytes.len() as u64;
        self.stats.reads += 1;
        self.stats.bytes_received += len;
        self.binding.source.add_bytes_read(len);

        let Some(block_size) = self.binding.sink.block_size() else {
            let error = StreamError::InvalidBlockSize {
                shift: self.binding.sink.block_size_shift(),
                max: MAX_BLOCK_SIZE_SHIFT,
            };
            warn!(url = %self.url, error = %error, "Sink block size rejected");
            self.fail(error);
            return;
        };
        match self.buffer.append_bytes(&bytes, block_size) {
            Ok(started) => {
                self.stats.blocks_started += started as u64;
                trace!(bytes = len, block_size, started, buffered = self.buffer.len(), "Folded read");
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Dropping data received after end of stream");
                return;
            }
        }

        self.notify();
        self.schedule_read();
    }

    fn terminate(&mut self) {
        if let Err(e) = self.buffer.push_end_of_stream() {
            trace!(error = %e, "End of stream already queued");
            return;
        }
        info!(
            url = %self.url,
            bytes = self.stats.bytes_received,
            blocks = self.stats.blocks_started,
            "Stream ended"
        );
        self.state = ProviderState::EndOfStream;
        self.notify();
    }

    fn fail(&mut self, error: StreamError) {
        self.state = ProviderState::Failed;
        self.last_error = Some(error);
        self.binding.source.fail();
    }

    fn notify(&mut self) {
        let sink = Arc::clone(&self.binding.sink);
        sink.on_data_provider_event(self);
    }
}

impl DataProvider for Provider {
    fn current_position(&self) -> BlockId {
        self.pos
    }

    fn has_available_block(&self) -> bool {
        self.buffer.has_available_block()
    }

    fn available_byte_count(&self) -> u64 {
        self.buffer.available_bytes()
    }

    fn read(&mut self) -> Block {
        assert!(
            self.buffer.has_available_block(),
            "read() called without an available block"
        );
        let Some(block) = self.buffer.pop_front() else {
            unreachable!("available buffer is non-empty");
        };
        self.pos = self.pos.next();
        self.stats.blocks_drained += 1;
        block
    }

    fn set_deferred(&mut self, deferred: bool) {
        if self.deferred == deferred {
            return;
        }
        self.deferred = deferred;
        debug!(url = %self.url, deferred, "Deferral changed");
        if !deferred && self.read_parked {
            self.read_parked = false;
            self.schedule_read();
        }
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
