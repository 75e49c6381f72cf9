//! Stream session: owns the open handle and the scratch read buffer.
//!
//! All methods block and must only be called from the worker thread. A single
//! mutex is held for the duration of each open, read and close so a teardown
//! close can never interleave with an in-flight read.

use crate::io::{OpenRequest, StreamHandle, StreamIo};
use bytes::Bytes;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Classified result of one bounded read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes received; never empty
    Data(Bytes),
    /// The stream finished cleanly
    EndOfStream,
    /// The read failed for any other reason
    Failed(io::Error),
}

impl ReadOutcome {
    /// Classify a raw backend result against the scratch buffer it filled.
    pub fn classify(result: io::Result<usize>, scratch: &[u8]) -> Self {
        match result {
            Ok(0) => Self::EndOfStream,
            Ok(n) => Self::Data(Bytes::copy_from_slice(&scratch[..n.min(scratch.len())])),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Self::EndOfStream,
            Err(e) => Self::Failed(e),
        }
    }
}

#[derive(Default)]
struct SessionState {
    handle: Option<Box<dyn StreamHandle>>,
    scratch: Vec<u8>,
    open_attempted: bool,
    closed: bool,
}

/// One stream opened through a [`StreamIo`] backend.
pub struct StreamSession {
    io: Arc<dyn StreamIo>,
    read_chunk_size: usize,
    state: Mutex<SessionState>,
}

impl StreamSession {
    /// Create a session; nothing is opened until [`open`](Self::open).
    pub fn new(io: Arc<dyn StreamIo>, read_chunk_size: usize) -> Self {
        Self {
            io,
            read_chunk_size: read_chunk_size.max(1),
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the stream. Only the first call reaches the backend.
    pub fn open(&self, request: &OpenRequest) -> io::Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "session closed"));
        }
        if state.open_attempted {
            return if state.handle.is_some() {
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::NotConnected, "open already failed"))
            };
        }
        state.open_attempted = true;

        match self.io.open(request) {
            Ok(handle) => {
                info!(url = %request.url, "Stream opened");
                state.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Stream open failed");
                Err(e)
            }
        }
    }

    /// Perform one bounded read into the scratch buffer.
    pub fn read(&self) -> ReadOutcome {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(handle) = state.handle.as_mut() else {
            return ReadOutcome::Failed(io::Error::new(
                io::ErrorKind::NotConnected,
                "stream not open",
            ));
        };

        state.scratch.resize(self.read_chunk_size, 0);
        let result = handle.read_partial(&mut state.scratch);
        let outcome = ReadOutcome::classify(result, &state.scratch);
        match &outcome {
            ReadOutcome::Data(bytes) => debug!(bytes = bytes.len(), "Read completed"),
            ReadOutcome::EndOfStream => debug!("Read reached end of stream"),
            ReadOutcome::Failed(e) => debug!(error = %e, "Read failed"),
        }
        outcome
    }

    /// Close the stream. Safe to call repeatedly and before a successful open.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        if let Some(mut handle) = state.handle.take() {
            if let Err(e) = handle.close() {
                warn!(error = %e, "Stream close reported an error");
            } else {
                debug!("Stream closed");
            }
        }
    }

    /// Whether a handle is currently open
    pub fn is_open(&self) -> bool {
        self.lock().handle.is_some()
    }
}
