//! Stream I/O backends.
//!
//! [`StreamIo`] is the boundary to the library that performs the protocol
//! handshake and the byte reads. Every call on it is blocking and is only ever
//! made from the provider's worker thread.

mod file;
mod tcp;

pub use file::FileStreamIo;
pub use tcp::TcpStreamIo;

use crate::cancel::InterruptPredicate;
use crate::error::StreamError;
use crate::options::SessionOptions;
use std::fmt;
use std::io;
use std::time::Duration;
use url::Url;

/// Everything a backend needs to open one stream.
#[derive(Clone)]
pub struct OpenRequest {
    /// Target address
    pub url: Url,
    /// Options parsed from the address query
    pub options: SessionOptions,
    /// Returns `true` once blocking calls should abort
    pub interrupt: InterruptPredicate,
    /// Upper bound on how long a blocking call waits before polling `interrupt`
    pub poll_interval: Duration,
    /// Connect timeout for network backends
    pub connect_timeout: Duration,
}

impl OpenRequest {
    /// Whether the interrupt predicate currently fires
    pub fn is_interrupted(&self) -> bool {
        (self.interrupt)()
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("url", &self.url.as_str())
            .field("options", &self.options)
            .field("poll_interval", &self.poll_interval)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// An open, readable stream.
pub trait StreamHandle: Send {
    /// Read at most `buf.len()` bytes, blocking until some are available.
    ///
    /// `Ok(0)` and `ErrorKind::UnexpectedEof` both signal a clean end of stream.
    fn read_partial(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the underlying resource.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens readable streams for a target address.
pub trait StreamIo: Send + Sync {
    /// Perform the handshake and return a handle ready for reads.
    fn open(&self, request: &OpenRequest) -> io::Result<Box<dyn StreamHandle>>;
}

/// Dispatches on the URL scheme: `tcp` and `file`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStreamIo;

impl StreamIo for DefaultStreamIo {
    fn open(&self, request: &OpenRequest) -> io::Result<Box<dyn StreamHandle>> {
        match request.url.scheme() {
            "tcp" => TcpStreamIo.open(request),
            "file" => FileStreamIo.open(request),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                StreamError::UnsupportedScheme {
                    scheme: other.to_string(),
                },
            )),
        }
    }
}

/// The [`StreamError`] a backend attached to `err`, if any.
pub fn stream_error(err: &io::Error) -> Option<&StreamError> {
    err.get_ref().and_then(|inner| inner.downcast_ref::<StreamError>())
}

/// Error returned by backends when the interrupt predicate fires.
pub(crate) fn interrupted() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "interrupted by shutdown")
}

#[cfg(test)]
pub(crate) fn test_request(url: &str, options: &str) -> OpenRequest {
    use crate::cancel::CancellationToken;

    OpenRequest {
        url: Url::parse(url).unwrap(),
        options: SessionOptions::parse(options).unwrap(),
        interrupt: CancellationToken::new().interrupt_predicate(),
        poll_interval: Duration::from_millis(10),
        connect_timeout: Duration::from_secs(1),
    }
}
