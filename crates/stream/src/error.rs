//! Error types for blockfeed stream operations.

use thiserror::Error;

/// Errors that can occur in stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Target address could not be parsed
    #[error("Invalid stream address {address}: {reason}")]
    InvalidAddress {
        /// Address as supplied
        address: String,
        /// Parser diagnostic
        reason: String,
    },

    /// No backend handles the address scheme
    #[error("Unsupported stream scheme: {scheme}")]
    UnsupportedScheme {
        /// Scheme component of the address
        scheme: String,
    },

    /// Malformed or out-of-range session option
    #[error("Invalid session option {key}={value}: {reason}")]
    InvalidOption {
        /// Option name
        key: String,
        /// Raw option value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The stream could not be opened
    #[error("Failed to open {url}: {source}")]
    Open {
        /// Address that failed to open
        url: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A read failed with something other than a clean end of stream
    #[error("Read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The sink asked for blocks larger than a provider will allocate
    #[error("Block size shift {shift} exceeds the maximum of {max}")]
    InvalidBlockSize {
        /// Shift reported by the sink
        shift: u32,
        /// Largest supported shift
        max: u32,
    },

    /// The worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Data offered to a buffer that already holds its end-of-stream marker
    #[error("Block buffer already terminated by end of stream")]
    Terminated,

    /// Invalid provider configuration
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(#[from] blockfeed_core::CoreError),
}

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
