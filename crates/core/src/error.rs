//! Core error types

use thiserror::Error;

/// Core error type for blockfeed
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration value rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON configuration could not be parsed
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[cfg(feature = "toml")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
