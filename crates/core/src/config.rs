//! Configuration management for blockfeed.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;

/// Default size of a single blocking read, in bytes.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 32 * 1024;

/// Largest accepted read size, in bytes.
pub const MAX_READ_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub logging: LoggingConfig,
}

/// Tuning for a streaming block provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Upper bound on the bytes requested by one read.
    pub read_chunk_size: usize,
    /// Name given to the dedicated worker thread.
    pub worker_thread_name: String,
    /// How often blocking backends wake up to consult the interrupt predicate.
    pub interrupt_poll_interval_ms: u64,
    /// Connect timeout for network backends.
    pub connect_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            worker_thread_name: "blockfeed-provider-worker".to_string(),
            interrupt_poll_interval_ms: 100,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.provider.validate()
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.read_chunk_size == 0 {
            return Err(CoreError::InvalidConfig(
                "provider.read_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.read_chunk_size > MAX_READ_CHUNK_SIZE {
            return Err(CoreError::InvalidConfig(format!(
                "provider.read_chunk_size must be at most {MAX_READ_CHUNK_SIZE}"
            )));
        }
        if self.interrupt_poll_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "provider.interrupt_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "provider.connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "provider.worker_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interrupt_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interrupt_poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.connect_timeout_ms)
    }
}
