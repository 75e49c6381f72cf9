//! Structured logging infrastructure for blockfeed.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use blockfeed_core::logging;
///
/// logging::init();
/// tracing::info!("Application started");
/// ```
pub fn init() {
    init_with_filter("info", false);
}

/// Initialize the logging system with JSON output for production environments.
///
/// This format is suitable for log aggregation systems and structured log analysis.
/// Log level can be configured via the `RUST_LOG` environment variable.
///
/// # Example
/// ```no_run
/// use blockfeed_core::logging;
///
/// logging::init_json();
/// tracing::info!(service = "blockfeed-node", "Service started");
/// ```
pub fn init_json() {
    init_with_filter("info", true);
}

/// Initialize logging from a [`LoggingConfig`].
///
/// `RUST_LOG` still takes precedence over the configured level.
pub fn init_from_config(config: &LoggingConfig) {
    init_with_filter(&config.level, config.json);
}

/// Initialize logging with a fallback filter directive.
///
/// Uses `try_init` so a second call in the same process is a no-op instead of
/// a panic.
pub fn init_with_filter(default_directive: &str, json: bool) {
    let filter = build_filter(default_directive);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true).with_thread_names(true))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
