//! Core functionality shared by the blockfeed crates.
//!
//! This crate provides configuration, logging bootstrap and the core error
//! type used across the blockfeed workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, LoggingConfig, ProviderConfig};
pub use error::{CoreError, CoreResult};
