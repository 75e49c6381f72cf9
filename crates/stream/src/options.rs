//! Session options carried in the target address.
//!
//! The query component of the stream URL holds `key=value` pairs separated by
//! `;` (or `&`). A handful of keys are interpreted here, everything else is
//! forwarded to the I/O backend untouched.

use crate::error::{StreamError, StreamResult};
use blockfeed_core::config::MAX_READ_CHUNK_SIZE;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Inactivity timeout for reads and connects, in microseconds.
pub const RW_TIMEOUT: &str = "rw_timeout";

/// Override for the per-read chunk size, in bytes.
pub const BUFFER_SIZE: &str = "buffer_size";

/// Parsed session options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    entries: BTreeMap<String, String>,
}

impl SessionOptions {
    /// Parse options from a raw query string.
    pub fn parse(query: &str) -> StreamResult<Self> {
        let mut entries = BTreeMap::new();
        for pair in query.split([';', '&']) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                return Err(StreamError::InvalidOption {
                    key: pair.to_string(),
                    value: String::new(),
                    reason: "expected key=value".to_string(),
                });
            };
            if key.is_empty() {
                return Err(StreamError::InvalidOption {
                    key: String::new(),
                    value: value.to_string(),
                    reason: "empty option name".to_string(),
                });
            }
            entries.insert(key.to_string(), value.to_string());
        }

        let options = Self { entries };
        options.rw_timeout()?;
        options.buffer_size()?;
        Ok(options)
    }

    /// Parse options from the query component of `url`.
    pub fn from_url(url: &Url) -> StreamResult<Self> {
        url.query().map_or_else(|| Ok(Self::default()), Self::parse)
    }

    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set `key`, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Whether no options were given
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All options, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Inactivity timeout, if configured
    pub fn rw_timeout(&self) -> StreamResult<Option<Duration>> {
        self.parse_u64(RW_TIMEOUT)
            .map(|micros| micros.filter(|m| *m > 0).map(Duration::from_micros))
    }

    /// Per-read chunk size override, if configured
    pub fn buffer_size(&self) -> StreamResult<Option<usize>> {
        match self.parse_u64(BUFFER_SIZE)? {
            Some(0) => Err(StreamError::InvalidOption {
                key: BUFFER_SIZE.to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            Some(size) => match usize::try_from(size) {
                Ok(size) if size <= MAX_READ_CHUNK_SIZE => Ok(Some(size)),
                _ => Err(StreamError::InvalidOption {
                    key: BUFFER_SIZE.to_string(),
                    value: size.to_string(),
                    reason: format!("must be at most {MAX_READ_CHUNK_SIZE}"),
                }),
            },
            None => Ok(None),
        }
    }

    fn parse_u64(&self, key: &str) -> StreamResult<Option<u64>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse::<u64>()
            .map(Some)
            .map_err(|e| StreamError::InvalidOption {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }
}
