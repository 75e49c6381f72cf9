//! Integration tests for the streaming block provider
//!
//! This test suite validates:
//! - End-to-end folding of a real TCP stream into blocks
//! - Local file streams and block reassembly
//! - Failure reporting for unreachable and stalled sources
//! - Teardown while a network read is blocked

pub mod test_utils;

#[cfg(test)]
mod tcp_stream_tests;

#[cfg(test)]
mod file_stream_tests;
