//! Provider against local files

use crate::test_utils::*;
use blockfeed_stream::{DataProvider, ProviderState, StreamError};
use std::time::Duration;
use std::io::Write;
use url::Url;

fn file_with(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn file_url(file: &tempfile::NamedTempFile, query: Option<&str>) -> String {
    let mut url = Url::from_file_path(file.path()).unwrap();
    url.set_query(query);
    url.to_string()
}

#[tokio::test]
async fn test_file_stream_reassembles() {
    let payload = pattern(10_000);
    let file = file_with(&payload);
    let index = RecordingIndex::new(12);
    let mut provider = start_provider(&file_url(&file, None), &index);

    provider.run_until_idle().await;

    assert_eq!(provider.state(), ProviderState::EndOfStream);
    assert_eq!(index.payload(), payload);
    assert_eq!(
        index.block_sizes(),
        vec![Some(4096), Some(4096), Some(1808), None]
    );
    assert_eq!(index.notifications() as u64, provider.stats().reads + 1);
    assert_eq!(provider.stats().bytes_received, 10_000);
    assert_eq!(provider.stats().blocks_started, 3);
}

#[tokio::test]
async fn test_empty_file_yields_only_eos() {
    let file = file_with(&[]);
    let index = RecordingIndex::new(12);
    let mut provider = start_provider(&file_url(&file, None), &index);

    provider.run_until_idle().await;

    assert_eq!(index.block_sizes(), vec![None]);
    assert_eq!(index.notifications(), 1);
    assert_eq!(provider.current_position().index(), 1);
}

#[tokio::test]
async fn test_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::from_file_path(dir.path().join("gone.bin")).unwrap();
    let index = RecordingIndex::new(12);
    let mut provider = start_provider(url.as_str(), &index);

    provider.run_until_idle().await;

    assert_eq!(provider.state(), ProviderState::Failed);
    assert_eq!(index.failures(), 1);
    assert!(index.block_sizes().is_empty());
}

#[tokio::test]
async fn test_buffer_size_option_bounds_each_read() {
    let payload = pattern(1000);
    let file = file_with(&payload);
    let index = RecordingIndex::new(8);
    let mut provider = start_provider(&file_url(&file, Some("buffer_size=100")), &index);

    provider.run_until_idle().await;

    assert_eq!(provider.stats().reads, 10);
    assert_eq!(index.payload(), payload);
    assert_eq!(index.block_sizes().len(), 5);
}

#[tokio::test]
async fn test_oversized_buffer_size_fails_instead_of_hanging() {
    let file = file_with(&pattern(64));
    let index = RecordingIndex::new(8);
    let url = file_url(&file, Some("buffer_size=18446744073709551615"));
    let mut provider = start_provider(&url, &index);

    tokio::time::timeout(Duration::from_secs(3), provider.run_until_idle())
        .await
        .expect("provider goes idle");

    assert_eq!(provider.state(), ProviderState::Failed);
    assert_eq!(index.failures(), 1);
    assert_eq!(index.notifications(), 0);
    assert!(!provider.has_pending_io());
    assert!(matches!(
        provider.last_error(),
        Some(StreamError::InvalidOption { key, .. }) if key == "buffer_size"
    ));
}

#[tokio::test]
async fn test_unsupported_scheme_fails_once() {
    let index = RecordingIndex::new(8);
    let mut provider = start_provider("rtmp://127.0.0.1:1935/live", &index);

    provider.run_until_idle().await;

    assert_eq!(provider.state(), ProviderState::Failed);
    assert_eq!(index.failures(), 1);
    match provider.last_error() {
        Some(StreamError::Open { url, source }) => {
            assert!(url.starts_with("rtmp://"));
            assert!(matches!(
                blockfeed_stream::io::stream_error(source),
                Some(StreamError::UnsupportedScheme { scheme }) if scheme == "rtmp"
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
