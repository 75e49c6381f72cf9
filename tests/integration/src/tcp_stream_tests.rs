//! Provider against a live local TCP server

use crate::test_utils::*;
use blockfeed_stream::{DataProvider, ProviderState};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_tcp_stream_folds_into_blocks() {
    let payload = pattern(3000);
    let server = TestServer::start(ServerScript::Chunks(
        vec![
            payload[..700].to_vec(),
            payload[700..1600].to_vec(),
            payload[1600..].to_vec(),
        ],
        Duration::from_millis(20),
    ));
    let index = RecordingIndex::new(10);
    let mut provider = start_provider(&server.url(), &index);

    provider.run_until_idle().await;
    server.join();

    assert_eq!(provider.state(), ProviderState::EndOfStream);
    assert_eq!(index.failures(), 0);
    assert_eq!(index.payload(), payload);
    assert_eq!(
        index.block_sizes(),
        vec![Some(1024), Some(1024), Some(952), None]
    );
    assert_eq!(index.bytes_from_network.load(std::sync::atomic::Ordering::SeqCst), 3000);
    assert_eq!(index.notifications() as u64, provider.stats().reads + 1);
    assert_eq!(provider.current_position().index(), 4);
}

#[tokio::test]
async fn test_unreachable_address_fails_once() {
    let index = RecordingIndex::new(10);
    let mut provider = start_provider(&closed_port_url(), &index);

    provider.run_until_idle().await;

    assert_eq!(provider.state(), ProviderState::Failed);
    assert_eq!(index.failures(), 1);
    assert_eq!(index.notifications(), 0);
    assert!(!provider.has_available_block());
}

#[tokio::test]
async fn test_stalled_source_times_out() {
    let server = TestServer::start(ServerScript::Hold(Duration::from_millis(800)));
    let index = RecordingIndex::new(10);
    let mut provider = start_provider(&format!("{}?rw_timeout=100000", server.url()), &index);

    let started = Instant::now();
    provider.run_until_idle().await;

    assert_eq!(provider.state(), ProviderState::Failed);
    assert_eq!(index.failures(), 1);
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[tokio::test]
async fn test_teardown_during_blocked_read() {
    let server = TestServer::start(ServerScript::Hold(Duration::from_secs(2)));
    let index = RecordingIndex::new(10);
    let mut provider = start_provider(&server.url(), &index);

    while provider.state() == ProviderState::Opening {
        provider.process_pending();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(provider.state(), ProviderState::Streaming);
    assert!(provider.has_pending_io());
    tokio::time::sleep(Duration::from_millis(30)).await;

    let started = Instant::now();
    drop(provider);
    assert!(started.elapsed() < Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(index.failures(), 0);
    assert_eq!(index.notifications(), 0);
}

#[tokio::test]
async fn test_rebind_mid_stream_hands_over_blocks() {
    let payload = pattern(4096);
    let server = TestServer::start(ServerScript::Chunks(
        payload.chunks(1024).map(<[u8]>::to_vec).collect(),
        Duration::from_millis(40),
    ));
    let first = RecordingIndex::new(10);
    let second = RecordingIndex::new(10);
    let mut provider = start_provider(&server.url(), &first);

    while first.notifications() == 0 {
        assert!(provider.process_next().await, "stream ended before first block");
    }
    provider.rebind(second.binding());
    provider.run_until_idle().await;
    server.join();

    let mut combined = first.payload();
    combined.extend(second.payload());
    assert_eq!(combined, payload);
    assert!(second.notifications() > 0);
    assert_eq!(second.block_sizes().last(), Some(&None));
    assert_eq!(first.failures() + second.failures(), 0);
}
