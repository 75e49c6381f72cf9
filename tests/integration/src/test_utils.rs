//! Test utilities for provider integration tests

use blockfeed_core::ProviderConfig;
use blockfeed_stream::{
    Binding, Block, BlockId, BlockSink, DataProvider, DefaultStreamIo, Provider,
    SourceFailureSink,
};
use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use url::Url;

static LOGGING: Once = Once::new();

/// Install a test subscriber once per process
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("blockfeed_stream=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Cache and source double that records every callback and drains blocks
/// as soon as they are announced.
#[derive(Default)]
pub struct RecordingIndex {
    pub block_shift: u32,
    pub notifications: AtomicUsize,
    pub failures: AtomicUsize,
    pub bytes_from_network: AtomicU64,
    pub blocks: Mutex<Vec<Block>>,
}

impl RecordingIndex {
    pub fn new(block_shift: u32) -> Arc<Self> {
        Arc::new(Self {
            block_shift,
            ..Default::default()
        })
    }

    pub fn binding(self: &Arc<Self>) -> Binding {
        Binding::new(self.clone(), self.clone())
    }

    pub fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Concatenated payload of every drained data block
    pub fn payload(&self) -> Vec<u8> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.data().to_vec())
            .collect()
    }

    /// Sizes of drained blocks; the end-of-stream marker shows up as `None`
    pub fn block_sizes(&self) -> Vec<Option<usize>> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .map(|b| (!b.is_end_of_stream()).then(|| b.size()))
            .collect()
    }
}

impl BlockSink for RecordingIndex {
    fn block_size_shift(&self) -> u32 {
        self.block_shift
    }

    fn on_data_provider_event(&self, provider: &mut dyn DataProvider) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
        let mut blocks = self.blocks.lock().unwrap();
        while provider.has_available_block() {
            blocks.push(provider.read());
        }
    }
}

impl SourceFailureSink for RecordingIndex {
    fn fail(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn add_bytes_read(&self, count: u64) {
        self.bytes_from_network.fetch_add(count, Ordering::SeqCst);
    }
}

/// Provider tuning suited to tests: small reads, fast interrupt polling
pub fn test_config() -> ProviderConfig {
    ProviderConfig {
        read_chunk_size: 1024,
        worker_thread_name: "integration-worker".to_string(),
        interrupt_poll_interval_ms: 10,
        connect_timeout_ms: 2_000,
    }
}

/// Start a provider over the default backends
pub fn start_provider(url: &str, index: &Arc<RecordingIndex>) -> Provider {
    init_logging();
    Provider::with_config(
        &test_config(),
        Url::parse(url).expect("valid test url"),
        BlockId::new(0),
        index.binding(),
        Arc::new(DefaultStreamIo),
    )
    .expect("provider starts")
}

/// What a fixture server does after accepting one connection
pub enum ServerScript {
    /// Write each chunk with a pause in between, then close
    Chunks(Vec<Vec<u8>>, Duration),
    /// Accept and hold the connection open without writing
    Hold(Duration),
}

/// One-connection TCP server on an ephemeral local port
pub struct TestServer {
    pub addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start(script: ServerScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let handle = thread::spawn(move || {
            let Ok((mut conn, _)) = listener.accept() else {
                return;
            };
            match script {
                ServerScript::Chunks(chunks, pause) => {
                    for chunk in chunks {
                        if conn.write_all(&chunk).is_err() {
                            return;
                        }
                        let _ = conn.flush();
                        thread::sleep(pause);
                    }
                }
                ServerScript::Hold(duration) => thread::sleep(duration),
            }
        });

        Self {
            addr,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Address on which nothing is listening
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("tcp://{addr}")
}

/// Deterministic test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
