use anyhow::{bail, Context};
use blockfeed_core::{logging, Config};
use blockfeed_stream::{
    Binding, BlockId, BlockSink, DataProvider, DefaultStreamIo, Provider, ProviderState,
    ProviderStats, SourceFailureSink, MAX_BLOCK_SIZE_SHIFT,
};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const NODE_PROTOCOL_VERSION: u32 = 1;

/// Pull one stream to its end and report what was received.
#[derive(Debug, Parser)]
#[command(name = "blockfeed-node", version)]
struct Args {
    /// Stream address, e.g. tcp://127.0.0.1:1935 or file:///tmp/capture.flv
    #[arg(long)]
    url: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block size as a power of two
    #[arg(long, default_value_t = 15)]
    block_shift: u32,

    /// First block id
    #[arg(long, default_value_t = 0)]
    start: u64,

    /// Print the version handshake and exit
    #[arg(long)]
    version_json: bool,
}

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    protocol_version: u32,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    url: String,
    state: ProviderState,
    blocks: u64,
    bytes: u64,
    bytes_from_network: u64,
    final_position: BlockId,
    failed: bool,
    error: Option<String>,
    stats: ProviderStats,
}

/// Drains every complete block as soon as it is announced.
struct CountingSink {
    block_shift: u32,
    blocks: AtomicU64,
    bytes: AtomicU64,
}

impl BlockSink for CountingSink {
    fn block_size_shift(&self) -> u32 {
        self.block_shift
    }

    fn on_data_provider_event(&self, provider: &mut dyn DataProvider) {
        while provider.has_available_block() {
            let block = provider.read();
            if block.is_end_of_stream() {
                info!(position = %provider.current_position(), "End of stream reached");
                continue;
            }
            self.blocks.fetch_add(1, Ordering::Relaxed);
            self.bytes.fetch_add(block.size() as u64, Ordering::Relaxed);
        }
    }
}

#[derive(Default)]
struct NodeSource {
    failed: AtomicBool,
    bytes_from_network: AtomicU64,
}

impl SourceFailureSink for NodeSource {
    fn fail(&self) {
        warn!("Stream failed");
        self.failed.store(true, Ordering::SeqCst);
    }

    fn add_bytes_read(&self, count: u64) {
        self.bytes_from_network.fetch_add(count, Ordering::Relaxed);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.version_json {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    logging::init_from_config(&config.logging);

    let Some(raw_url) = args.url.as_deref() else {
        bail!("missing required --url <address> argument");
    };
    let url = Url::parse(raw_url).with_context(|| format!("invalid stream url {raw_url}"))?;
    if args.block_shift > MAX_BLOCK_SIZE_SHIFT {
        bail!("--block-shift must be at most {MAX_BLOCK_SIZE_SHIFT}");
    }

    let sink = Arc::new(CountingSink {
        block_shift: args.block_shift,
        blocks: AtomicU64::new(0),
        bytes: AtomicU64::new(0),
    });
    let source = Arc::new(NodeSource::default());

    info!(url = %url, block_size = 1u64 << args.block_shift, "Starting provider");
    let mut provider = Provider::with_config(
        &config.provider,
        url.clone(),
        BlockId::new(args.start),
        Binding::new(source.clone(), sink.clone()),
        Arc::new(DefaultStreamIo),
    )?;
    provider.run_until_idle().await;

    let summary = RunSummary {
        url: url.to_string(),
        state: provider.state(),
        blocks: sink.blocks.load(Ordering::Relaxed),
        bytes: sink.bytes.load(Ordering::Relaxed),
        bytes_from_network: source.bytes_from_network.load(Ordering::Relaxed),
        final_position: provider.current_position(),
        failed: source.failed.load(Ordering::SeqCst),
        error: provider.last_error().map(ToString::to_string),
        stats: provider.stats(),
    };
    provider.shutdown();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.failed {
        bail!("stream {} failed", summary.url);
    }
    Ok(())
}
