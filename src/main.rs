//! Mempool front-running bot
//!
//! Startup:
//!     1. Load configuration (.env or --env-file, CLI overrides)
//!     2. Connect to the node over WebSocket, check the chain id
//!     3. Warm the schema cache for every watched recipient
//!     4. Wire oracle → builder → router into the reaction pipeline
//!     5. Subscribe to the watched sender's pending transactions
//!
//! Runs until SIGINT/SIGTERM or until the feed exhausts its reconnects.
//! Mainnet dispatches through the private relay only; testnet broadcasts to
//! the connected node.

use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use anyhow::{Context, Result};
use clap::Parser;
use frontrun_bot::chain::{verify_network, ChainClient, RpcChainClient};
use frontrun_bot::config::{load_config_from_file, CliOverrides};
use frontrun_bot::execution::{
    CandidateBuilder, DispatchMode, FlashbotsRelay, NonceSequencer, PrivateRelay, ReceiptWatcher,
    SubmissionRouter,
};
use frontrun_bot::filters::AddressFilter;
use frontrun_bot::gas::{EtherscanGasTracker, FeeOracle, GasTracker};
use frontrun_bot::mempool::FeedSubscriber;
use frontrun_bot::metadata::{EtherscanClient, LocalAbiDir, MetadataResolver, SchemaSource};
use frontrun_bot::pipeline::{ReactionPipeline, ReactionSettings};
use frontrun_bot::types::Network;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP timeout for schema lookups; the pipeline stops waiting much sooner
const SCHEMA_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// HTTP timeout for relay submission and status calls
const RELAY_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on the startup schema warm-up
const PREFETCH_TIMEOUT: Duration = Duration::from_secs(15);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Mempool front-running bot
#[derive(Parser)]
#[command(name = "frontrun-bot")]
struct Args {
    /// Network to run on (mainnet, testnet); overrides NETWORK
    #[arg(short, long)]
    network: Option<Network>,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Build and sign candidates without dispatching them
    #[arg(long)]
    dry_run: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);

    if json {
        fmt().json().with_env_filter(filter).with_current_span(true).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // .env may set RUST_LOG / LOG_FORMAT, so it is read before the subscriber exists
    let overrides = CliOverrides { network: args.network, dry_run: args.dry_run };
    let config = load_config_from_file(args.env_file.as_deref(), &overrides);

    init_logging();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    info!("===========================================");
    info!("   Mempool Front-Running Bot");
    info!("===========================================");
    config.log_summary();

    // Node connection (sequence numbers, fee fallback, broadcast, receipts)
    info!("Connecting to node via WebSocket...");
    let provider = ProviderBuilder::new()
        .connect_ws(WsConnect::new(config.rpc_ws_url.clone()))
        .await
        .context("node WebSocket connect failed")?
        .erased();
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(provider));

    let network = config.watch.network;
    let chain_id = match verify_network(chain.as_ref(), network).await {
        Ok(id) => id,
        Err(e) => {
            error!("Startup check failed: {:#}", e);
            return Err(e);
        }
    };
    info!("Connected! chain id {} ({})", chain_id, network);

    // Metadata: local ABI files first, Etherscan second
    let etherscan = EtherscanClient::new(&config.etherscan_url, &config.etherscan_api_key, SCHEMA_HTTP_TIMEOUT)
        .context("building Etherscan client")?;
    let sources = vec![
        Arc::new(LocalAbiDir::new(&config.abi_dir)) as Arc<dyn SchemaSource>,
        Arc::new(etherscan) as Arc<dyn SchemaSource>,
    ];
    let resolver = MetadataResolver::new(sources, config.metadata_timeout);

    if tokio::time::timeout(PREFETCH_TIMEOUT, resolver.prefetch(&config.watch.recipient_addresses))
        .await
        .is_err()
    {
        warn!("Schema prefetch still running after {:?}, continuing", PREFETCH_TIMEOUT);
    }

    // Pricing
    let tracker: Arc<dyn GasTracker> = Arc::new(
        EtherscanGasTracker::new(&config.etherscan_url, &config.gas_api_key, config.gas_api_timeout)
            .context("building gas tracker client")?,
    );
    let oracle = FeeOracle::new(Some(tracker), chain.clone(), config.gas_api_timeout);

    // Building
    let sequencer = Arc::new(NonceSequencer::new(chain.clone(), config.bot_address()));
    let builder = CandidateBuilder::new(sequencer.clone(), config.premium_wei);

    // Dispatch
    let mode = DispatchMode::for_network(network);
    let relay: Option<Arc<dyn PrivateRelay>> = match mode {
        DispatchMode::PrivateRelay => {
            let auth = config
                .relay_auth
                .clone()
                .context("RELAY_AUTH_KEY is required for private-relay dispatch")?;
            let relay = FlashbotsRelay::new(&config.relay_url, &config.relay_status_url, auth, RELAY_HTTP_TIMEOUT)
                .context("building relay client")?;
            Some(Arc::new(relay) as Arc<dyn PrivateRelay>)
        }
        DispatchMode::DirectBroadcast => None,
    };
    info!("Dispatch mode: {}", mode);

    let receipts = ReceiptWatcher::new(chain.clone(), relay.clone(), RECEIPT_POLL_INTERVAL, config.receipt_timeout)
        .with_sequencer(sequencer);
    let router = SubmissionRouter::new(mode, EthereumWallet::from(config.signer.clone()), chain_id, chain.clone(), relay)?
        .with_receipts(receipts)
        .with_dry_run(config.dry_run);

    let pipeline = Arc::new(ReactionPipeline::new(
        AddressFilter::new(&config.watch),
        resolver,
        oracle,
        builder,
        router,
        ReactionSettings {
            fee_reference: config.fee_reference,
            submission_retries: config.submission_retries,
            dedupe_window: config.dedupe_window,
        },
    ));

    // Feed → pipeline
    let (tx, rx) = mpsc::channel(config.feed_channel_size);
    let subscriber = FeedSubscriber::new(config.rpc_ws_url.clone(), config.watch.sender_address, config.reconnect);
    let mut feed = tokio::spawn(subscriber.run(tx));
    let pipeline_task = tokio::spawn(pipeline.run(rx));

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();

    let feed_result = tokio::select! {
        sig = signals.next() => {
            info!("Received signal {:?}, shutting down", sig);
            feed.abort();
            Ok(())
        }
        joined = &mut feed => match joined {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("feed task panicked: {}", e)),
        },
    };
    signals_handle.close();

    // Feed sender is gone either way; the pipeline drains in-flight reactions
    match pipeline_task.await {
        Ok(stats) => info!("Final stats: {:?}", stats),
        Err(e) => error!("Pipeline task failed: {}", e),
    }

    if let Err(e) = &feed_result {
        error!("Mempool feed terminated: {:#}", e);
    }
    feed_result
}
