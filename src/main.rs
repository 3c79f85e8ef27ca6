//! Relay server entry point
//!
//! Runs the WebSocket relay: on each client connection, builds and signs
//! the configured token-account-creation-plus-swap transaction, pushes
//! the serialized bytes to the listener, then broadcasts after the
//! configured delay from signing.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txrelay::builder::TransactionBuilder;
use txrelay::config::Config;
use txrelay::flows::SwapFlow;
use txrelay::gateway::{RetryConfig, RpcGateway};
use txrelay::relay::RelayServer;
use txrelay::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the relay bind address
    #[arg(long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Starting transaction relay server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.relay.bind_addr = bind;
    }
    config.relay.validate().context("Invalid relay settings")?;

    info!("Initializing wallet from: {}", config.wallet.keypair_path);
    let wallet =
        WalletManager::from_file(&config.wallet.keypair_path).context("Failed to load wallet")?;
    info!("Wallet address: {}", wallet.pubkey());

    // Validate every configured address before accepting connections
    let resolved_swap = config
        .swap
        .resolve(&wallet.pubkey())
        .context("Invalid swap configuration")?;

    let gateway = Arc::new(RpcGateway::new(
        &config.rpc.endpoint,
        config.rpc.skip_preflight,
        RetryConfig::from(&config.rpc),
    ));
    info!(
        endpoint = %config.rpc.endpoint,
        skip_preflight = config.rpc.skip_preflight,
        "RPC gateway ready"
    );

    let builder = Arc::new(TransactionBuilder::new(wallet, gateway.clone()));
    let flow = Arc::new(SwapFlow::new(builder, resolved_swap));

    let server = Arc::new(RelayServer::new(flow, gateway, &config.relay));
    let listener = RelayServer::bind(&config.relay.bind_addr).await?;
    info!(
        delay_ms = config.relay.broadcast_delay_ms,
        max_inflight = config.relay.max_inflight,
        "Relay configured"
    );

    tokio::select! {
        result = server.serve(listener) => {
            result.context("Relay server terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down gracefully...");
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "txrelay=debug,info"
    } else {
        "txrelay=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        Ok(Config::default())
    }
}
