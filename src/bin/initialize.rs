//! One-shot initialize submission
//!
//! Builds the initialize instruction for the configured program, assembles
//! and signs a transaction, and broadcasts it. The printed signature is
//! the only success observable; no confirmation polling.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txrelay::builder::TransactionBuilder;
use txrelay::config::Config;
use txrelay::flows::run_initialize;
use txrelay::gateway::{RetryConfig, RpcGateway};
use txrelay::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Loading configuration from: {}", args.config);
    let config = Config::from_file_with_env(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let resolved = config
        .initialize
        .resolve()
        .context("Invalid initialize configuration")?;
    info!(
        program = %resolved.program_id,
        state = %resolved.state,
        tip_bps = resolved.args.tip_bps,
        "Initialize target resolved"
    );

    info!("Initializing wallet from: {}", config.wallet.keypair_path);
    let wallet =
        WalletManager::from_file(&config.wallet.keypair_path).context("Failed to load wallet")?;
    info!("Wallet address: {}", wallet.pubkey());

    let gateway = Arc::new(RpcGateway::new(
        &config.rpc.endpoint,
        config.rpc.skip_preflight,
        RetryConfig::from(&config.rpc),
    ));
    let builder = TransactionBuilder::new(wallet, gateway.clone());

    let signature = run_initialize(&builder, gateway.as_ref(), &resolved)
        .await
        .context("Initialize submission failed")?;

    info!("Transaction signature: {}", signature);
    println!("{}", signature);

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
