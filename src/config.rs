//! Configuration module
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.
//! Every on-chain address and numeric constant used by the two flows is a
//! configuration input, parsed and range-checked at startup rather than
//! embedded in logic.

use crate::errors::{PipelineError, PipelineResult};
use crate::instructions::{associated_token_address, SwapAccounts};
use crate::payload::{InitializeArgs, SwapArgs};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Relay server configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Initialize flow configuration
    #[serde(default)]
    pub initialize: InitializeConfig,

    /// Swap flow configuration
    #[serde(default)]
    pub swap: SwapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,

    /// Skip local preflight simulation when submitting
    #[serde(default)]
    pub skip_preflight: bool,

    /// Max attempts per network call (including the initial attempt)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file (JSON byte array or raw 64 bytes)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address the WebSocket server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Delay between signing and broadcast, in milliseconds
    #[serde(default = "default_broadcast_delay_ms")]
    pub broadcast_delay_ms: u64,

    /// Cap on simultaneous build-sign cycles across connections
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeConfig {
    /// Target program id
    #[serde(default)]
    pub program_id: String,

    /// Seed for the program state PDA
    #[serde(default = "default_state_seed")]
    pub state_seed: String,

    /// Pre-swap SOL balance snapshot, in lamports
    #[serde(default)]
    pub preswap_sol_balance: u64,

    /// Tip in basis points (max 10000)
    #[serde(default = "default_tip_bps")]
    pub tip_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    /// AMM program id
    #[serde(default = "default_amm_program")]
    pub amm_program: String,

    /// Amount of the source token to swap in, in base units
    #[serde(default = "default_amount_in")]
    pub amount_in: u64,

    /// Minimum acceptable amount out
    #[serde(default)]
    pub minimum_amount_out: u64,

    /// Mint of the token swapped from (user source ATA is derived)
    #[serde(default = "default_source_mint")]
    pub source_mint: String,

    /// Mint of the token swapped into (user destination ATA is derived
    /// and created idempotently)
    #[serde(default)]
    pub destination_mint: String,

    /// Pool and market account slots, one named field per slot
    #[serde(default)]
    pub accounts: SwapAccountsConfig,
}

/// Configured account slots for the swap instruction
///
/// User-side slots (source, destination, owner) are derived from the
/// wallet and the configured mints; everything else is set here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAccountsConfig {
    #[serde(default = "default_token_program")]
    pub token_program: String,
    #[serde(default)]
    pub amm: String,
    #[serde(default)]
    pub amm_authority: String,
    #[serde(default)]
    pub amm_open_orders: String,
    #[serde(default)]
    pub pool_coin_vault: String,
    #[serde(default)]
    pub pool_pc_vault: String,
    #[serde(default)]
    pub market_program: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub market_bids: String,
    #[serde(default)]
    pub market_asks: String,
    #[serde(default)]
    pub market_event_queue: String,
    #[serde(default)]
    pub market_coin_vault: String,
    #[serde(default)]
    pub market_pc_vault: String,
    #[serde(default)]
    pub market_vault_signer: String,
}

/// Fully resolved swap flow inputs
#[derive(Debug, Clone)]
pub struct ResolvedSwap {
    /// AMM program id
    pub amm_program: Pubkey,

    /// Ordered, named account slots
    pub accounts: SwapAccounts,

    /// Encoded payload arguments
    pub args: SwapArgs,

    /// Destination mint, needed for the ATA create instruction
    pub destination_mint: Pubkey,
}

/// Fully resolved initialize flow inputs
#[derive(Debug, Clone)]
pub struct ResolvedInitialize {
    /// Target program id
    pub program_id: Pubkey,

    /// Derived state PDA
    pub state: Pubkey,

    /// Encoded payload arguments
    pub args: InitializeArgs,
}

// Default value functions
fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    5000
}
fn default_keypair_path() -> String {
    "payer.json".to_string()
}
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_broadcast_delay_ms() -> u64 {
    1000
}
fn default_max_inflight() -> usize {
    1
}
fn default_state_seed() -> String {
    "state".to_string()
}
fn default_tip_bps() -> u16 {
    3000
}
fn default_amm_program() -> String {
    "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8".to_string()
}
fn default_amount_in() -> u64 {
    100_000_000
}
fn default_source_mint() -> String {
    // Wrapped SOL
    "So11111111111111111111111111111111111111112".to_string()
}
fn default_token_program() -> String {
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".to_string()
}

impl Default for SwapAccountsConfig {
    fn default() -> Self {
        Self {
            token_program: default_token_program(),
            amm: String::new(),
            amm_authority: String::new(),
            amm_open_orders: String::new(),
            pool_coin_vault: String::new(),
            pool_pc_vault: String::new(),
            market_program: String::new(),
            market: String::new(),
            market_bids: String::new(),
            market_asks: String::new(),
            market_event_queue: String::new(),
            market_coin_vault: String::new(),
            market_pc_vault: String::new(),
            market_vault_signer: String::new(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            skip_preflight: false,
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            broadcast_delay_ms: default_broadcast_delay_ms(),
            max_inflight: default_max_inflight(),
        }
    }
}

impl Default for InitializeConfig {
    fn default() -> Self {
        Self {
            program_id: String::new(),
            state_seed: default_state_seed(),
            preswap_sol_balance: 0,
            tip_bps: default_tip_bps(),
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            amm_program: default_amm_program(),
            amount_in: default_amount_in(),
            minimum_amount_out: 0,
            source_mint: default_source_mint(),
            destination_mint: String::new(),
            accounts: SwapAccountsConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            wallet: WalletConfig::default(),
            relay: RelayConfig::default(),
            initialize: InitializeConfig::default(),
            swap: SwapConfig::default(),
        }
    }
}

fn parse_pubkey(field: &str, value: &str) -> PipelineResult<Pubkey> {
    if value.is_empty() {
        return Err(PipelineError::config(field, "address is not set"));
    }
    Pubkey::from_str(value)
        .map_err(|e| PipelineError::config(field, format!("invalid address '{}': {}", value, e)))
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }
}

impl InitializeConfig {
    /// Parse and range-check the initialize flow inputs
    pub fn resolve(&self) -> PipelineResult<ResolvedInitialize> {
        let program_id = parse_pubkey("initialize.program_id", &self.program_id)?;
        if self.state_seed.is_empty() {
            return Err(PipelineError::config(
                "initialize.state_seed",
                "seed must not be empty",
            ));
        }
        if self.tip_bps > 10_000 {
            return Err(PipelineError::config(
                "initialize.tip_bps",
                format!("{} exceeds 10000 basis points", self.tip_bps),
            ));
        }

        let (state, _bump) = crate::instructions::derive_state_address(
            &program_id,
            self.state_seed.as_bytes(),
        );

        Ok(ResolvedInitialize {
            program_id,
            state,
            args: InitializeArgs {
                preswap_sol_balance: self.preswap_sol_balance,
                tip_bps: self.tip_bps,
            },
        })
    }
}

impl SwapConfig {
    /// Parse and range-check the swap flow inputs for the given payer
    pub fn resolve(&self, payer: &Pubkey) -> PipelineResult<ResolvedSwap> {
        if self.amount_in == 0 {
            return Err(PipelineError::config(
                "swap.amount_in",
                "amount must be greater than zero",
            ));
        }

        let amm_program = parse_pubkey("swap.amm_program", &self.amm_program)?;
        let source_mint = parse_pubkey("swap.source_mint", &self.source_mint)?;
        let destination_mint = parse_pubkey("swap.destination_mint", &self.destination_mint)?;

        let a = &self.accounts;
        let accounts = SwapAccounts {
            token_program: parse_pubkey("swap.accounts.token_program", &a.token_program)?,
            amm: parse_pubkey("swap.accounts.amm", &a.amm)?,
            amm_authority: parse_pubkey("swap.accounts.amm_authority", &a.amm_authority)?,
            amm_open_orders: parse_pubkey("swap.accounts.amm_open_orders", &a.amm_open_orders)?,
            pool_coin_vault: parse_pubkey("swap.accounts.pool_coin_vault", &a.pool_coin_vault)?,
            pool_pc_vault: parse_pubkey("swap.accounts.pool_pc_vault", &a.pool_pc_vault)?,
            market_program: parse_pubkey("swap.accounts.market_program", &a.market_program)?,
            market: parse_pubkey("swap.accounts.market", &a.market)?,
            market_bids: parse_pubkey("swap.accounts.market_bids", &a.market_bids)?,
            market_asks: parse_pubkey("swap.accounts.market_asks", &a.market_asks)?,
            market_event_queue: parse_pubkey(
                "swap.accounts.market_event_queue",
                &a.market_event_queue,
            )?,
            market_coin_vault: parse_pubkey(
                "swap.accounts.market_coin_vault",
                &a.market_coin_vault,
            )?,
            market_pc_vault: parse_pubkey("swap.accounts.market_pc_vault", &a.market_pc_vault)?,
            market_vault_signer: parse_pubkey(
                "swap.accounts.market_vault_signer",
                &a.market_vault_signer,
            )?,
            user_source: associated_token_address(payer, &source_mint),
            user_destination: associated_token_address(payer, &destination_mint),
            user_owner: *payer,
        };

        Ok(ResolvedSwap {
            amm_program,
            accounts,
            args: SwapArgs {
                amount_in: self.amount_in,
                minimum_amount_out: self.minimum_amount_out,
            },
            destination_mint,
        })
    }
}

impl RelayConfig {
    /// Range-check relay settings
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_inflight == 0 {
            return Err(PipelineError::config(
                "relay.max_inflight",
                "concurrency cap must be at least 1",
            ));
        }
        Ok(())
    }
}
