//! Solana transaction build/relay toolkit
//!
//! Fixed-layout instruction payload encoding, v0 transaction assembly and
//! signing, WebSocket relay of signed bytes, and RPC broadcast.

pub mod builder;
pub mod config;
pub mod errors;
pub mod flows;
pub mod gateway;
pub mod instructions;
pub mod payload;
pub mod relay;
pub mod wallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
