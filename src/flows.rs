//! The two end-to-end flows: initialize submission and the relayed swap
//!
//! Both are strictly linear: build payload, assemble instructions,
//! assemble transaction, sign, (optionally relay), broadcast.

use crate::builder::{SignedTransaction, TransactionBuilder};
use crate::config::{ResolvedInitialize, ResolvedSwap};
use crate::errors::PipelineResult;
use crate::gateway::Broadcaster;
use crate::instructions::{
    create_token_account_instruction, initialize_instruction, swap_instruction,
};
use crate::relay::TransactionSource;
use async_trait::async_trait;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tracing::info;

/// Builds the token-account-creation-plus-swap transaction on demand
///
/// This is the production [`TransactionSource`] behind the relay server:
/// every connection gets a freshly built and signed transaction, two
/// instructions long (idempotent ATA create, then the swap).
pub struct SwapFlow {
    builder: Arc<TransactionBuilder>,
    swap: ResolvedSwap,
}

impl SwapFlow {
    pub fn new(builder: Arc<TransactionBuilder>, swap: ResolvedSwap) -> Self {
        Self { builder, swap }
    }
}

#[async_trait]
impl TransactionSource for SwapFlow {
    async fn next_transaction(&self) -> PipelineResult<SignedTransaction> {
        let payer = self.builder.payer();

        let create_ata =
            create_token_account_instruction(&payer, &payer, &self.swap.destination_mint);
        let swap_ix =
            swap_instruction(&self.swap.amm_program, &self.swap.accounts, &self.swap.args);

        self.builder.build_signed(&[create_ata, swap_ix]).await
    }
}

/// Build, sign and broadcast the initialize instruction
///
/// The returned signature is the single success observable; no
/// confirmation polling is performed.
pub async fn run_initialize(
    builder: &TransactionBuilder,
    broadcaster: &dyn Broadcaster,
    resolved: &ResolvedInitialize,
) -> PipelineResult<Signature> {
    let ix = initialize_instruction(
        &resolved.program_id,
        &builder.payer(),
        &resolved.state,
        &resolved.args,
    );

    let signed = builder.build_signed(&[ix]).await?;
    info!(size = signed.len(), "Initialize transaction signed");

    broadcaster.broadcast(&signed.tx).await
}
