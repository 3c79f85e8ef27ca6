//! Instruction assembly
//!
//! Stateless functions pairing a program id and an ordered account list
//! with encoded instruction data. No account-semantics validation happens
//! here: ordering and flags are the caller's responsibility and are only
//! enforced by the target program at execution time.

use crate::payload::{InitializeArgs, SwapArgs};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

/// Derive the program state PDA for the initialize flow
pub fn derive_state_address(program_id: &Pubkey, seed: &[u8]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[seed], program_id)
}

/// Build the initialize instruction
///
/// Accounts: payer (signer), state PDA (writable), system program.
pub fn initialize_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    state: &Pubkey,
    args: &InitializeArgs,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new(*state, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: args.instruction_data(),
    }
}

/// Named account slots for the AMM swap instruction
///
/// Every slot is independently settable; the instruction serializes them
/// in this declaration order with fixed signer/writable flags. Slot
/// correctness is only checked by the AMM program on-chain.
#[derive(Debug, Clone)]
pub struct SwapAccounts {
    /// SPL token program
    pub token_program: Pubkey,
    /// AMM pool state account
    pub amm: Pubkey,
    /// AMM pool authority
    pub amm_authority: Pubkey,
    /// AMM open orders account on the order book
    pub amm_open_orders: Pubkey,
    /// Pool vault holding the coin-side token
    pub pool_coin_vault: Pubkey,
    /// Pool vault holding the pc-side token
    pub pool_pc_vault: Pubkey,
    /// Order book (market) program
    pub market_program: Pubkey,
    /// Market state account
    pub market: Pubkey,
    /// Market bids slab
    pub market_bids: Pubkey,
    /// Market asks slab
    pub market_asks: Pubkey,
    /// Market event queue
    pub market_event_queue: Pubkey,
    /// Market coin vault
    pub market_coin_vault: Pubkey,
    /// Market pc vault
    pub market_pc_vault: Pubkey,
    /// Market vault signer PDA
    pub market_vault_signer: Pubkey,
    /// User token account to swap from
    pub user_source: Pubkey,
    /// User token account to receive into
    pub user_destination: Pubkey,
    /// User wallet, the single transaction signer
    pub user_owner: Pubkey,
}

/// Number of account slots in the swap instruction
pub const SWAP_ACCOUNT_COUNT: usize = 17;

impl SwapAccounts {
    /// Serialize the slots into ordered account metas
    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(self.token_program, false),
            AccountMeta::new(self.amm, false),
            AccountMeta::new_readonly(self.amm_authority, false),
            AccountMeta::new(self.amm_open_orders, false),
            AccountMeta::new(self.pool_coin_vault, false),
            AccountMeta::new(self.pool_pc_vault, false),
            AccountMeta::new_readonly(self.market_program, false),
            AccountMeta::new_readonly(self.market, false),
            AccountMeta::new(self.market_bids, false),
            AccountMeta::new(self.market_asks, false),
            AccountMeta::new(self.market_event_queue, false),
            AccountMeta::new(self.market_coin_vault, false),
            AccountMeta::new(self.market_pc_vault, false),
            AccountMeta::new_readonly(self.market_vault_signer, false),
            AccountMeta::new(self.user_source, false),
            AccountMeta::new(self.user_destination, false),
            AccountMeta::new(self.user_owner, true),
        ]
    }
}

/// Build the AMM swap instruction
pub fn swap_instruction(
    amm_program: &Pubkey,
    accounts: &SwapAccounts,
    args: &SwapArgs,
) -> Instruction {
    Instruction {
        program_id: *amm_program,
        accounts: accounts.to_account_metas(),
        data: args.instruction_data(),
    }
}

/// Derive the user's associated token account for a mint
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(wallet, mint)
}

/// Build the idempotent create-associated-token-account instruction
///
/// Safe to include unconditionally: a no-op on-chain when the account
/// already exists.
pub fn create_token_account_instruction(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, &spl_token::id())
}
