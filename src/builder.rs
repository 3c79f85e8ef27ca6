//! Transaction assembly and signing
//!
//! Compiles a payer, freshness token and ordered instruction list into a
//! canonical v0 message, signs it with the single wallet keypair, and
//! serializes the result to wire bytes. Built once, never mutated after
//! signing.

use crate::errors::{PipelineError, PipelineResult};
use crate::gateway::BlockhashSource;
use crate::wallet::WalletManager;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tokio::time::Instant;

/// A signed transaction with its serialized wire form
///
/// `signed_at` anchors the relay broadcast delay: the delayed submission
/// is scheduled relative to signing, not to relay delivery.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// The signed transaction
    pub tx: VersionedTransaction,

    /// Serialized wire bytes, the unit relayed and broadcast
    pub bytes: Vec<u8>,

    /// When signing completed
    pub signed_at: Instant,
}

impl SignedTransaction {
    /// Byte length of the serialized transaction
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the serialized form is empty (never for a signed tx)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Assembles and signs transactions for a single fee payer
pub struct TransactionBuilder {
    wallet: WalletManager,
    blockhash_source: Arc<dyn BlockhashSource>,
}

impl TransactionBuilder {
    /// Create a builder over a wallet and a blockhash source
    pub fn new(wallet: WalletManager, blockhash_source: Arc<dyn BlockhashSource>) -> Self {
        Self {
            wallet,
            blockhash_source,
        }
    }

    /// Fee payer public key
    pub fn payer(&self) -> solana_sdk::pubkey::Pubkey {
        self.wallet.pubkey()
    }

    /// Fetch a fresh blockhash, then compile, sign and serialize
    pub async fn build_signed(
        &self,
        instructions: &[Instruction],
    ) -> PipelineResult<SignedTransaction> {
        let blockhash = self.blockhash_source.latest_blockhash().await?;
        self.sign_with_blockhash(instructions, blockhash)
    }

    /// Compile, sign and serialize against a known blockhash
    pub fn sign_with_blockhash(
        &self,
        instructions: &[Instruction],
        blockhash: Hash,
    ) -> PipelineResult<SignedTransaction> {
        let payer = self.wallet.pubkey();

        let message = v0::Message::try_compile(&payer, instructions, &[], blockhash)
            .map_err(|e| PipelineError::Compile(e.to_string()))?;

        let tx =
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[self.wallet.keypair()])
                .map_err(|e| PipelineError::Signing(e.to_string()))?;

        let bytes = bincode::serialize(&tx)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;

        Ok(SignedTransaction {
            tx,
            bytes,
            signed_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solana_sdk::{
        instruction::AccountMeta, pubkey::Pubkey, signature::Keypair, signer::Signer,
    };

    struct FixedBlockhash(Hash);

    #[async_trait]
    impl BlockhashSource for FixedBlockhash {
        async fn latest_blockhash(&self) -> PipelineResult<Hash> {
            Ok(self.0)
        }
    }

    fn sample_instruction(payer: &Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[9, 1, 2, 3],
            vec![AccountMeta::new(*payer, true)],
        )
    }

    #[tokio::test]
    async fn test_build_signed_single_signer() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let wallet = WalletManager::from_keypair(keypair);
        let builder =
            TransactionBuilder::new(wallet, Arc::new(FixedBlockhash(Hash::new_unique())));

        let signed = builder
            .build_signed(&[sample_instruction(&payer)])
            .await
            .unwrap();

        assert_eq!(signed.tx.signatures.len(), 1);
        assert!(!signed.is_empty());
    }

    #[tokio::test]
    async fn test_bytes_round_trip() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let wallet = WalletManager::from_keypair(keypair);
        let builder =
            TransactionBuilder::new(wallet, Arc::new(FixedBlockhash(Hash::new_unique())));

        let signed = builder
            .build_signed(&[sample_instruction(&payer)])
            .await
            .unwrap();

        let decoded: VersionedTransaction = bincode::deserialize(&signed.bytes).unwrap();
        assert_eq!(decoded.signatures, signed.tx.signatures);
        assert_eq!(signed.len(), signed.bytes.len());
    }

    #[tokio::test]
    async fn test_blockhash_failure_propagates() {
        struct Failing;

        #[async_trait]
        impl BlockhashSource for Failing {
            async fn latest_blockhash(&self) -> PipelineResult<Hash> {
                Err(PipelineError::Blockhash("endpoint down".to_string()))
            }
        }

        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let wallet = WalletManager::from_keypair(keypair);
        let builder = TransactionBuilder::new(wallet, Arc::new(Failing));

        let err = builder
            .build_signed(&[sample_instruction(&payer)])
            .await
            .unwrap_err();
        assert_eq!(err.category(), "blockhash");
    }
}
