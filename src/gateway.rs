//! Network capability seam: blockhash fetch and broadcast
//!
//! Payload construction never talks to the network directly. The two
//! round-trips the pipeline needs are behind traits so retry/backoff
//! policy (and test mocks) layer on without touching build logic.

use crate::errors::{PipelineError, PipelineResult};
use async_trait::async_trait;
use rand::Rng;
use solana_client::{
    nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, signature::Signature,
    transaction::VersionedTransaction,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Source of transaction freshness tokens (recent blockhashes)
#[async_trait]
pub trait BlockhashSource: Send + Sync {
    /// Fetch the latest blockhash
    async fn latest_blockhash(&self) -> PipelineResult<Hash>;
}

/// Submits signed transactions to the network
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit a signed transaction; returns the network-assigned signature
    async fn broadcast(&self, tx: &VersionedTransaction) -> PipelineResult<Signature>;
}

/// Retry configuration with jitter
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including initial attempt)
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,
    /// Jitter factor (0.0 to 1.0) - adds randomness to backoff
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 5000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Calculate backoff delay for a given attempt (0-indexed)
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        // Exponential backoff: base * 2^attempt, capped
        let exp_backoff = (self.base_backoff_ms as f64) * 2_f64.powi(attempt as i32);
        let capped_backoff = exp_backoff.min(self.max_backoff_ms as f64);

        // Jitter to avoid thundering herd
        let mut rng = rand::thread_rng();
        let jitter_range = capped_backoff * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_backoff = (capped_backoff + jitter).max(0.0);

        Duration::from_millis(final_backoff as u64)
    }
}

impl From<&crate::config::RpcConfig> for RetryConfig {
    fn from(config: &crate::config::RpcConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff_ms: config.base_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            ..Self::default()
        }
    }
}

/// Retry an async operation with capped exponential backoff
///
/// Permanent errors (per `PipelineError::is_retryable`) fail immediately;
/// transient errors are retried up to `max_attempts`.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            debug!(
                operation = operation_name,
                attempt = attempt + 1,
                max_attempts = config.max_attempts,
                "Retrying operation"
            );
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                let backoff = config.calculate_backoff(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    category = e.category(),
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Transient failure"
                );
                last_error = Some(e);
                if attempt + 1 < config.max_attempts {
                    sleep(backoff).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        PipelineError::External(anyhow::anyhow!("retry loop exited without an error"))
    }))
}

/// RPC-backed implementation of both network capabilities
pub struct RpcGateway {
    client: Arc<RpcClient>,
    retry: RetryConfig,
    skip_preflight: bool,
}

impl RpcGateway {
    /// Create a gateway against an RPC endpoint at confirmed commitment
    pub fn new(endpoint: &str, skip_preflight: bool, retry: RetryConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(
            endpoint.to_string(),
            CommitmentConfig::confirmed(),
        ));
        Self {
            client,
            retry,
            skip_preflight,
        }
    }
}

#[async_trait]
impl BlockhashSource for RpcGateway {
    async fn latest_blockhash(&self) -> PipelineResult<Hash> {
        let client = Arc::clone(&self.client);
        retry_with_backoff("get_latest_blockhash", &self.retry, move || {
            let client = Arc::clone(&client);
            async move {
                client
                    .get_latest_blockhash()
                    .await
                    .map_err(|e| PipelineError::Blockhash(e.to_string()))
            }
        })
        .await
    }
}

#[async_trait]
impl Broadcaster for RpcGateway {
    async fn broadcast(&self, tx: &VersionedTransaction) -> PipelineResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: self.skip_preflight,
            ..RpcSendTransactionConfig::default()
        };

        let client = Arc::clone(&self.client);
        retry_with_backoff("send_transaction", &self.retry, move || {
            let client = Arc::clone(&client);
            let config = config.clone();
            async move {
                client
                    .send_transaction_with_config(tx, config)
                    .await
                    .map_err(|e| PipelineError::Broadcast(e.to_string()))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff_ms: 1,
            max_backoff_ms: 5,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff("op", &fast_retry(3), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PipelineError::Blockhash("transient".to_string()))
            } else {
                Ok(42u32)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_fast() {
        let attempts = AtomicU32::new(0);

        let result: PipelineResult<u32> = retry_with_backoff("op", &fast_retry(3), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Signing("bad key".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_capped() {
        let attempts = AtomicU32::new(0);

        let result: PipelineResult<u32> = retry_with_backoff("op", &fast_retry(3), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Broadcast("still down".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_backoff_ms: 100,
            max_backoff_ms: 500,
            jitter_factor: 0.0,
        };
        assert_eq!(config.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(config.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(config.calculate_backoff(8), Duration::from_millis(500));
    }
}
