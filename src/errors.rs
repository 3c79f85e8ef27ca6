//! Error types for the transaction pipeline
//!
//! One taxonomy covers the whole build-sign-relay-broadcast lifecycle.
//! Errors carry enough context for logging and are classified by
//! retryability so the retry layer can decide without string matching
//! at call sites.

use thiserror::Error;

/// Error type for payload encoding, transaction assembly, relay and
/// broadcast operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Failed to fetch a recent blockhash from the RPC endpoint
    #[error("Blockhash fetch failed: {0}")]
    Blockhash(String),

    /// Transaction message compilation failed
    #[error("Message compile error: {0}")]
    Compile(String),

    /// Failed to sign the assembled message
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Transaction serialization to wire bytes failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Broadcast submission was rejected or timed out
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    /// WebSocket relay channel error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Configuration or validation error
    ///
    /// Raised at startup when an address fails to parse or a numeric
    /// field is out of range. Never retryable.
    #[error("Configuration error (field={field}): {reason}")]
    Configuration {
        /// The configuration field that failed validation
        field: String,
        /// Detailed reason for the failure
        reason: String,
    },

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl PipelineError {
    /// Check if this error is potentially retryable
    ///
    /// Returns `true` if retrying the operation might succeed. Network
    /// round-trips are transient; everything decided locally is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Blockhash(_) => true,
            Self::Broadcast(_) => true,
            Self::Relay(_) => false,
            Self::Compile(_) => false,
            Self::Signing(_) => false,
            Self::Serialization(_) => false,
            Self::Configuration { .. } => false,
            Self::External(_) => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Blockhash(_) => "blockhash",
            Self::Compile(_) => "compile",
            Self::Signing(_) => "signing",
            Self::Serialization(_) => "serialization",
            Self::Broadcast(_) => "broadcast",
            Self::Relay(_) => "relay",
            Self::Configuration { .. } => "config",
            Self::External(_) => "external",
        }
    }

    /// Create a configuration error for a specific field
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate
pub type PipelineResult<T> = Result<T, PipelineError>;
