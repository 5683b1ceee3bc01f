//! Error types for the fork client.
//!
//! This module defines all error types that can occur while talking to a
//! forking ledger simulator, including transport errors, JSON-RPC errors,
//! reverted transactions and configuration errors.

use ethers::types::{Address, H256};
use thiserror::Error;

/// Main error type for fork client operations
#[derive(Error, Debug)]
pub enum ForkError {
    /// JSON-RPC error object returned by the simulator
    #[error("RPC error {code}: {message}")]
    RpcError {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the simulator
        message: String,
    },

    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The simulator refused to unlock an account
    #[error("Cannot impersonate {address:?}: {reason}")]
    ImpersonationFailed {
        /// Account that could not be unlocked
        address: Address,
        /// Simulator message
        reason: String,
    },

    /// Transaction reverted during execution
    #[error("Transaction reverted: {reason}")]
    TransactionReverted {
        /// Revert reason, or the raw simulator message if none was given
        reason: String,
    },

    /// Transaction was mined with status 0
    #[error("Transaction {0:?} failed on-chain")]
    TransactionFailed(H256),

    /// Transaction receipt did not appear in time
    #[error("Transaction timeout after {0} seconds")]
    TransactionTimeout(u64),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid response from the simulator
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Max retries exceeded
    #[error("Max retries ({0}) exceeded")]
    MaxRetriesExceeded(usize),
}

/// Result type alias for fork client operations
pub type Result<T> = std::result::Result<T, ForkError>;

const HARDHAT_REASON_MARKER: &str = "reverted with reason string '";
const ANVIL_REASON_MARKER: &str = "execution reverted: ";

impl ForkError {
    /// Build the error for a JSON-RPC error object, recognising reverts.
    pub fn from_rpc(code: i64, message: String) -> Self {
        if message.contains("revert") {
            let reason = extract_revert_reason(&message).unwrap_or(message);
            ForkError::TransactionReverted { reason }
        } else {
            ForkError::RpcError { code, message }
        }
    }

    /// Revert reason carried by this error, if it is a revert
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            ForkError::TransactionReverted { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Pull the reason string out of a Hardhat or Anvil revert message.
pub fn extract_revert_reason(message: &str) -> Option<String> {
    if let Some(start) = message.find(HARDHAT_REASON_MARKER) {
        let rest = &message[start + HARDHAT_REASON_MARKER.len()..];
        let end = rest.find('\'')?;
        return Some(rest[..end].to_string());
    }
    if let Some(start) = message.find(ANVIL_REASON_MARKER) {
        let reason = message[start + ANVIL_REASON_MARKER.len()..].trim();
        if !reason.is_empty() {
            return Some(reason.to_string());
        }
    }
    None
}

/// Error context for retryable operations
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    /// Number of attempts made
    pub attempts: usize,
    /// Last error encountered
    pub last_error: String,
    /// Total time spent waiting between attempts (in milliseconds)
    pub total_time_ms: u64,
}

impl RetryContext {
    /// Create a new retry context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt
    pub fn record_attempt(&mut self, error: &str, duration_ms: u64) {
        self.attempts += 1;
        self.last_error = error.to_string();
        self.total_time_ms += duration_ms;
    }
}
