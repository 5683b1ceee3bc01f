//! Common types used across the fork client.
//!
//! Ethereum primitives come from `ethers`; this module re-exports the ones the
//! client API uses and adds a few small helpers around receipts.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};

/// Transaction hash type
pub type TxHash = H256;

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReceiptStatus {
    /// Status 1
    Success,
    /// Status 0
    Failed,
}

impl ReceiptStatus {
    /// Read the status field of a receipt. Pre-Byzantium receipts without a
    /// status are treated as successful.
    pub fn of(receipt: &TransactionReceipt) -> Self {
        match receipt.status {
            Some(status) if status.is_zero() => ReceiptStatus::Failed,
            _ => ReceiptStatus::Success,
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptStatus::Success => write!(f, "SUCCESS"),
            ReceiptStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Convert whole ether into wei
pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(18)
}
