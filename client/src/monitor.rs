//! Transaction receipt monitoring.
//!
//! Hardhat and Anvil mine on submission by default, but interval mining is
//! common on shared forks, so receipts are polled until they appear.

use crate::config::ForkConfig;
use crate::error::{ForkError, Result};
use crate::rpc::ForkRpcClient;
use crate::types::{ReceiptStatus, TransactionReceipt, TxHash};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Transaction monitor for tracking receipts
#[derive(Clone)]
pub struct TransactionMonitor {
    rpc: ForkRpcClient,
    config: Arc<ForkConfig>,
}

/// Monitoring options
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Poll interval (in milliseconds)
    pub poll_interval_ms: u64,
    /// Timeout (in seconds)
    pub timeout_secs: u64,
}

impl MonitorOptions {
    /// Create from fork config
    pub fn from_config(config: &ForkConfig) -> Self {
        Self {
            poll_interval_ms: config.tx_poll_interval_ms,
            timeout_secs: config.tx_timeout_secs,
        }
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Transaction monitoring result
#[derive(Debug, Clone)]
pub enum MonitorResult {
    /// Mined with status 1
    Success(TransactionReceipt),
    /// Mined with status 0
    Failed(TransactionReceipt),
    /// No receipt before the timeout
    Timeout,
}

impl TransactionMonitor {
    /// Create a new transaction monitor
    pub fn new(config: Arc<ForkConfig>) -> Result<Self> {
        let rpc = ForkRpcClient::new(config.clone())?;
        Ok(Self { rpc, config })
    }

    /// Poll for a receipt until it appears or the timeout elapses
    pub async fn monitor(&self, tx_hash: TxHash, options: MonitorOptions) -> Result<MonitorResult> {
        debug!(
            "Monitoring transaction {:?} (timeout: {}s)",
            tx_hash, options.timeout_secs
        );

        let start = Instant::now();
        let timeout = Duration::from_secs(options.timeout_secs);
        let poll_interval = Duration::from_millis(options.poll_interval_ms);

        loop {
            if start.elapsed() >= timeout {
                warn!("Transaction monitoring timed out: {:?}", tx_hash);
                return Ok(MonitorResult::Timeout);
            }

            match self.rpc.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return Ok(match ReceiptStatus::of(&receipt) {
                        ReceiptStatus::Success => {
                            debug!("Transaction mined: {:?}", tx_hash);
                            MonitorResult::Success(receipt)
                        }
                        ReceiptStatus::Failed => {
                            warn!("Transaction failed: {:?}", tx_hash);
                            MonitorResult::Failed(receipt)
                        }
                    });
                }
                Ok(None) => {
                    debug!("Transaction not yet mined: {:?}", tx_hash);
                }
                Err(e) => {
                    debug!("Error fetching receipt: {}", e);
                }
            }

            sleep(poll_interval).await;
        }
    }

    /// Wait for a successful receipt using the configured interval and timeout
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt> {
        let options = MonitorOptions::from_config(&self.config);
        let timeout_secs = options.timeout_secs;

        match self.monitor(tx_hash, options).await? {
            MonitorResult::Success(receipt) => {
                info!(
                    "Transaction {:?} confirmed in block {:?}",
                    tx_hash, receipt.block_number
                );
                Ok(receipt)
            }
            MonitorResult::Failed(_) => Err(ForkError::TransactionFailed(tx_hash)),
            MonitorResult::Timeout => Err(ForkError::TransactionTimeout(timeout_secs)),
        }
    }
}
