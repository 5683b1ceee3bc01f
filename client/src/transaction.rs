//! Transaction submission.
//!
//! Transactions are sent from accounts the simulator holds unlocked (its own
//! dev accounts, or any impersonated address) via `eth_sendTransaction`.

use crate::config::ForkConfig;
use crate::error::{ForkError, Result};
use crate::monitor::TransactionMonitor;
use crate::rpc::ForkRpcClient;
use crate::types::{TransactionReceipt, TransactionRequest, TxHash, U256};
use std::sync::Arc;
use tracing::{debug, info};

/// Transaction submitter
#[derive(Clone)]
pub struct TransactionManager {
    rpc: ForkRpcClient,
    monitor: TransactionMonitor,
}

/// Transaction submission options
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Whether to wait for a successful receipt
    pub wait_for_receipt: bool,
    /// Explicit gas limit; the simulator estimates when unset
    pub gas: Option<U256>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            wait_for_receipt: true,
            gas: None,
        }
    }
}

/// A submitted transaction
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    /// Transaction hash
    pub hash: TxHash,
    /// Receipt, when the submission waited for one
    pub receipt: Option<TransactionReceipt>,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new(config: Arc<ForkConfig>) -> Result<Self> {
        let rpc = ForkRpcClient::new(config.clone())?;
        let monitor = TransactionMonitor::new(config)?;
        Ok(Self { rpc, monitor })
    }

    /// Submit a transaction.
    ///
    /// The request must carry a `from` address the simulator can sign for.
    pub async fn submit(&self, tx: TransactionRequest, options: SubmitOptions) -> Result<SubmittedTx> {
        let from = tx.from.ok_or_else(|| {
            ForkError::ConfigError("Transaction has no sender".to_string())
        })?;

        let tx = match options.gas {
            Some(gas) => tx.gas(gas),
            None => tx,
        };

        debug!("Submitting transaction from {:?}", from);
        let hash = self.rpc.send_transaction(&tx).await?;

        if !options.wait_for_receipt {
            return Ok(SubmittedTx {
                hash,
                receipt: None,
            });
        }

        let receipt = self.monitor.wait_for_receipt(hash).await?;
        info!(
            "Transaction {:?} from {:?} used {} gas",
            hash,
            from,
            receipt.gas_used.unwrap_or_default()
        );

        Ok(SubmittedTx {
            hash,
            receipt: Some(receipt),
        })
    }

    /// Get the RPC client
    pub fn rpc(&self) -> &ForkRpcClient {
        &self.rpc
    }

    /// Get the monitor
    pub fn monitor(&self) -> &TransactionMonitor {
        &self.monitor
    }
}
