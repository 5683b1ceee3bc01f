//! Fork client for mainnet-forking ledger simulators
//!
//! This library talks JSON-RPC to a local Hardhat or Anvil node that forks
//! live chain state. Besides the standard `eth_*` methods it exposes the
//! simulator-only capabilities integration scenarios rely on: impersonating
//! arbitrary accounts, injecting code or balances at an address, and resetting
//! the fork to a pinned block.
//!
//! # Features
//!
//! - **Simulator cheats**: impersonation, `setCode`, `setBalance`,
//!   `setStorageAt`, fork reset, for both Hardhat and Anvil method prefixes
//! - **Transaction submission**: send from unlocked or impersonated accounts
//! - **Receipt monitoring**: poll with configurable interval and timeout
//! - **Error handling**: reverts are decoded into their reason strings
//! - **Retry logic**: exponential backoff for transient transport errors on reads
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use compound_fork_client::{ForkClient, ForkConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ForkClient::new(Arc::new(ForkConfig::hardhat()))?;
//!     client.health_check().await?;
//!
//!     let accounts = client.rpc().accounts().await?;
//!     println!("First dev account: {:?}", accounts[0]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod monitor;
pub mod retry;
pub mod rpc;
pub mod transaction;
pub mod types;

pub use config::{ForkConfig, Simulator};
pub use error::{ForkError, Result};
pub use monitor::{MonitorOptions, MonitorResult, TransactionMonitor};
pub use retry::RetryStrategy;
pub use rpc::ForkRpcClient;
pub use transaction::{SubmitOptions, SubmittedTx, TransactionManager};
pub use types::{
    Address, Bytes, ReceiptStatus, TransactionReceipt, TransactionRequest, TxHash, H256, U256,
};

use std::sync::Arc;
use tracing::info;

/// Main fork client combining RPC access, transaction submission and monitoring.
#[derive(Clone)]
pub struct ForkClient {
    transaction_manager: TransactionManager,
    config: Arc<ForkConfig>,
}

impl ForkClient {
    /// Create a new fork client
    pub fn new(config: Arc<ForkConfig>) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing fork client for {:?} at {}",
            config.simulator, config.rpc_url
        );

        let transaction_manager = TransactionManager::new(config.clone())?;

        Ok(Self {
            transaction_manager,
            config,
        })
    }

    /// Get the RPC client
    pub fn rpc(&self) -> &ForkRpcClient {
        self.transaction_manager.rpc()
    }

    /// Get the transaction manager
    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.transaction_manager
    }

    /// Submit a transaction and wait for a successful receipt
    pub async fn submit(&self, tx: TransactionRequest) -> Result<SubmittedTx> {
        self.transaction_manager
            .submit(tx, SubmitOptions::default())
            .await
    }

    /// Submit a transaction with explicit options
    pub async fn submit_with(
        &self,
        tx: TransactionRequest,
        options: SubmitOptions,
    ) -> Result<SubmittedTx> {
        self.transaction_manager.submit(tx, options).await
    }

    /// Wait for a successful receipt
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt> {
        self.transaction_manager
            .monitor()
            .wait_for_receipt(tx_hash)
            .await
    }

    /// Reset the fork to the configured upstream node and pinned block
    pub async fn reset_fork(&self) -> Result<()> {
        self.rpc()
            .reset_fork(self.config.fork_url.as_deref(), self.config.fork_block)
            .await
    }

    /// Health check - verify the simulator is reachable and on the expected chain
    pub async fn health_check(&self) -> Result<bool> {
        self.rpc().health_check().await
    }

    /// Get configuration
    pub fn config(&self) -> &ForkConfig {
        &self.config
    }
}
