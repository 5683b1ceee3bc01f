//! JSON-RPC client for a forking ledger simulator.
//!
//! This module speaks the standard `eth_*` methods plus the simulator-only
//! cheats (account impersonation, code and balance injection, fork reset) that
//! Hardhat and Anvil expose under their own method prefix.

use crate::config::{ForkConfig, Simulator};
use crate::error::{ForkError, Result};
use crate::retry::RetryStrategy;
use crate::types::{Address, Bytes, TransactionReceipt, TransactionRequest, TxHash, H256, U256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// JSON-RPC request ID type
type RequestId = u64;

/// Fork simulator RPC client
#[derive(Clone)]
pub struct ForkRpcClient {
    /// HTTP client
    client: Client,
    /// Simulator endpoint
    base_url: String,
    /// Cheat-method namespace
    simulator: Simulator,
    /// Retry strategy for reads
    retry_strategy: RetryStrategy,
    /// Configuration
    config: Arc<ForkConfig>,
    /// Request ID counter
    request_id: Arc<AtomicU64>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: RequestId,
    method: String,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    // `null` results (e.g. a receipt that is not mined yet) are valid
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl ForkRpcClient {
    /// Create a new RPC client
    pub fn new(config: Arc<ForkConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ForkError::NetworkError)?;

        let retry_strategy = RetryStrategy::from_config(&config);

        Ok(Self {
            client,
            base_url: config.rpc_url.clone(),
            simulator: config.simulator,
            retry_strategy,
            config,
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> RequestId {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<Value> {
        let response = self
            .client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(ForkError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ForkError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ForkError::InvalidResponse(e.to_string()))?;

        if let Some(err) = rpc_response.error {
            error!(
                "{} failed: {} (code: {})",
                request.method, err.message, err.code
            );
            return Err(ForkError::from_rpc(err.code, err.message));
        }

        Ok(rpc_response.result)
    }

    fn request(&self, method: &str, params: Value) -> JsonRpcRequest {
        let id = self.next_request_id();
        debug!("RPC request: {} (id: {})", method, id);
        JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        }
    }

    /// Make a JSON-RPC call, retrying transport failures
    pub async fn call_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = self.request(method, params);
        self.retry_strategy.retry(|| self.post(&request)).await
    }

    /// Make a JSON-RPC call exactly once
    pub async fn call_rpc_once(&self, method: &str, params: Value) -> Result<Value> {
        let request = self.request(method, params);
        self.post(&request).await
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.call_rpc(method, params).await?;
        if value.is_null() {
            return Err(ForkError::InvalidResponse(format!(
                "Missing result for {}",
                method
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Chain id reported by the simulator
    pub async fn chain_id(&self) -> Result<u64> {
        let id: U256 = self.call_typed("eth_chainId", json!([])).await?;
        quantity_to_u64("chain id", id)
    }

    /// Latest block number
    pub async fn block_number(&self) -> Result<u64> {
        let number: U256 = self.call_typed("eth_blockNumber", json!([])).await?;
        quantity_to_u64("block number", number)
    }

    /// Unlocked accounts managed by the simulator
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.call_typed("eth_accounts", json!([])).await
    }

    /// Native balance of an account
    pub async fn get_balance(&self, address: Address) -> Result<U256> {
        self.call_typed("eth_getBalance", json!([address, "latest"]))
            .await
    }

    /// Deployed code at an address
    pub async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.call_typed("eth_getCode", json!([address, "latest"])).await
    }

    /// Execute a read-only call against the latest block
    pub async fn call(&self, tx: &TransactionRequest) -> Result<Bytes> {
        self.call_typed("eth_call", json!([tx, "latest"])).await
    }

    /// Submit a transaction from an unlocked or impersonated account.
    ///
    /// Never retried: a resubmission could apply the state change twice.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash> {
        let value = self
            .call_rpc_once("eth_sendTransaction", json!([tx]))
            .await?;
        let hash: H256 = serde_json::from_value(value).map_err(|e| {
            ForkError::InvalidResponse(format!("Bad transaction hash: {}", e))
        })?;
        debug!("Transaction sent: {:?}", hash);
        Ok(hash)
    }

    /// Receipt for a transaction, `None` while it is not mined
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>> {
        let value = self
            .call_rpc("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Allow transactions to be sent as `address` without its key
    pub async fn impersonate_account(&self, address: Address) -> Result<()> {
        info!("Impersonating {:?}", address);

        let method = self.simulator.method("impersonateAccount");
        match self.call_rpc(&method, json!([address])).await {
            Ok(Value::Bool(false)) => Err(ForkError::ImpersonationFailed {
                address,
                reason: "simulator returned false".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(ForkError::RpcError { message, .. }) => Err(ForkError::ImpersonationFailed {
                address,
                reason: message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Lock an impersonated account again
    pub async fn stop_impersonating_account(&self, address: Address) -> Result<()> {
        debug!("Stop impersonating {:?}", address);

        let method = self.simulator.method("stopImpersonatingAccount");
        self.call_rpc(&method, json!([address])).await?;
        Ok(())
    }

    /// Overwrite the native balance of an account
    pub async fn set_balance(&self, address: Address, balance: U256) -> Result<()> {
        debug!("Setting balance of {:?} to {}", address, balance);

        let method = self.simulator.method("setBalance");
        self.call_rpc(&method, json!([address, balance])).await?;
        Ok(())
    }

    /// Replace the runtime bytecode at an address
    pub async fn set_code(&self, address: Address, code: &Bytes) -> Result<()> {
        info!("Injecting {} bytes of code at {:?}", code.len(), address);

        let method = self.simulator.method("setCode");
        self.call_rpc(&method, json!([address, code])).await?;
        Ok(())
    }

    /// Overwrite one storage slot
    pub async fn set_storage_at(&self, address: Address, slot: U256, value: H256) -> Result<()> {
        debug!("Setting storage slot {} of {:?}", slot, address);

        let method = self.simulator.method("setStorageAt");
        self.call_rpc(&method, json!([address, slot, value])).await?;
        Ok(())
    }

    /// Reset the simulator to a fresh fork of `fork_url` at `block`.
    ///
    /// A Hardhat reset needs the upstream URL. Anvil keeps its upstream and
    /// only needs the block.
    pub async fn reset_fork(&self, fork_url: Option<&str>, block: Option<u64>) -> Result<()> {
        let forking = match (fork_url, block) {
            (Some(url), _) => {
                let mut forking = json!({ "jsonRpcUrl": url });
                if let Some(block) = block {
                    forking["blockNumber"] = json!(block);
                }
                forking
            }
            (None, Some(block)) if self.simulator == Simulator::Anvil => {
                json!({ "blockNumber": block })
            }
            (None, _) => {
                return Err(ForkError::ConfigError(format!(
                    "Resetting a {:?} fork requires an upstream fork URL",
                    self.simulator
                )));
            }
        };

        info!("Resetting fork (block: {:?})", block);
        let method = self.simulator.method("reset");
        self.call_rpc_once(&method, json!([{ "forking": forking }]))
            .await?;
        Ok(())
    }

    /// Mine a single block
    pub async fn mine(&self) -> Result<()> {
        self.call_rpc_once("evm_mine", json!([])).await?;
        Ok(())
    }

    /// Health check - verify the simulator answers and serves the expected chain
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Performing simulator health check");

        let chain_id = self.chain_id().await?;
        if let Some(expected) = self.config.chain_id {
            if chain_id != expected {
                return Err(ForkError::ConfigError(format!(
                    "Expected chain id {}, simulator reports {}",
                    expected, chain_id
                )));
            }
        }

        info!("Simulator health check passed (chain id {})", chain_id);
        Ok(true)
    }
}

fn quantity_to_u64(what: &str, value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(ForkError::InvalidResponse(format!(
            "{} {} does not fit in 64 bits",
            what, value
        )));
    }
    Ok(value.as_u64())
}
