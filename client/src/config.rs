//! Connection configuration for forking ledger simulators.
//!
//! This module provides configuration for connecting to a local Hardhat or
//! Anvil node that forks mainnet state, together with retry and transaction
//! polling settings.

use crate::error::{ForkError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default local JSON-RPC endpoint used by both Hardhat and Anvil
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Environment variable that overrides the simulator endpoint
pub const RPC_URL_ENV: &str = "FORK_RPC_URL";

/// Ledger simulator flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    /// Hardhat Network
    Hardhat,
    /// Foundry's Anvil
    Anvil,
}

impl Simulator {
    /// Namespace of the simulator-only cheat methods
    pub fn method_prefix(&self) -> &'static str {
        match self {
            Simulator::Hardhat => "hardhat",
            Simulator::Anvil => "anvil",
        }
    }

    /// Full JSON-RPC method name for a cheat, e.g. `hardhat_setCode`
    pub fn method(&self, name: &str) -> String {
        format!("{}_{}", self.method_prefix(), name)
    }
}

/// Configuration for the fork client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkConfig {
    /// Simulator flavour
    pub simulator: Simulator,

    /// Simulator JSON-RPC endpoint URL
    pub rpc_url: String,

    /// Upstream archive node the simulator forks from (used on reset)
    pub fork_url: Option<String>,

    /// Pinned block number for the fork
    pub fork_block: Option<u64>,

    /// Expected chain id; Hardhat reports 31337 for forks unless configured
    pub chain_id: Option<u64>,

    /// HTTP request timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Maximum number of retries for failed reads
    pub max_retries: usize,

    /// Initial retry delay (in milliseconds)
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay (in milliseconds)
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    pub retry_multiplier: f64,

    /// Receipt polling interval (in milliseconds)
    pub tx_poll_interval_ms: u64,

    /// Receipt timeout (in seconds)
    pub tx_timeout_secs: u64,
}

impl ForkConfig {
    /// Create a new configuration for the given simulator on the default endpoint
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            fork_url: None,
            fork_block: None,
            chain_id: None,
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            retry_multiplier: 2.0,
            tx_poll_interval_ms: 250,
            tx_timeout_secs: 120,
        }
    }

    /// Configuration for a local Hardhat node
    pub fn hardhat() -> Self {
        Self::new(Simulator::Hardhat)
    }

    /// Configuration for a local Anvil node
    pub fn anvil() -> Self {
        Self::new(Simulator::Anvil)
    }

    /// Configuration for a custom endpoint
    pub fn custom(simulator: Simulator, rpc_url: String) -> Result<Self> {
        if rpc_url.is_empty() {
            return Err(ForkError::ConfigError(
                "RPC URL cannot be empty".to_string(),
            ));
        }
        Url::parse(&rpc_url)?;

        Ok(Self {
            rpc_url,
            ..Self::new(simulator)
        })
    }

    /// Hardhat configuration whose endpoint may be overridden by `FORK_RPC_URL`
    pub fn from_env() -> Result<Self> {
        match std::env::var(RPC_URL_ENV) {
            Ok(url) => Self::custom(Simulator::Hardhat, url),
            Err(_) => Ok(Self::hardhat()),
        }
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set retry delays
    pub fn with_retry_config(
        mut self,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        self.retry_initial_delay_ms = initial_delay_ms;
        self.retry_max_delay_ms = max_delay_ms;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set receipt polling configuration
    pub fn with_tx_config(mut self, poll_interval_ms: u64, timeout_secs: u64) -> Self {
        self.tx_poll_interval_ms = poll_interval_ms;
        self.tx_timeout_secs = timeout_secs;
        self
    }

    /// Require the simulator to report this chain id
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Set the upstream node and pinned block used when resetting the fork
    pub fn with_fork(mut self, fork_url: String, fork_block: Option<u64>) -> Self {
        self.fork_url = Some(fork_url);
        self.fork_block = fork_block;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(ForkError::ConfigError(
                "RPC URL cannot be empty".to_string(),
            ));
        }
        Url::parse(&self.rpc_url)?;
        match &self.fork_url {
            Some(fork_url) => {
                Url::parse(fork_url)?;
            }
            None if self.fork_block.is_some() && self.simulator == Simulator::Hardhat => {
                return Err(ForkError::ConfigError(
                    "A pinned fork block requires an upstream fork URL on Hardhat".to_string(),
                ));
            }
            None => {}
        }
        if self.max_retries == 0 {
            return Err(ForkError::ConfigError(
                "Max retries must be greater than 0".to_string(),
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(ForkError::ConfigError(
                "Retry initial delay must be greater than 0".to_string(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(ForkError::ConfigError(
                "Retry multiplier must be greater than 1.0".to_string(),
            ));
        }
        if self.tx_poll_interval_ms == 0 {
            return Err(ForkError::ConfigError(
                "Transaction poll interval must be greater than 0".to_string(),
            ));
        }
        if self.tx_timeout_secs == 0 {
            return Err(ForkError::ConfigError(
                "Transaction timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self::hardhat()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
