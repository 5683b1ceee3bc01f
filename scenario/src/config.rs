//! Configuration for the short-selling scenario

use crate::error::{ScenarioError, ScenarioResult};
use crate::units;
use compound_fork_client::config::{DEFAULT_RPC_URL, RPC_URL_ENV};
use compound_fork_client::{Address, ForkConfig, Simulator, U256};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Mainnet block the default addresses and holders are pinned to
pub const DEFAULT_FORK_BLOCK: u64 = 14_000_000;

/// Environment variable naming the archive node the fork is reset from
pub const ARCHIVE_URL_ENV: &str = "FORK_ARCHIVE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Simulator connection
    pub fork: ForkSettings,

    /// Pinned contract and account addresses
    pub addresses: Addresses,

    /// Where the strategy contract comes from
    #[serde(default)]
    pub strategy: StrategySource,

    /// Hardhat artifact of the price-feed test double
    pub price_feed_artifact: Option<PathBuf>,

    /// Decimals of the borrowed asset
    #[serde(default = "default_borrow_decimals")]
    pub borrow_decimals: u8,

    /// Native-currency top-ups for impersonated accounts
    #[serde(default)]
    pub gas_funding: GasFunding,

    /// Amounts used by the full scenario
    #[serde(default)]
    pub plan: ScenarioPlan,
}

/// Simulator connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkSettings {
    /// Hardhat or Anvil
    pub simulator: Simulator,

    /// Simulator JSON-RPC endpoint
    pub rpc_url: String,

    /// Upstream archive node used when resetting the fork
    pub fork_url: Option<String>,

    /// Block the fork is pinned to
    pub fork_block: Option<u64>,
}

/// Pinned mainnet addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addresses {
    /// USDC (FiatTokenProxy)
    pub usdc: Address,
    /// USDC MasterMinter
    pub master_minter: Address,
    /// Owner of the MasterMinter, impersonated to mint
    pub master_minter_owner: Address,
    /// Compound cUSDC market (collateral)
    pub c_usdc: Address,
    /// Borrowed asset (UNI)
    pub borrow_token: Address,
    /// Compound market of the borrowed asset (cUNI)
    pub c_borrow_token: Address,
    /// Wrapped ether, used for DEX routing
    pub weth: Address,
    /// Compound Comptroller
    pub comptroller: Address,
    /// Price oracle; resolved through the comptroller when unset
    pub price_oracle: Option<Address>,
    /// Large holder of the borrowed asset, impersonated to move the market
    pub borrow_token_holder: Address,
}

/// Strategy contract source: an existing deployment or an artifact to deploy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategySource {
    pub address: Option<Address>,
    pub artifact: Option<PathBuf>,
}

impl StrategySource {
    /// Whether a strategy can be attached or deployed
    pub fn is_configured(&self) -> bool {
        self.address.is_some() || self.artifact.is_some()
    }
}

/// Gas funding for impersonated accounts, in whole ether
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasFunding {
    /// Accounts below this balance are topped up
    pub min_balance_eth: u64,
    /// Amount sent from the trader
    pub top_up_eth: u64,
}

/// Scenario amounts as decimal strings in whole token units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPlan {
    /// USDC minted to the trader
    pub mint: String,
    /// USDC supplied as collateral
    pub supply: String,
    /// Borrowed-asset amount of the short
    pub borrow: String,
    /// Borrowed-asset amount dumped on the DEX to depress the price
    pub market_sell: String,
    /// USD price forced through the oracle double
    pub override_price: Option<String>,
}

/// `ScenarioPlan` converted to base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanAmounts {
    pub mint: U256,
    pub supply: U256,
    pub borrow: U256,
    pub market_sell: U256,
    /// Compound-scaled price (`1e(36 - decimals)`)
    pub override_price: Option<U256>,
}

fn default_borrow_decimals() -> u8 {
    units::GOVERNANCE_DECIMALS
}

fn addr(hex: &str) -> Address {
    hex.parse().unwrap_or_default()
}

impl Default for GasFunding {
    fn default() -> Self {
        Self {
            min_balance_eth: 1,
            top_up_eth: 10,
        }
    }
}

impl Default for ScenarioPlan {
    fn default() -> Self {
        Self {
            mint: "1000000".to_string(),
            supply: "1000000".to_string(),
            borrow: "10000".to_string(),
            market_sell: "500000".to_string(),
            override_price: Some("7".to_string()),
        }
    }
}

impl ScenarioPlan {
    /// Convert the plan to base units
    pub fn amounts(&self, borrow_decimals: u8) -> ScenarioResult<PlanAmounts> {
        let price_decimals = 36u8.checked_sub(borrow_decimals).ok_or_else(|| {
            ScenarioError::Config(format!("Unsupported decimals {}", borrow_decimals))
        })?;

        Ok(PlanAmounts {
            mint: units::parse(&self.mint, units::USDC_DECIMALS)?,
            supply: units::parse(&self.supply, units::USDC_DECIMALS)?,
            borrow: units::parse(&self.borrow, borrow_decimals)?,
            market_sell: units::parse(&self.market_sell, borrow_decimals)?,
            override_price: self
                .override_price
                .as_deref()
                .map(|price| units::parse(price, price_decimals))
                .transpose()?,
        })
    }
}

impl Addresses {
    /// Mainnet deployments
    pub fn mainnet() -> Self {
        Self {
            usdc: addr("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            master_minter: addr("0xE982615d461DD5cD06575BbeA87624fda4e3de17"),
            master_minter_owner: addr("0xc1D9fe41d19dD52cb3Ae5d1d3B0030B5D498c704"),
            c_usdc: addr("0x39AA39c021dfbaE8faC545936693aC917d5E7563"),
            borrow_token: addr("0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984"),
            c_borrow_token: addr("0x35A18000230DA775CAc24873d00Ff85BccdeD550"),
            weth: addr("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            comptroller: addr("0x3d9819210A31b4961b30EF54bE2aeD79B9c9Cd3B"),
            price_oracle: None,
            // Uniswap governance timelock
            borrow_token_holder: addr("0x1a9C8182C09F50C8318d769245beA52c32BE35BC"),
        }
    }
}

impl ScenarioConfig {
    /// Mainnet fork on a local Hardhat node.
    ///
    /// The node is expected to be started at [`DEFAULT_FORK_BLOCK`]; resets
    /// need an archive URL, see [`ScenarioConfig::with_archive`].
    pub fn mainnet() -> Self {
        Self {
            fork: ForkSettings {
                simulator: Simulator::Hardhat,
                rpc_url: DEFAULT_RPC_URL.to_string(),
                fork_url: None,
                fork_block: None,
            },
            addresses: Addresses::mainnet(),
            strategy: StrategySource::default(),
            price_feed_artifact: None,
            borrow_decimals: default_borrow_decimals(),
            gas_funding: GasFunding::default(),
            plan: ScenarioPlan::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ScenarioResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ScenarioError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML
    pub fn from_toml_str(content: &str) -> ScenarioResult<Self> {
        let config: ScenarioConfig = toml::from_str(content)
            .map_err(|e| ScenarioError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reset the fork from the archive node at `url`, pinned to
    /// [`DEFAULT_FORK_BLOCK`] unless a block is already set
    pub fn with_archive(mut self, url: String) -> Self {
        self.fork.fork_url = Some(url);
        self.fork.fork_block.get_or_insert(DEFAULT_FORK_BLOCK);
        self
    }

    /// Apply `FORK_RPC_URL` and `FORK_ARCHIVE_URL` if they are set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            self.fork.rpc_url = url;
        }
        if let Ok(url) = std::env::var(ARCHIVE_URL_ENV) {
            self = self.with_archive(url);
        }
        self
    }

    /// Client configuration for the simulator
    pub fn fork_config(&self) -> ScenarioResult<ForkConfig> {
        let mut config = ForkConfig::custom(self.fork.simulator, self.fork.rpc_url.clone())?;
        config.fork_url = self.fork.fork_url.clone();
        config.fork_block = self.fork.fork_block;
        Ok(config)
    }

    /// Resolved scenario amounts
    pub fn plan_amounts(&self) -> ScenarioResult<PlanAmounts> {
        self.plan.amounts(self.borrow_decimals)
    }

    /// Check that the full scenario can run to the end with this
    /// configuration alone
    pub fn validate_run(&self) -> ScenarioResult<()> {
        if !self.strategy.is_configured() {
            return Err(ScenarioError::Config(
                "No strategy address or artifact configured".to_string(),
            ));
        }
        if self.plan.override_price.is_some() && self.price_feed_artifact.is_none() {
            return Err(ScenarioError::Config(
                "Price override planned but no price feed artifact configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ScenarioResult<()> {
        self.fork_config()?.validate()?;
        self.plan_amounts()?;

        if self.gas_funding.top_up_eth == 0 {
            return Err(ScenarioError::Config(
                "Gas top-up must be greater than 0".to_string(),
            ));
        }
        if self.addresses.borrow_token_holder.is_zero() {
            return Err(ScenarioError::Config(
                "Borrowed-asset holder address is required".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_defaults() {
        let config = ScenarioConfig::mainnet();
        assert_eq!(config.fork.fork_url, None);
        assert_eq!(config.fork.fork_block, None);
        assert_eq!(
            config.addresses.usdc,
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse::<Address>().unwrap()
        );
        assert!(!config.addresses.master_minter_owner.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plan_amounts() {
        let amounts = ScenarioPlan::default().amounts(18).unwrap();
        assert_eq!(amounts.mint, units::whole(1_000_000, units::USDC_DECIMALS));
        assert_eq!(amounts.borrow, units::whole(10_000, 18));
        assert_eq!(amounts.override_price, Some(units::whole(7, 18)));
    }

    #[test]
    fn test_price_scale_follows_decimals() {
        let plan = ScenarioPlan {
            override_price: Some("1".to_string()),
            ..ScenarioPlan::default()
        };
        let amounts = plan.amounts(8).unwrap();
        assert_eq!(amounts.override_price, Some(U256::exp10(28)));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            price_feed_artifact = "artifacts/MockPriceFeed.json"

            [fork]
            simulator = "anvil"
            rpc_url = "http://127.0.0.1:8545"
            fork_url = "https://archive.example"
            fork_block = 14000000

            [addresses]
            usdc = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
            master_minter = "0xE982615d461DD5cD06575BbeA87624fda4e3de17"
            master_minter_owner = "0xc1D9fe41d19dD52cb3Ae5d1d3B0030B5D498c704"
            c_usdc = "0x39AA39c021dfbaE8faC545936693aC917d5E7563"
            borrow_token = "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984"
            c_borrow_token = "0x35A18000230DA775CAc24873d00Ff85BccdeD550"
            weth = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
            comptroller = "0x3d9819210A31b4961b30EF54bE2aeD79B9c9Cd3B"
            borrow_token_holder = "0x1a9C8182C09F50C8318d769245beA52c32BE35BC"

            [strategy]
            artifact = "artifacts/CompoundShort.json"

            [plan]
            mint = "500"
            supply = "500"
            borrow = "10"
            market_sell = "1000"
        "#;

        let config = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.fork.simulator, Simulator::Anvil);
        assert_eq!(config.borrow_decimals, 18);
        assert_eq!(config.gas_funding.top_up_eth, 10);
        assert!(config.strategy.address.is_none());
        assert!(config.plan.override_price.is_none());

        let amounts = config.plan_amounts().unwrap();
        assert_eq!(amounts.mint, U256::from(500_000_000u64));

        let fork = config.fork_config().unwrap();
        assert_eq!(fork.simulator, Simulator::Anvil);
        assert_eq!(fork.fork_block, Some(14_000_000));
    }

    #[test]
    fn test_with_archive_pins_default_block() {
        let config = ScenarioConfig::mainnet().with_archive("https://archive.example".to_string());
        assert_eq!(config.fork.fork_block, Some(DEFAULT_FORK_BLOCK));
        assert!(config.validate().is_ok());

        let fork = config.fork_config().unwrap();
        assert_eq!(fork.fork_url.as_deref(), Some("https://archive.example"));
    }

    #[test]
    fn test_pinned_block_requires_archive_on_hardhat() {
        let mut config = ScenarioConfig::mainnet();
        config.fork.fork_block = Some(DEFAULT_FORK_BLOCK);
        assert!(matches!(config.validate(), Err(ScenarioError::Fork(_))));

        config.fork.simulator = Simulator::Anvil;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_run_requires_strategy() {
        let mut config = ScenarioConfig::mainnet();
        config.price_feed_artifact = Some(PathBuf::from("artifacts/MockPriceFeed.json"));
        assert!(matches!(config.validate_run(), Err(ScenarioError::Config(_))));

        config.strategy.artifact = Some(PathBuf::from("artifacts/CompoundShort.json"));
        assert!(config.validate_run().is_ok());
    }

    #[test]
    fn test_validate_run_requires_price_feed_for_override() {
        let mut config = ScenarioConfig::mainnet();
        config.strategy.address = Some(Address::repeat_byte(0x57));
        assert!(matches!(config.validate_run(), Err(ScenarioError::Config(_))));

        config.plan.override_price = None;
        assert!(config.validate_run().is_ok());
    }

    #[test]
    fn test_invalid_plan_rejected() {
        let mut config = ScenarioConfig::mainnet();
        config.plan.borrow = "ten".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScenarioConfig::from_file("/nonexistent/scenario.toml"),
            Err(ScenarioError::Config(_))
        ));
    }
}
