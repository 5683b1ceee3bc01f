//! Error types for the short-selling scenario
use compound_fork_client::{Address, ForkError, U256};
use thiserror::Error;

/// Main error type for scenario operations
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// A privileged account could not be unlocked by the simulator
    #[error("Impersonation of {address:?} failed: {reason}")]
    Impersonation { address: Address, reason: String },

    /// The stable token refused to mint (minter not configured or allowance exceeded)
    #[error("Mint authority error: {0}")]
    MintAuthority(String),

    /// A token transfer or pull exceeded a balance or allowance
    #[error("Insufficient allowance or balance: {0}")]
    InsufficientAllowance(String),

    /// The strategy refused the collateral amount
    #[error("Collateral rejected: {0}")]
    CollateralRejected(String),

    /// Requested borrow value exceeds the account's borrowing capacity
    #[error("Undercollateralized: borrow value {requested_value} exceeds liquidity {liquidity}")]
    Undercollateralized { requested_value: U256, liquidity: U256 },

    /// The lending protocol reverted the borrow
    #[error("Borrow rejected: {0}")]
    BorrowRejected(String),

    /// The DEX leg of the strategy refused the market sell
    #[error("Market sell rejected: {0}")]
    SellRejected(String),

    /// The strategy reverted while repaying the debt or redeeming collateral
    #[error("Repay rejected: {0}")]
    RepayRejected(String),

    /// The price feed double refused the new price
    #[error("Price override rejected: {0}")]
    PriceOverrideRejected(String),

    /// Repay returned success but the position was not unwound
    #[error("Redeem incomplete: {remaining_debt} debt and {remaining_collateral} collateral left")]
    RedeemIncomplete {
        remaining_debt: U256,
        remaining_collateral: U256,
    },

    /// A balance or price read back after a step did not match
    #[error("Post-condition failed for {what}: expected {expected}, got {actual}")]
    PostCondition {
        what: String,
        expected: U256,
        actual: U256,
    },

    /// Lending protocol returned a non-zero error code
    #[error("Lending protocol error: {0}")]
    Protocol(String),

    /// Amount argument is invalid
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Strategy contract has not been deployed or attached
    #[error("Strategy contract not deployed")]
    StrategyNotDeployed,

    /// Simulator error
    #[error("Fork error: {0}")]
    Fork(ForkError),

    /// ABI encoding/decoding error
    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    /// Human-readable ABI parse error
    #[error("ABI parse error: {0}")]
    AbiParse(#[from] ethers::abi::ParseError),

    /// Unit conversion error
    #[error("Unit conversion error: {0}")]
    Units(#[from] ethers::utils::ConversionError),

    /// Artifact file could not be read
    #[error("Artifact error: {0}")]
    Artifact(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ForkError> for ScenarioError {
    fn from(err: ForkError) -> Self {
        match err {
            ForkError::ImpersonationFailed { address, reason } => {
                ScenarioError::Impersonation { address, reason }
            }
            other => ScenarioError::Fork(other),
        }
    }
}

impl ScenarioError {
    /// Map a reverted or status-0 transaction onto a domain error, passing
    /// other failures through.
    pub fn on_revert(err: ForkError, map: impl FnOnce(String) -> ScenarioError) -> Self {
        match err {
            ForkError::TransactionReverted { reason } => map(reason),
            ForkError::TransactionFailed(hash) => {
                map(format!("transaction {:?} failed on-chain", hash))
            }
            other => other.into(),
        }
    }
}

/// Result type alias for scenario operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;
