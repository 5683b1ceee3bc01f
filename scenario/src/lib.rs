//! Forked-mainnet scenario for a Compound short-selling strategy.
//!
//! The runner mints USDC through the real MasterMinter by impersonating its
//! owner, supplies it as collateral to the strategy, borrows UNI, pushes the
//! market price down and swaps the live price oracle for a test double before
//! closing the position. All of it runs against a local Hardhat or Anvil fork
//! through [`compound_fork_client`].
//!
//! ```rust,no_run
//! use compound_short::{ScenarioConfig, ScenarioRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     compound_short::init_tracing();
//!
//!     let config = ScenarioConfig::mainnet().with_env_overrides();
//!     let mut runner = ScenarioRunner::connect(config).await?;
//!     runner.run_configured().await?;
//!     println!("{}", runner.report().to_json()?);
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod contracts;
pub mod error;
pub mod report;
pub mod runner;
pub mod units;

pub use artifact::ContractArtifact;
pub use config::*;
pub use error::{ScenarioError, ScenarioResult};
pub use report::{BalanceSnapshot, ScenarioReport, Step, StepOutcome, StepRecord};
pub use runner::{Position, ScenarioRunner};

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
