//! Run the full short scenario against a local fork.
//!
//! ```text
//! npx hardhat node --fork $ARCHIVE_URL --fork-block-number 14000000
//! cargo run -p compound-short --example short_scenario -- scenario.toml
//! ```
//!
//! The config file must name a strategy and, when the plan overrides the
//! price, a price feed artifact; the bare mainnet defaults name neither and
//! are refused before connecting. `FORK_RPC_URL` overrides the simulator
//! endpoint and `FORK_ARCHIVE_URL` the archive node used for resets.

use anyhow::Context;
use compound_short::{ScenarioConfig, ScenarioRunner};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    compound_short::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => ScenarioConfig::from_file(&path)
            .with_context(|| format!("loading {}", path))?,
        None => ScenarioConfig::mainnet(),
    }
    .with_env_overrides();
    config
        .validate_run()
        .context("the configured plan cannot run to completion")?;

    info!("Connecting to {}", config.fork.rpc_url);
    let mut runner = ScenarioRunner::connect(config)
        .await
        .context("connecting to the fork simulator")?;

    let outcome = runner.run_configured().await;
    println!("{}", runner.report().to_json()?);

    if let Err(e) = outcome {
        error!("Scenario stopped: {}", e);
        return Err(e.into());
    }

    info!("Scenario completed");
    Ok(())
}
