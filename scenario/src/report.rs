//! Per-step record of a scenario run
use crate::error::ScenarioResult;
use chrono::{DateTime, Utc};
use compound_fork_client::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scenario operations, in script order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ResetFork,
    DeployStrategy,
    MintStableToken,
    FundPosition,
    OpenShort,
    ShiftMarketPrice,
    OverridePriceFeed,
    ClosePosition,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ResetFork => "reset_fork",
            Step::DeployStrategy => "deploy_strategy",
            Step::MintStableToken => "mint_stable_token",
            Step::FundPosition => "fund_position",
            Step::OpenShort => "open_short",
            Step::ShiftMarketPrice => "shift_market_price",
            Step::OverridePriceFeed => "override_price_feed",
            Step::ClosePosition => "close_position",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tx_hashes: Vec<TxHash>,
    pub outcome: StepOutcome,
}

/// Trader balances and strategy position at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub trader: Address,
    pub native: U256,
    pub stable_token: U256,
    pub borrowed_asset: U256,
    /// `None` when no strategy is attached
    pub supplied: Option<U256>,
    pub borrowed: Option<U256>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balances: Option<BalanceSnapshot>,
}

impl ScenarioReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the outcome of one operation
    pub fn record<T>(
        &mut self,
        step: Step,
        started_at: DateTime<Utc>,
        tx_hashes: Vec<TxHash>,
        result: &ScenarioResult<T>,
    ) {
        let outcome = match result {
            Ok(_) => StepOutcome::Succeeded,
            Err(e) => StepOutcome::Failed {
                error: e.to_string(),
            },
        };

        self.steps.push(StepRecord {
            step,
            started_at,
            finished_at: Utc::now(),
            tx_hashes,
            outcome,
        });
    }

    /// True when every recorded step succeeded
    pub fn succeeded(&self) -> bool {
        self.steps
            .iter()
            .all(|s| s.outcome == StepOutcome::Succeeded)
    }

    /// First failed step, if any
    pub fn first_failure(&self) -> Option<&StepRecord> {
        self.steps
            .iter()
            .find(|s| s.outcome != StepOutcome::Succeeded)
    }

    pub fn to_json(&self) -> ScenarioResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
