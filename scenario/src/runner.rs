//! Scenario runner.
//!
//! Drives the short position through its lifecycle on a mainnet fork: mint
//! stablecoin collateral, fund the strategy, borrow the shorted asset, move
//! the market, override the price feed, then close. Every operation is
//! recorded in a [`ScenarioReport`] whether it succeeds or not.

use crate::artifact::ContractArtifact;
use crate::config::{PlanAmounts, ScenarioConfig};
use crate::contracts::{Comptroller, Erc20, FiatToken, MasterMinter, PriceOracle, ShortStrategy};
use crate::error::{ScenarioError, ScenarioResult};
use crate::report::{BalanceSnapshot, ScenarioReport, Step};
use crate::units;
use chrono::Utc;
use compound_fork_client::{
    types::ether, Address, ForkClient, ForkError, TransactionRequest, TxHash, U256,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collateral and debt held by the strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Stablecoin supplied as collateral
    pub supplied: U256,
    /// Outstanding borrow of the shorted asset, interest included
    pub borrowed: U256,
}

/// Runs the short-selling scenario against a fork simulator
pub struct ScenarioRunner {
    client: ForkClient,
    config: ScenarioConfig,
    trader: Address,
    usdc: FiatToken,
    master_minter: MasterMinter,
    borrow_token: Erc20,
    comptroller: Comptroller,
    oracle: PriceOracle,
    strategy: Option<ShortStrategy>,
    price_feed: Option<ContractArtifact>,
    report: ScenarioReport,
}

impl ScenarioRunner {
    /// Connect to the simulator and bind the scenario's contracts.
    ///
    /// The trader is the simulator's first unlocked account. When no price
    /// oracle is configured it is looked up through the comptroller.
    pub async fn connect(config: ScenarioConfig) -> ScenarioResult<Self> {
        config.validate()?;

        let client = ForkClient::new(Arc::new(config.fork_config()?))?;
        client.health_check().await?;

        let trader = client
            .rpc()
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ScenarioError::Config("Simulator exposes no unlocked accounts".to_string())
            })?;

        let addresses = &config.addresses;
        let comptroller = Comptroller::new(addresses.comptroller)?;
        let oracle_address = match addresses.price_oracle {
            Some(address) => address,
            None => comptroller.oracle(&client).await?,
        };

        let strategy = config
            .strategy
            .address
            .map(ShortStrategy::new)
            .transpose()?;
        let price_feed = config
            .price_feed_artifact
            .as_ref()
            .map(ContractArtifact::from_file)
            .transpose()?;

        info!(
            "Scenario connected: trader {:?}, oracle {:?}, strategy {:?}",
            trader,
            oracle_address,
            strategy.as_ref().map(ShortStrategy::address)
        );

        Ok(Self {
            usdc: FiatToken::new(addresses.usdc)?,
            master_minter: MasterMinter::new(addresses.master_minter)?,
            borrow_token: Erc20::new(addresses.borrow_token)?,
            oracle: PriceOracle::new(oracle_address)?,
            comptroller,
            client,
            config,
            trader,
            strategy,
            price_feed,
            report: ScenarioReport::new(),
        })
    }

    /// Use `artifact` as the price feed test double
    pub fn with_price_feed(mut self, artifact: ContractArtifact) -> Self {
        self.price_feed = Some(artifact);
        self
    }

    pub fn client(&self) -> &ForkClient {
        &self.client
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Account that holds the position
    pub fn trader(&self) -> Address {
        self.trader
    }

    pub fn strategy_address(&self) -> Option<Address> {
        self.strategy.as_ref().map(ShortStrategy::address)
    }

    pub fn report(&self) -> &ScenarioReport {
        &self.report
    }

    pub fn into_report(self) -> ScenarioReport {
        self.report
    }

    /// Use an already deployed strategy
    pub fn attach_strategy(&mut self, address: Address) -> ScenarioResult<()> {
        self.strategy = Some(ShortStrategy::new(address)?);
        Ok(())
    }

    fn strategy(&self) -> ScenarioResult<&ShortStrategy> {
        self.strategy.as_ref().ok_or(ScenarioError::StrategyNotDeployed)
    }

    /// Return the simulator to the pinned fork block.
    ///
    /// A strategy deployed by this runner does not survive the reset.
    pub async fn reset_fork(&mut self) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let result = self.reset_fork_inner().await;
        self.report
            .record(Step::ResetFork, started_at, Vec::new(), &result);
        result
    }

    async fn reset_fork_inner(&mut self) -> ScenarioResult<()> {
        self.client.reset_fork().await?;
        self.strategy = self
            .config
            .strategy
            .address
            .map(ShortStrategy::new)
            .transpose()?;
        Ok(())
    }

    /// Deploy the strategy from the configured artifact
    pub async fn deploy_strategy(&mut self) -> ScenarioResult<Address> {
        let path = self.config.strategy.artifact.clone().ok_or_else(|| {
            ScenarioError::Config("No strategy address or artifact configured".to_string())
        })?;
        let artifact = ContractArtifact::from_file(path)?;
        self.deploy_strategy_from(&artifact).await
    }

    /// Deploy the strategy from a compiled artifact
    pub async fn deploy_strategy_from(
        &mut self,
        artifact: &ContractArtifact,
    ) -> ScenarioResult<Address> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.deploy_strategy_inner(artifact, &mut txs).await;
        self.report
            .record(Step::DeployStrategy, started_at, txs, &result);
        result
    }

    async fn deploy_strategy_inner(
        &mut self,
        artifact: &ContractArtifact,
        txs: &mut Vec<TxHash>,
    ) -> ScenarioResult<Address> {
        let addresses = &self.config.addresses;
        let args = ShortStrategy::constructor_args(
            addresses.c_usdc,
            addresses.c_borrow_token,
            addresses.weth,
            self.config.borrow_decimals,
        );

        info!("Deploying {}", artifact.contract_name);
        let tx = TransactionRequest::new()
            .from(self.trader)
            .data(artifact.deployment_data(&args));
        let submitted = self.client.submit(tx).await?;
        txs.push(submitted.hash);

        let address = submitted
            .receipt
            .and_then(|receipt| receipt.contract_address)
            .ok_or_else(|| {
                ForkError::InvalidResponse(format!(
                    "Deployment {:?} has no contract address",
                    submitted.hash
                ))
            })?;

        info!("{} deployed at {:?}", artifact.contract_name, address);
        self.strategy = Some(ShortStrategy::new(address)?);
        Ok(address)
    }

    /// Mint `amount` USDC (base units) to the trader.
    ///
    /// Impersonates the MasterMinter owner, appoints it as its own controller
    /// and minter with an allowance of exactly `amount`, then mints.
    pub async fn mint_stable_token(&mut self, amount: U256) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.mint_stable_token_inner(amount, &mut txs).await;
        self.report
            .record(Step::MintStableToken, started_at, txs, &result);
        result
    }

    async fn mint_stable_token_inner(
        &self,
        amount: U256,
        txs: &mut Vec<TxHash>,
    ) -> ScenarioResult<()> {
        require_positive("mint", amount)?;
        let owner = self.config.addresses.master_minter_owner;

        info!(
            "Minting {} USDC to {:?}",
            units::format(amount, units::USDC_DECIMALS)?,
            self.trader
        );
        let before = self.usdc.erc20().balance_of(&self.client, self.trader).await?;

        self.client.rpc().impersonate_account(owner).await?;
        self.ensure_gas(owner, txs).await?;

        txs.push(
            self.master_minter
                .configure_controller(&self.client, owner, owner, owner)
                .await?
                .hash,
        );
        txs.push(
            self.master_minter
                .configure_minter(&self.client, owner, amount)
                .await?
                .hash,
        );
        txs.push(
            self.usdc
                .mint(&self.client, owner, self.trader, amount)
                .await?
                .hash,
        );

        self.client.rpc().stop_impersonating_account(owner).await?;

        let after = self.usdc.erc20().balance_of(&self.client, self.trader).await?;
        expect_change("trader USDC balance", before, after, amount, true)
    }

    /// Approve and supply `amount` USDC as strategy collateral
    pub async fn fund_position(&mut self, amount: U256) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.fund_position_inner(amount, &mut txs).await;
        self.report
            .record(Step::FundPosition, started_at, txs, &result);
        result
    }

    async fn fund_position_inner(&self, amount: U256, txs: &mut Vec<TxHash>) -> ScenarioResult<()> {
        require_positive("supply", amount)?;
        let strategy = self.strategy()?;

        info!(
            "Supplying {} USDC collateral",
            units::format(amount, units::USDC_DECIMALS)?
        );
        let before = strategy.supplied(&self.client).await?;

        txs.push(
            self.usdc
                .erc20()
                .approve(&self.client, self.trader, strategy.address(), amount)
                .await?
                .hash,
        );
        txs.push(strategy.supply(&self.client, self.trader, amount).await?.hash);

        let after = strategy.supplied(&self.client).await?;
        expect_change("supplied collateral", before, after, amount, true)
    }

    /// Borrow `amount` of the shorted asset against the supplied collateral.
    ///
    /// Fails with [`ScenarioError::Undercollateralized`] before submitting
    /// when the borrow value exceeds the account's liquidity.
    pub async fn open_short(&mut self, amount: U256) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.open_short_inner(amount, &mut txs).await;
        self.report.record(Step::OpenShort, started_at, txs, &result);
        result
    }

    async fn open_short_inner(&self, amount: U256, txs: &mut Vec<TxHash>) -> ScenarioResult<()> {
        require_positive("borrow", amount)?;
        let strategy = self.strategy()?;

        let liquidity = self
            .comptroller
            .account_liquidity(&self.client, strategy.address())
            .await?;
        let requested_value = units::usd_value(amount, self.oracle_price().await?);
        if !liquidity.shortfall.is_zero() || requested_value > liquidity.liquidity {
            warn!(
                "Borrow value {} exceeds liquidity {} (shortfall {})",
                requested_value, liquidity.liquidity, liquidity.shortfall
            );
            return Err(ScenarioError::Undercollateralized {
                requested_value,
                liquidity: liquidity.liquidity,
            });
        }

        info!(
            "Borrowing {} of {:?}",
            units::format(amount, self.config.borrow_decimals)?,
            self.borrow_token.address()
        );
        let before = self.borrow_token.balance_of(&self.client, self.trader).await?;

        txs.push(strategy.borrow(&self.client, self.trader, amount).await?.hash);

        let after = self.borrow_token.balance_of(&self.client, self.trader).await?;
        expect_change("trader borrowed-asset balance", before, after, amount, true)
    }

    /// Push the borrowed asset's market price down.
    ///
    /// Moves `amount` from the configured holder to the trader, then sells
    /// it through the strategy's DEX route.
    pub async fn shift_market_price(&mut self, amount: U256) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.shift_market_price_inner(amount, &mut txs).await;
        self.report
            .record(Step::ShiftMarketPrice, started_at, txs, &result);
        result
    }

    async fn shift_market_price_inner(
        &self,
        amount: U256,
        txs: &mut Vec<TxHash>,
    ) -> ScenarioResult<()> {
        require_positive("market sell", amount)?;
        let strategy = self.strategy()?;
        let holder = self.config.addresses.borrow_token_holder;

        self.client.rpc().impersonate_account(holder).await?;
        self.ensure_gas(holder, txs).await?;
        txs.push(
            self.borrow_token
                .transfer(&self.client, holder, self.trader, amount)
                .await?
                .hash,
        );
        self.client.rpc().stop_impersonating_account(holder).await?;

        info!(
            "Selling {} into the market",
            units::format(amount, self.config.borrow_decimals)?
        );
        let before = self.borrow_token.balance_of(&self.client, self.trader).await?;

        txs.push(
            self.borrow_token
                .approve(&self.client, self.trader, strategy.address(), amount)
                .await?
                .hash,
        );
        txs.push(strategy.sell(&self.client, self.trader, amount).await?.hash);

        let after = self.borrow_token.balance_of(&self.client, self.trader).await?;
        expect_change("trader borrowed-asset balance", before, after, amount, false)
    }

    /// Replace the live oracle with the test double and set the borrowed
    /// asset's price to `price` (Compound scale).
    pub async fn override_price_feed(&mut self, price: U256) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.override_price_feed_inner(price, &mut txs).await;
        self.report
            .record(Step::OverridePriceFeed, started_at, txs, &result);
        result
    }

    async fn override_price_feed_inner(
        &self,
        price: U256,
        txs: &mut Vec<TxHash>,
    ) -> ScenarioResult<()> {
        let artifact = self.price_feed.as_ref().ok_or_else(|| {
            ScenarioError::Config("No price feed artifact configured".to_string())
        })?;
        let c_token = self.config.addresses.c_borrow_token;

        info!(
            "Injecting {} at oracle {:?}",
            artifact.contract_name,
            self.oracle.address()
        );
        self.client
            .rpc()
            .set_code(self.oracle.address(), &artifact.deployed_bytecode)
            .await?;

        txs.push(
            self.oracle
                .set_underlying_price(&self.client, self.trader, c_token, price)
                .await?
                .hash,
        );

        let reported = self.oracle.underlying_price(&self.client, c_token).await?;
        if reported != price {
            return Err(ScenarioError::PostCondition {
                what: "oracle price".to_string(),
                expected: price,
                actual: reported,
            });
        }
        info!("Oracle now reports {} for {:?}", reported, c_token);
        Ok(())
    }

    /// Repay the debt and redeem the collateral.
    ///
    /// Fails with [`ScenarioError::RedeemIncomplete`] when the repay call
    /// succeeds but leaves debt or collateral behind.
    pub async fn close_position(&mut self) -> ScenarioResult<()> {
        let started_at = Utc::now();
        let mut txs = Vec::new();
        let result = self.close_position_inner(&mut txs).await;
        self.report
            .record(Step::ClosePosition, started_at, txs, &result);
        result
    }

    async fn close_position_inner(&self, txs: &mut Vec<TxHash>) -> ScenarioResult<()> {
        let strategy = self.strategy()?;
        let debt = strategy.borrow_balance(&self.client).await?;

        info!(
            "Closing position with {} debt outstanding",
            units::format(debt, self.config.borrow_decimals)?
        );

        // Debt accrues interest every block until repay executes
        if !debt.is_zero() {
            txs.push(
                self.borrow_token
                    .approve(&self.client, self.trader, strategy.address(), U256::MAX)
                    .await?
                    .hash,
            );
        }
        txs.push(strategy.repay(&self.client, self.trader).await?.hash);

        let position = self.position().await?;
        if !position.borrowed.is_zero() || !position.supplied.is_zero() {
            warn!(
                "Position not unwound: {} debt, {} collateral",
                position.borrowed, position.supplied
            );
            return Err(ScenarioError::RedeemIncomplete {
                remaining_debt: position.borrowed,
                remaining_collateral: position.supplied,
            });
        }
        Ok(())
    }

    /// Run the whole scenario, stopping at the first failing step.
    ///
    /// The strategy is deployed first when none is attached. A run that
    /// could not reach the end is refused before any transaction is sent.
    /// Final balances are captured in the report whether or not the steps
    /// succeeded.
    pub async fn run(&mut self, plan: &PlanAmounts) -> ScenarioResult<()> {
        self.check_runnable(plan)?;

        let result = self.run_steps(plan).await;
        match self.balances().await {
            Ok(snapshot) => self.report.balances = Some(snapshot),
            Err(e) => warn!("Could not read final balances: {}", e),
        }
        result
    }

    fn check_runnable(&self, plan: &PlanAmounts) -> ScenarioResult<()> {
        if self.strategy.is_none() && self.config.strategy.artifact.is_none() {
            return Err(ScenarioError::Config(
                "No strategy address or artifact configured".to_string(),
            ));
        }
        if plan.override_price.is_some() && self.price_feed.is_none() {
            return Err(ScenarioError::Config(
                "Price override planned but no price feed artifact configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn run_steps(&mut self, plan: &PlanAmounts) -> ScenarioResult<()> {
        if self.strategy.is_none() {
            self.deploy_strategy().await?;
        }

        self.mint_stable_token(plan.mint).await?;
        self.fund_position(plan.supply).await?;
        self.open_short(plan.borrow).await?;
        self.shift_market_price(plan.market_sell).await?;
        if let Some(price) = plan.override_price {
            self.override_price_feed(price).await?;
        }
        self.close_position().await
    }

    /// Run the scenario with the configured plan
    pub async fn run_configured(&mut self) -> ScenarioResult<()> {
        let plan = self.config.plan_amounts()?;
        self.run(&plan).await
    }

    /// Balance of `holder` in `token`
    pub async fn token_balance(&self, token: Address, holder: Address) -> ScenarioResult<U256> {
        Erc20::new(token)?.balance_of(&self.client, holder).await
    }

    /// Oracle price of the borrowed asset, Compound scale
    pub async fn oracle_price(&self) -> ScenarioResult<U256> {
        self.oracle
            .underlying_price(&self.client, self.config.addresses.c_borrow_token)
            .await
    }

    /// Strategy collateral and debt
    pub async fn position(&self) -> ScenarioResult<Position> {
        let strategy = self.strategy()?;
        Ok(Position {
            supplied: strategy.supplied(&self.client).await?,
            borrowed: strategy.borrow_balance(&self.client).await?,
        })
    }

    /// Trader balances and, when a strategy is attached, its position
    pub async fn balances(&self) -> ScenarioResult<BalanceSnapshot> {
        let position = match self.strategy {
            Some(_) => Some(self.position().await?),
            None => None,
        };

        Ok(BalanceSnapshot {
            trader: self.trader,
            native: self.client.rpc().get_balance(self.trader).await?,
            stable_token: self
                .usdc
                .erc20()
                .balance_of(&self.client, self.trader)
                .await?,
            borrowed_asset: self
                .borrow_token
                .balance_of(&self.client, self.trader)
                .await?,
            supplied: position.map(|p| p.supplied),
            borrowed: position.map(|p| p.borrowed),
        })
    }

    /// Largest additional borrow (base units) the strategy's collateral allows
    pub async fn borrow_capacity(&self) -> ScenarioResult<U256> {
        let strategy = self.strategy()?;
        let liquidity = self
            .comptroller
            .account_liquidity(&self.client, strategy.address())
            .await?;
        let price = self.oracle_price().await?;
        if price.is_zero() {
            return Err(ScenarioError::Protocol(
                "Oracle has no price for the borrowed asset".to_string(),
            ));
        }
        Ok(liquidity.liquidity * U256::exp10(18) / price)
    }

    /// Top up `account` from the trader when it is short of gas money
    async fn ensure_gas(&self, account: Address, txs: &mut Vec<TxHash>) -> ScenarioResult<()> {
        let funding = &self.config.gas_funding;
        let balance = self.client.rpc().get_balance(account).await?;
        if balance >= ether(funding.min_balance_eth) {
            debug!("{:?} holds {} wei, no top-up needed", account, balance);
            return Ok(());
        }

        info!("Funding {:?} with {} ETH for gas", account, funding.top_up_eth);
        let tx = TransactionRequest::new()
            .from(self.trader)
            .to(account)
            .value(ether(funding.top_up_eth));
        txs.push(self.client.submit(tx).await?.hash);
        Ok(())
    }
}

fn require_positive(what: &str, amount: U256) -> ScenarioResult<()> {
    if amount.is_zero() {
        return Err(ScenarioError::InvalidAmount(format!(
            "{} amount must be greater than 0",
            what
        )));
    }
    Ok(())
}

/// Check that `after` moved from `before` by exactly `delta`
fn expect_change(
    what: &str,
    before: U256,
    after: U256,
    delta: U256,
    increase: bool,
) -> ScenarioResult<()> {
    let expected = if increase {
        before.checked_add(delta)
    } else {
        before.checked_sub(delta)
    };

    match expected {
        Some(expected) if expected == after => Ok(()),
        expected => Err(ScenarioError::PostCondition {
            what: what.to_string(),
            expected: expected.unwrap_or_default(),
            actual: after,
        }),
    }
}
