use super::ContractBinding;
use crate::error::{ScenarioError, ScenarioResult};
use compound_fork_client::{Address, ForkClient, SubmittedTx, U256};
use ethers::abi::Token;

const SHORT_STRATEGY_ABI: &[&str] = &[
    "function supply(uint256)",
    "function borrow(uint256)",
    "function sell(uint256)",
    "function repay()",
    "function supplied() view returns (uint256)",
    "function borrowBalance() view returns (uint256)",
];

/// The short-selling strategy contract.
///
/// It supplies stablecoin collateral to one Compound market, borrows from
/// another, sells through a DEX pool and repays/redeems on close.
#[derive(Debug, Clone)]
pub struct ShortStrategy {
    binding: ContractBinding,
}

impl ShortStrategy {
    pub fn new(address: Address) -> ScenarioResult<Self> {
        Ok(Self {
            binding: ContractBinding::new(address, SHORT_STRATEGY_ABI)?,
        })
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    /// ABI-encoded constructor arguments appended to the creation bytecode
    pub fn constructor_args(
        collateral_c_token: Address,
        borrow_c_token: Address,
        weth: Address,
        borrow_decimals: u8,
    ) -> Vec<u8> {
        // constructor(address,address,address,uint8)
        ethers::abi::encode(&[
            Token::Address(collateral_c_token),
            Token::Address(borrow_c_token),
            Token::Address(weth),
            Token::Uint(U256::from(borrow_decimals)),
        ])
    }

    /// Pull `amount` collateral from `from` (after approval) and supply it
    pub async fn supply(
        &self,
        client: &ForkClient,
        from: Address,
        amount: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                from,
                "supply",
                &[Token::Uint(amount)],
                ScenarioError::CollateralRejected,
            )
            .await
    }

    /// Borrow `amount` of the shorted asset to `from`
    pub async fn borrow(
        &self,
        client: &ForkClient,
        from: Address,
        amount: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                from,
                "borrow",
                &[Token::Uint(amount)],
                ScenarioError::BorrowRejected,
            )
            .await
    }

    /// Sell `amount` of the shorted asset into the DEX pool
    pub async fn sell(
        &self,
        client: &ForkClient,
        from: Address,
        amount: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                from,
                "sell",
                &[Token::Uint(amount)],
                ScenarioError::SellRejected,
            )
            .await
    }

    /// Repay the debt and redeem the collateral
    pub async fn repay(&self, client: &ForkClient, from: Address) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(client, from, "repay", &[], ScenarioError::RepayRejected)
            .await
    }

    pub async fn supplied(&self, client: &ForkClient) -> ScenarioResult<U256> {
        self.binding.read_uint(client, "supplied", &[]).await
    }

    pub async fn borrow_balance(&self, client: &ForkClient) -> ScenarioResult<U256> {
        self.binding.read_uint(client, "borrowBalance", &[]).await
    }
}
