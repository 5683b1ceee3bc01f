use super::{first_uint, ContractBinding};
use crate::error::{ScenarioError, ScenarioResult};
use compound_fork_client::{Address, ForkClient, SubmittedTx, U256};
use ethers::abi::Token;

const COMPTROLLER_ABI: &[&str] = &[
    "function getAccountLiquidity(address) view returns (uint256,uint256,uint256)",
    "function oracle() view returns (address)",
];

// Compound's PriceOracle read interface plus the setter of the test double
// injected over the live oracle's code.
const PRICE_ORACLE_ABI: &[&str] = &[
    "function getUnderlyingPrice(address) view returns (uint256)",
    "function setUnderlyingPrice(address,uint256)",
];

/// Result of `Comptroller.getAccountLiquidity`, USD values scaled by 1e18
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountLiquidity {
    pub liquidity: U256,
    pub shortfall: U256,
}

/// Compound Comptroller (risk model)
#[derive(Debug, Clone)]
pub struct Comptroller {
    binding: ContractBinding,
}

impl Comptroller {
    pub fn new(address: Address) -> ScenarioResult<Self> {
        Ok(Self {
            binding: ContractBinding::new(address, COMPTROLLER_ABI)?,
        })
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    /// Excess collateral value (or shortfall) of `account`.
    ///
    /// Compound reports failures as a non-zero error code instead of reverting.
    pub async fn account_liquidity(
        &self,
        client: &ForkClient,
        account: Address,
    ) -> ScenarioResult<AccountLiquidity> {
        let tokens = self
            .binding
            .read(client, "getAccountLiquidity", &[Token::Address(account)])
            .await?;

        let mut values = tokens.into_iter().map(Token::into_uint);
        let (code, liquidity, shortfall) = match (values.next(), values.next(), values.next()) {
            (Some(Some(code)), Some(Some(liquidity)), Some(Some(shortfall))) => {
                (code, liquidity, shortfall)
            }
            _ => return Err(ScenarioError::Abi(ethers::abi::Error::InvalidData)),
        };

        if !code.is_zero() {
            return Err(ScenarioError::Protocol(format!(
                "getAccountLiquidity returned error code {}",
                code
            )));
        }

        Ok(AccountLiquidity {
            liquidity,
            shortfall,
        })
    }

    /// Address of the price oracle the comptroller consults
    pub async fn oracle(&self, client: &ForkClient) -> ScenarioResult<Address> {
        let tokens = self.binding.read(client, "oracle", &[]).await?;
        tokens
            .into_iter()
            .next()
            .and_then(Token::into_address)
            .ok_or(ScenarioError::Abi(ethers::abi::Error::InvalidData))
    }
}

/// Compound price feed
#[derive(Debug, Clone)]
pub struct PriceOracle {
    binding: ContractBinding,
}

impl PriceOracle {
    pub fn new(address: Address) -> ScenarioResult<Self> {
        Ok(Self {
            binding: ContractBinding::new(address, PRICE_ORACLE_ABI)?,
        })
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    /// Price of a market's underlying, scaled by `1e(36 - underlying decimals)`
    pub async fn underlying_price(
        &self,
        client: &ForkClient,
        c_token: Address,
    ) -> ScenarioResult<U256> {
        let tokens = self
            .binding
            .read(client, "getUnderlyingPrice", &[Token::Address(c_token)])
            .await?;
        first_uint(tokens)
    }

    /// Only available once the test double's code has been injected
    pub async fn set_underlying_price(
        &self,
        client: &ForkClient,
        from: Address,
        c_token: Address,
        price: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                from,
                "setUnderlyingPrice",
                &[Token::Address(c_token), Token::Uint(price)],
                ScenarioError::PriceOverrideRejected,
            )
            .await
    }
}
