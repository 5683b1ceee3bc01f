use super::ContractBinding;
use crate::error::{ScenarioError, ScenarioResult};
use compound_fork_client::{Address, ForkClient, SubmittedTx, U256};
use ethers::abi::Token;

const ERC20_ABI: &[&str] = &[
    "function balanceOf(address) view returns (uint256)",
    "function approve(address,uint256) returns (bool)",
    "function transfer(address,uint256) returns (bool)",
];

const FIAT_TOKEN_ABI: &[&str] = &[
    "function balanceOf(address) view returns (uint256)",
    "function approve(address,uint256) returns (bool)",
    "function transfer(address,uint256) returns (bool)",
    "function minterAllowance(address) view returns (uint256)",
    "function mint(address,uint256) returns (bool)",
];

const MASTER_MINTER_ABI: &[&str] = &[
    "function configureController(address,address)",
    "function configureMinter(uint256) returns (bool)",
];

/// Standard fungible token
#[derive(Debug, Clone)]
pub struct Erc20 {
    binding: ContractBinding,
}

impl Erc20 {
    pub fn new(address: Address) -> ScenarioResult<Self> {
        Ok(Self {
            binding: ContractBinding::new(address, ERC20_ABI)?,
        })
    }

    fn with_binding(binding: ContractBinding) -> Self {
        Self { binding }
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    pub async fn balance_of(&self, client: &ForkClient, holder: Address) -> ScenarioResult<U256> {
        self.binding
            .read_uint(client, "balanceOf", &[Token::Address(holder)])
            .await
    }

    pub async fn approve(
        &self,
        client: &ForkClient,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                owner,
                "approve",
                &[Token::Address(spender), Token::Uint(amount)],
                ScenarioError::InsufficientAllowance,
            )
            .await
    }

    pub async fn transfer(
        &self,
        client: &ForkClient,
        from: Address,
        to: Address,
        amount: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                from,
                "transfer",
                &[Token::Address(to), Token::Uint(amount)],
                ScenarioError::InsufficientAllowance,
            )
            .await
    }
}

/// Centre's FiatToken (USDC): an ERC-20 whose supply is minted by configured minters
#[derive(Debug, Clone)]
pub struct FiatToken {
    token: Erc20,
}

impl FiatToken {
    pub fn new(address: Address) -> ScenarioResult<Self> {
        Ok(Self {
            token: Erc20::with_binding(ContractBinding::new(address, FIAT_TOKEN_ABI)?),
        })
    }

    /// ERC-20 view of the token
    pub fn erc20(&self) -> &Erc20 {
        &self.token
    }

    pub fn address(&self) -> Address {
        self.token.address()
    }

    pub async fn minter_allowance(
        &self,
        client: &ForkClient,
        minter: Address,
    ) -> ScenarioResult<U256> {
        self.token
            .binding
            .read_uint(client, "minterAllowance", &[Token::Address(minter)])
            .await
    }

    /// Mint `amount` to `to`; `minter` must hold enough minter allowance
    pub async fn mint(
        &self,
        client: &ForkClient,
        minter: Address,
        to: Address,
        amount: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.token
            .binding
            .send(
                client,
                minter,
                "mint",
                &[Token::Address(to), Token::Uint(amount)],
                ScenarioError::MintAuthority,
            )
            .await
    }
}

/// USDC MasterMinter: owner appoints controllers, controllers configure minters
#[derive(Debug, Clone)]
pub struct MasterMinter {
    binding: ContractBinding,
}

impl MasterMinter {
    pub fn new(address: Address) -> ScenarioResult<Self> {
        Ok(Self {
            binding: ContractBinding::new(address, MASTER_MINTER_ABI)?,
        })
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    /// Owner-only: let `controller` manage the minter `worker`
    pub async fn configure_controller(
        &self,
        client: &ForkClient,
        owner: Address,
        controller: Address,
        worker: Address,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                owner,
                "configureController",
                &[Token::Address(controller), Token::Address(worker)],
                ScenarioError::MintAuthority,
            )
            .await
    }

    /// Controller-only: set the worker's minter allowance
    pub async fn configure_minter(
        &self,
        client: &ForkClient,
        controller: Address,
        allowance: U256,
    ) -> ScenarioResult<SubmittedTx> {
        self.binding
            .send(
                client,
                controller,
                "configureMinter",
                &[Token::Uint(allowance)],
                ScenarioError::MintAuthority,
            )
            .await
    }
}
