//! Bindings for the pre-deployed contracts the scenario drives.
//!
//! Each binding is an address plus a human-readable ABI. Calls are encoded
//! locally and sent through the fork client, so no generated code or signer
//! middleware is involved.

mod compound;
mod strategy;
mod token;

pub use compound::{AccountLiquidity, Comptroller, PriceOracle};
pub use strategy::ShortStrategy;
pub use token::{Erc20, FiatToken, MasterMinter};

use crate::error::{ScenarioError, ScenarioResult};
use compound_fork_client::{Address, Bytes, ForkClient, SubmittedTx, TransactionRequest, U256};
use ethers::abi::{parse_abi, Abi, Token};
use tracing::debug;

/// Address plus ABI of a deployed contract
#[derive(Debug, Clone)]
pub struct ContractBinding {
    address: Address,
    abi: Abi,
}

impl ContractBinding {
    /// Bind `address` to the given human-readable function signatures
    pub fn new(address: Address, signatures: &[&str]) -> ScenarioResult<Self> {
        Ok(Self {
            address,
            abi: parse_abi(signatures)?,
        })
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.address
    }

    /// ABI-encoded call data for `function(args)`
    pub fn calldata(&self, function: &str, args: &[Token]) -> ScenarioResult<Bytes> {
        let data = self.abi.function(function)?.encode_input(args)?;
        Ok(data.into())
    }

    /// Transaction request calling `function(args)` from `from`
    pub fn transaction(
        &self,
        from: Address,
        function: &str,
        args: &[Token],
    ) -> ScenarioResult<TransactionRequest> {
        Ok(TransactionRequest::new()
            .from(from)
            .to(self.address)
            .data(self.calldata(function, args)?))
    }

    /// `eth_call` a view function and decode its outputs
    pub async fn read(
        &self,
        client: &ForkClient,
        function: &str,
        args: &[Token],
    ) -> ScenarioResult<Vec<Token>> {
        let tx = TransactionRequest::new()
            .to(self.address)
            .data(self.calldata(function, args)?);
        let output = client.rpc().call(&tx).await?;
        Ok(self.abi.function(function)?.decode_output(&output)?)
    }

    /// `eth_call` a view function returning a single `uint256`
    pub async fn read_uint(
        &self,
        client: &ForkClient,
        function: &str,
        args: &[Token],
    ) -> ScenarioResult<U256> {
        let tokens = self.read(client, function, args).await?;
        first_uint(tokens)
    }

    /// Send `function(args)` from `from` and wait for the receipt.
    ///
    /// A revert is turned into a domain error by `on_revert`.
    pub async fn send(
        &self,
        client: &ForkClient,
        from: Address,
        function: &str,
        args: &[Token],
        on_revert: impl FnOnce(String) -> ScenarioError,
    ) -> ScenarioResult<SubmittedTx> {
        debug!("{:?}.{} from {:?}", self.address, function, from);

        let tx = self.transaction(from, function, args)?;
        client
            .submit(tx)
            .await
            .map_err(|e| ScenarioError::on_revert(e, on_revert))
    }
}

pub(crate) fn first_uint(tokens: Vec<Token>) -> ScenarioResult<U256> {
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or(ScenarioError::Abi(ethers::abi::Error::InvalidData))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calldata_selector() {
        let binding = ContractBinding::new(
            Address::repeat_byte(0x11),
            &["function transfer(address,uint256) returns (bool)"],
        )
        .unwrap();

        let data = binding
            .calldata(
                "transfer",
                &[Token::Address(Address::repeat_byte(0x22)), Token::Uint(U256::one())],
            )
            .unwrap();

        // transfer(address,uint256)
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 64);
    }

    #[test]
    fn test_unknown_function() {
        let binding =
            ContractBinding::new(Address::zero(), &["function repay()"]).unwrap();
        assert!(matches!(
            binding.calldata("borrow", &[]),
            Err(ScenarioError::Abi(_))
        ));
    }

    #[test]
    fn test_transaction_request() {
        let from = Address::repeat_byte(0xa1);
        let binding =
            ContractBinding::new(Address::repeat_byte(0x57), &["function repay()"]).unwrap();

        let tx = binding.transaction(from, "repay", &[]).unwrap();
        assert_eq!(tx.from, Some(from));
        assert_eq!(tx.data.unwrap().len(), 4);
    }

    #[test]
    fn test_first_uint() {
        assert_eq!(
            first_uint(vec![Token::Uint(U256::from(7))]).unwrap(),
            U256::from(7)
        );
        assert!(first_uint(vec![Token::Bool(true)]).is_err());
        assert!(first_uint(vec![]).is_err());
    }
}
