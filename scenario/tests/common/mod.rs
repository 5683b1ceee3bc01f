//! In-memory stand-in for a Hardhat mainnet fork, served through wiremock.
//!
//! Only the contracts and methods the scenario touches are modelled. Reverts
//! use Hardhat's error message format so the client decodes reason strings
//! exactly as it would against a real node.

#![allow(dead_code)]

use compound_short::{units, Addresses, ContractArtifact, ScenarioConfig};
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::id;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use wiremock::{matchers::method, Mock, MockServer, Request, Respond, ResponseTemplate};

type RpcFailure = (i64, String);

pub const ARCHIVE_URL: &str = "https://archive.example";

pub fn trader() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

pub fn strategy() -> Address {
    Address::repeat_byte(0x57)
}

pub fn oracle() -> Address {
    Address::repeat_byte(0x0e)
}

/// $1 at Compound scale for a 6-decimals token
pub fn usdc_price() -> U256 {
    U256::exp10(30)
}

/// $10 at Compound scale for an 18-decimals token
pub fn uni_price() -> U256 {
    U256::exp10(19)
}

pub fn usdc(amount: u64) -> U256 {
    units::whole(amount, units::USDC_DECIMALS)
}

pub fn uni(amount: u64) -> U256 {
    units::whole(amount, units::GOVERNANCE_DECIMALS)
}

/// Transaction accepted by the fake node
#[derive(Debug, Clone)]
pub struct SentTx {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
}

impl SentTx {
    pub fn calls(&self, signature: &str) -> bool {
        self.data.len() >= 4 && self.data[..4] == id(signature)
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    pub eth: HashMap<Address, U256>,
    pub tokens: HashMap<(Address, Address), U256>,
    pub allowances: HashMap<(Address, Address, Address), U256>,
    pub controllers: HashMap<Address, Address>,
    pub minter_allowance: HashMap<Address, U256>,
    pub impersonated: HashSet<Address>,
    pub code: HashMap<Address, Bytes>,
    pub prices: HashMap<Address, U256>,
    pub supplied: U256,
    pub borrowed: U256,
    pub sold: U256,
    pub receipts: HashMap<H256, Value>,
    pub sent: Vec<SentTx>,
    pub nonce: u64,

    pub refuse_impersonation: bool,
    pub redeem_broken: bool,
    pub min_supply: U256,
}

impl Ledger {
    fn seeded(a: &Addresses) -> Self {
        let mut ledger = Ledger::default();
        ledger.eth.insert(trader(), U256::exp10(22));
        ledger
            .tokens
            .insert((a.borrow_token, a.borrow_token_holder), uni(10_000_000));
        ledger.prices.insert(a.c_usdc, usdc_price());
        ledger.prices.insert(a.c_borrow_token, uni_price());
        ledger
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.tokens.get(&(token, holder)).copied().unwrap_or_default()
    }

    fn credit(&mut self, token: Address, holder: Address, amount: U256) {
        *self.tokens.entry((token, holder)).or_default() += amount;
    }

    fn debit(&mut self, token: Address, holder: Address, amount: U256) -> Result<(), RpcFailure> {
        let balance = self.balance(token, holder);
        if balance < amount {
            return Err(revert("ERC20: transfer amount exceeds balance"));
        }
        self.tokens.insert((token, holder), balance - amount);
        Ok(())
    }

    /// `transferFrom(owner, spender, amount)` executed by `spender`
    fn pull(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), RpcFailure> {
        let key = (token, owner, spender);
        let allowance = self.allowances.get(&key).copied().unwrap_or_default();
        if allowance < amount {
            return Err(revert("ERC20: transfer amount exceeds allowance"));
        }
        self.debit(token, owner, amount)?;
        if allowance != U256::MAX {
            self.allowances.insert(key, allowance - amount);
        }
        self.credit(token, spender, amount);
        Ok(())
    }
}

/// Fake fork node; clones share one ledger
#[derive(Clone)]
pub struct FakeFork {
    addresses: Addresses,
    ledger: Arc<Mutex<Ledger>>,
}

impl FakeFork {
    pub fn new() -> Self {
        let addresses = Addresses::mainnet();
        Self {
            ledger: Arc::new(Mutex::new(Ledger::seeded(&addresses))),
            addresses,
        }
    }

    pub fn addresses(&self) -> &Addresses {
        &self.addresses
    }

    pub fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.ledger().sent.clone()
    }

    /// Serve this fork on a fresh mock server
    pub async fn start(&self) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(self.clone())
            .mount(&server)
            .await;
        server
    }

    fn dispatch(&self, l: &mut Ledger, method: &str, params: &Value) -> Result<Value, RpcFailure> {
        match method {
            "eth_chainId" => Ok(json!("0x7a69")),
            "eth_blockNumber" => Ok(json!(U256::from(14_000_000 + l.nonce))),
            "eth_accounts" => Ok(json!([trader()])),
            "eth_getBalance" => {
                let account: Address = param(&params[0])?;
                Ok(json!(l.eth.get(&account).copied().unwrap_or_default()))
            }
            "eth_getCode" => {
                let account: Address = param(&params[0])?;
                Ok(json!(l.code.get(&account).cloned().unwrap_or_default()))
            }
            "hardhat_impersonateAccount" => {
                if l.refuse_impersonation {
                    return Err((-32601, format!("Method {} is not supported", method)));
                }
                l.impersonated.insert(param(&params[0])?);
                Ok(json!(true))
            }
            "hardhat_stopImpersonatingAccount" => {
                let account: Address = param(&params[0])?;
                Ok(json!(l.impersonated.remove(&account)))
            }
            "hardhat_setCode" => {
                l.code.insert(param(&params[0])?, param(&params[1])?);
                Ok(json!(true))
            }
            "hardhat_setBalance" => {
                l.eth.insert(param(&params[0])?, param(&params[1])?);
                Ok(json!(true))
            }
            "hardhat_reset" => {
                // Hardhat drops the fork entirely when reset without an upstream
                if params[0]["forking"]["jsonRpcUrl"].as_str().is_none() {
                    return Err((-32603, "reset without forking leaves an empty chain".to_string()));
                }
                let mut fresh = Ledger::seeded(&self.addresses);
                fresh.refuse_impersonation = l.refuse_impersonation;
                fresh.redeem_broken = l.redeem_broken;
                fresh.min_supply = l.min_supply;
                *l = fresh;
                Ok(json!(true))
            }
            "evm_mine" => Ok(json!("0x0")),
            "eth_getTransactionReceipt" => {
                let hash: H256 = param(&params[0])?;
                Ok(l.receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            "eth_call" => {
                let output = self.call(l, &params[0])?;
                Ok(json!(Bytes::from(output)))
            }
            "eth_sendTransaction" => self.send(l, &params[0]),
            _ => Err((-32601, format!("Method {} not found", method))),
        }
    }

    fn liquidity(&self, l: &Ledger) -> (U256, U256) {
        let a = &self.addresses;
        let scale = U256::exp10(18);
        let collateral = l.supplied * l.prices[&a.c_usdc] / scale * 75 / 100;
        let debt = l.borrowed * l.prices[&a.c_borrow_token] / scale;
        if collateral >= debt {
            (collateral - debt, U256::zero())
        } else {
            (U256::zero(), debt - collateral)
        }
    }

    fn call(&self, l: &Ledger, tx: &Value) -> Result<Vec<u8>, RpcFailure> {
        let a = &self.addresses;
        let to: Address = param(&tx["to"])?;
        let data = calldata(tx)?;
        let (sel, args) = split(&data)?;

        let out = if to == a.usdc || to == a.borrow_token {
            if sel == id("balanceOf(address)") {
                vec![Token::Uint(l.balance(to, arg_address(args, 0)?))]
            } else if to == a.usdc && sel == id("minterAllowance(address)") {
                let minter = arg_address(args, 0)?;
                vec![Token::Uint(
                    l.minter_allowance.get(&minter).copied().unwrap_or_default(),
                )]
            } else {
                return Err(unrecognized());
            }
        } else if to == a.comptroller {
            if sel == id("getAccountLiquidity(address)") {
                let (liquidity, shortfall) = if arg_address(args, 0)? == strategy() {
                    self.liquidity(l)
                } else {
                    (U256::zero(), U256::zero())
                };
                vec![
                    Token::Uint(U256::zero()),
                    Token::Uint(liquidity),
                    Token::Uint(shortfall),
                ]
            } else if sel == id("oracle()") {
                vec![Token::Address(oracle())]
            } else {
                return Err(unrecognized());
            }
        } else if to == oracle() && sel == id("getUnderlyingPrice(address)") {
            let c_token = arg_address(args, 0)?;
            vec![Token::Uint(l.prices.get(&c_token).copied().unwrap_or_default())]
        } else if to == strategy() {
            if sel == id("supplied()") {
                vec![Token::Uint(l.supplied)]
            } else if sel == id("borrowBalance()") {
                vec![Token::Uint(l.borrowed)]
            } else {
                return Err(unrecognized());
            }
        } else {
            return Err(unrecognized());
        };

        Ok(encode(&out))
    }

    fn send(&self, l: &mut Ledger, tx: &Value) -> Result<Value, RpcFailure> {
        let from: Address = param(&tx["from"])?;
        if from != trader() && !l.impersonated.contains(&from) {
            return Err((-32000, format!("unknown account {:?}", from)));
        }
        let to: Option<Address> = optional(&tx["to"])?;
        let value: U256 = optional(&tx["value"])?.unwrap_or_default();
        let data = calldata(tx)?;

        if !value.is_zero() {
            let balance = l.eth.get(&from).copied().unwrap_or_default();
            if balance < value {
                return Err((-32003, "insufficient funds for gas * price + value".to_string()));
            }
            l.eth.insert(from, balance - value);
            if let Some(to) = to {
                *l.eth.entry(to).or_default() += value;
            }
        }

        let contract_address = match to {
            Some(to) => {
                if !data.is_empty() {
                    self.execute(l, from, to, &data)?;
                }
                None
            }
            None => Some(strategy()),
        };

        l.nonce += 1;
        let hash = H256::from_low_u64_be(l.nonce);
        l.receipts
            .insert(hash, receipt_json(hash, l.nonce, from, to, contract_address));
        l.sent.push(SentTx { from, to, data });
        Ok(json!(hash))
    }

    fn execute(&self, l: &mut Ledger, from: Address, to: Address, data: &[u8]) -> Result<(), RpcFailure> {
        let a = &self.addresses;
        let (sel, args) = split(data)?;

        if to == a.master_minter {
            if sel == id("configureController(address,address)") {
                if from != a.master_minter_owner {
                    return Err(revert("Ownable: caller is not the owner"));
                }
                l.controllers
                    .insert(arg_address(args, 0)?, arg_address(args, 1)?);
            } else if sel == id("configureMinter(uint256)") {
                let worker = *l
                    .controllers
                    .get(&from)
                    .ok_or_else(|| revert("MintController: The sender is not a controller"))?;
                l.minter_allowance.insert(worker, arg_uint(args, 0)?);
            } else {
                return Err(unrecognized());
            }
        } else if to == a.usdc || to == a.borrow_token {
            if sel == id("transfer(address,uint256)") {
                let amount = arg_uint(args, 1)?;
                l.debit(to, from, amount)?;
                l.credit(to, arg_address(args, 0)?, amount);
            } else if sel == id("approve(address,uint256)") {
                l.allowances
                    .insert((to, from, arg_address(args, 0)?), arg_uint(args, 1)?);
            } else if to == a.usdc && sel == id("mint(address,uint256)") {
                let amount = arg_uint(args, 1)?;
                let allowance = l.minter_allowance.get(&from).copied().unwrap_or_default();
                if amount > allowance {
                    return Err(revert("FiatToken: mint amount exceeds minterAllowance"));
                }
                l.minter_allowance.insert(from, allowance - amount);
                l.credit(to, arg_address(args, 0)?, amount);
            } else {
                return Err(unrecognized());
            }
        } else if to == strategy() {
            if sel == id("supply(uint256)") {
                let amount = arg_uint(args, 0)?;
                if amount < l.min_supply {
                    return Err(revert("supply below minimum"));
                }
                l.pull(a.usdc, from, strategy(), amount)?;
                l.supplied += amount;
            } else if sel == id("borrow(uint256)") {
                let amount = arg_uint(args, 0)?;
                let value = amount * l.prices[&a.c_borrow_token] / U256::exp10(18);
                if value > self.liquidity(l).0 {
                    return Err(revert("borrow failed"));
                }
                l.borrowed += amount;
                l.credit(a.borrow_token, from, amount);
            } else if sel == id("sell(uint256)") {
                let amount = arg_uint(args, 0)?;
                l.pull(a.borrow_token, from, strategy(), amount)?;
                l.sold += amount;
            } else if sel == id("repay()") {
                let debt = l.borrowed;
                l.pull(a.borrow_token, from, strategy(), debt)?;
                l.borrowed = U256::zero();
                if !l.redeem_broken {
                    let collateral = l.supplied;
                    l.debit(a.usdc, strategy(), collateral)?;
                    l.credit(a.usdc, from, collateral);
                    l.supplied = U256::zero();
                }
            } else {
                return Err(unrecognized());
            }
        } else if to == oracle() && l.code.contains_key(&oracle()) {
            if sel == id("setUnderlyingPrice(address,uint256)") {
                l.prices.insert(arg_address(args, 0)?, arg_uint(args, 1)?);
            } else {
                return Err(unrecognized());
            }
        } else {
            return Err(unrecognized());
        }

        Ok(())
    }
}

impl Respond for FakeFork {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let method = body["method"].as_str().unwrap_or_default();

        let mut ledger = self.ledger();
        match self.dispatch(&mut ledger, method, &body["params"]) {
            Ok(result) => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": result
            })),
            Err((code, message)) => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "error": { "code": code, "message": message }
            })),
        }
    }
}

/// Scenario configuration pointing at `server`, with the strategy pre-deployed
pub fn scenario_config(server: &MockServer) -> ScenarioConfig {
    let mut config = ScenarioConfig::mainnet().with_archive(ARCHIVE_URL.to_string());
    config.fork.rpc_url = server.uri();
    config.strategy.address = Some(strategy());
    config
}

pub fn price_feed_artifact() -> ContractArtifact {
    ContractArtifact::from_json(
        r#"{
            "contractName": "MockPriceFeed",
            "abi": [],
            "bytecode": "0x6080604052348015600f57600080fd5b50",
            "deployedBytecode": "0x6080604052600080fd"
        }"#,
    )
    .unwrap()
}

pub fn strategy_artifact() -> ContractArtifact {
    ContractArtifact::from_json(
        r#"{
            "contractName": "CompoundShort",
            "abi": [],
            "bytecode": "0x608060405234801561001057600080fd5b50",
            "deployedBytecode": "0x608060405260043610"
        }"#,
    )
    .unwrap()
}

fn revert(reason: &str) -> RpcFailure {
    (
        -32603,
        format!(
            "Error: VM Exception while processing transaction: reverted with reason string '{}'",
            reason
        ),
    )
}

fn unrecognized() -> RpcFailure {
    (
        -32603,
        "Error: Transaction reverted: function selector was not recognized and there's no fallback function"
            .to_string(),
    )
}

fn param<T: DeserializeOwned>(value: &Value) -> Result<T, RpcFailure> {
    serde_json::from_value(value.clone()).map_err(|e| (-32602, format!("invalid params: {}", e)))
}

fn optional<T: DeserializeOwned>(value: &Value) -> Result<Option<T>, RpcFailure> {
    if value.is_null() {
        return Ok(None);
    }
    param(value).map(Some)
}

fn calldata(tx: &Value) -> Result<Bytes, RpcFailure> {
    let field = if tx["data"].is_null() { &tx["input"] } else { &tx["data"] };
    Ok(optional(field)?.unwrap_or_default())
}

fn split(data: &[u8]) -> Result<([u8; 4], &[u8]), RpcFailure> {
    if data.len() < 4 {
        return Err(unrecognized());
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    Ok((selector, &data[4..]))
}

fn word(args: &[u8], index: usize) -> Result<&[u8], RpcFailure> {
    args.get(32 * index..32 * (index + 1))
        .ok_or_else(|| revert("calldata too short"))
}

fn arg_address(args: &[u8], index: usize) -> Result<Address, RpcFailure> {
    Ok(Address::from_slice(&word(args, index)?[12..]))
}

fn arg_uint(args: &[u8], index: usize) -> Result<U256, RpcFailure> {
    Ok(U256::from_big_endian(word(args, index)?))
}

fn receipt_json(
    hash: H256,
    block: u64,
    from: Address,
    to: Option<Address>,
    contract_address: Option<Address>,
) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": H256::from_low_u64_be(0xb10c_0000 + block),
        "blockNumber": U256::from(14_000_000 + block),
        "from": from,
        "to": to,
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": contract_address,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "status": "0x1",
        "effectiveGasPrice": "0x1"
    })
}
