//! Token amount helpers.

use crate::error::ScenarioResult;
use compound_fork_client::U256;
use ethers::types::U512;
use ethers::utils;

/// USDC decimals
pub const USDC_DECIMALS: u8 = 6;

/// Decimals of the borrowed governance token (UNI)
pub const GOVERNANCE_DECIMALS: u8 = 18;

/// `whole * 10^decimals`
pub fn whole(amount: u64, decimals: u8) -> U256 {
    U256::from(amount) * U256::exp10(decimals as usize)
}

/// Parse a decimal string such as `"1.5"` into base units
pub fn parse(amount: &str, decimals: u8) -> ScenarioResult<U256> {
    Ok(utils::parse_units(amount, decimals as u32)?.into())
}

/// Render base units as a decimal string, e.g. `500.000000`
pub fn format(amount: U256, decimals: u8) -> ScenarioResult<String> {
    Ok(utils::format_units(amount, decimals as u32)?)
}

/// USD value (1e18 scale) of `amount` at a Compound oracle `price`.
///
/// Compound prices are scaled by `1e(36 - decimals)`, so the product always
/// lands on the 1e18 scale regardless of the token's decimals.
pub fn usd_value(amount: U256, price: U256) -> U256 {
    let product = amount.full_mul(price) / U512::from(U256::exp10(18));
    U256::try_from(product).unwrap_or(U256::MAX)
}
