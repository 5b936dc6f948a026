//! Fixed-point money arithmetic.
//!
//! Every money quantity in the bidder (candidate revenue, revenue snapshot,
//! fee, fee ceiling) is a WAD: a `U256` with 18 implied decimals, where
//! `1e18` is one unit of the settlement asset. Gas prices are wei, so a fee
//! in wei is already a WAD and needs no division.

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Fee of `gas_limit` units at `gas_price` wei, as a WAD.
///
/// Equivalent to `gas_price * gas_limit / 1e18` settlement units, computed
/// exactly.
#[inline(always)]
pub fn fee_wad(gas_price: u128, gas_limit: u64) -> U256 {
    U256::from(gas_price) * U256::from(gas_limit)
}

/// Scale a wei amount by `bps / 10000`, rounding down.
///
/// Example: scale_bps(1000, 4000) = 400
#[inline(always)]
pub fn scale_bps(value: u128, bps: u16) -> u128 {
    let scaled = U256::from(value) * U256::from(bps) / U256::from(BPS_DENOMINATOR);
    scaled.saturating_to::<u128>()
}

/// Parse a decimal amount in settlement units ("0.5") into a WAD.
pub fn parse_wad(value: &str) -> Result<U256, String> {
    parse_ether(value.trim()).map_err(|e| e.to_string())
}

/// Format a WAD as a decimal string in settlement units.
pub fn format_wad(value: U256) -> String {
    format_ether(value)
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        f64::MAX
    }
}

/// Serde adapter for WAD amounts written as decimal strings ("0.6").
pub mod ether_str {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wad(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wad(&raw).map_err(serde::de::Error::custom)
    }
}
