//! Fee estimation and the profitability gate.

use alloy::primitives::U256;
use anyhow::Result;
use liquidator_chain::GasStrategy;
use tracing::debug;

use crate::u256_math::{fee_wad, scale_bps};

/// Damping applied to the market price for a fresh bid (0.4x).
pub const INITIAL_BID_BPS: u16 = 4_000;

/// Cost of `gas_limit` units at `gas_price` wei, as a WAD in settlement units.
#[inline]
pub fn estimate_fee(gas_price: u128, gas_limit: u64) -> U256 {
    fee_wad(gas_price, gas_limit)
}

/// Gas price to build the next pending transaction with.
///
/// An ongoing auction keeps its current price. A fresh one starts at the
/// market price scaled by `initial_bid_bps`. Fetch failures propagate.
pub async fn initial_gas_price(
    previous: Option<u128>,
    gas: &dyn GasStrategy,
    initial_bid_bps: u16,
) -> Result<u128> {
    if let Some(gas_price) = previous {
        return Ok(gas_price);
    }

    let market = gas.fetch_gas_price().await?;
    let gas_price = scale_bps(market, initial_bid_bps);
    debug!(market, gas_price, initial_bid_bps, "Fresh bid priced from market");
    Ok(gas_price)
}

/// Outcome of checking a fee against the ceiling and the revenue at stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Pass,
    /// Fee exceeds the configured maximum
    AboveCeiling,
    /// Fee exceeds the revenue it would capture
    AboveRevenue,
}

impl Gate {
    pub fn check(fee: U256, max_fee: U256, revenue: U256) -> Self {
        if fee > max_fee {
            Gate::AboveCeiling
        } else if fee > revenue {
            Gate::AboveRevenue
        } else {
            Gate::Pass
        }
    }

    #[inline]
    pub fn passed(self) -> bool {
        self == Gate::Pass
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gate::Pass => "pass",
            Gate::AboveCeiling => "fee above ceiling",
            Gate::AboveRevenue => "fee above revenue",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::parse_wad;
    use liquidator_chain::FixedGasStrategy;

    fn wad(value: &str) -> U256 {
        parse_wad(value).unwrap()
    }

    #[test]
    fn test_estimate_fee_exact() {
        assert_eq!(estimate_fee(2_500_000_000_000, 120_000), wad("0.3"));
        assert_eq!(estimate_fee(0, 120_000), U256::ZERO);
    }

    #[test]
    fn test_gate_ordering() {
        let max_fee = wad("0.5");

        assert_eq!(Gate::check(wad("0.3"), max_fee, wad("1.0")), Gate::Pass);
        assert_eq!(Gate::check(wad("0.3"), max_fee, wad("0.2")), Gate::AboveRevenue);
        assert_eq!(Gate::check(wad("0.6"), max_fee, wad("1.0")), Gate::AboveCeiling);
        // Both violated: ceiling reported first
        assert_eq!(Gate::check(wad("0.6"), max_fee, wad("0.1")), Gate::AboveCeiling);
    }

    #[test]
    fn test_gate_is_inclusive() {
        let fee = wad("0.5");
        assert!(Gate::check(fee, fee, fee).passed());
    }

    #[tokio::test]
    async fn test_initial_gas_price_damps_market() {
        let gas = FixedGasStrategy::new(6_250_000_000_000);
        let price = initial_gas_price(None, &gas, INITIAL_BID_BPS).await.unwrap();
        assert_eq!(price, 2_500_000_000_000);
    }

    #[tokio::test]
    async fn test_initial_gas_price_keeps_auction_price() {
        let gas = FixedGasStrategy::new(6_250_000_000_000);
        let price = initial_gas_price(Some(42), &gas, INITIAL_BID_BPS).await.unwrap();
        assert_eq!(price, 42);
    }
}
