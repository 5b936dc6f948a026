//! Legacy gas pricing strategy (single `gasPrice` field).
//!
//! Liquidation bids are expressed as a legacy gas price so that
//! replace-by-fee only has to reason about one number.

use super::GasStrategy;
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Legacy gas pricing strategy backed by `eth_gasPrice`.
///
/// Caches the last observed price for logging and fallback inspection.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// RPC endpoint queried for the market price.
    rpc_url: String,
    /// Maximum gas price in wei.
    max_gas_price: u128,
    /// Last fetched gas price in gwei.
    cached_gas_price_gwei: AtomicU64,
}

impl LegacyGasStrategy {
    /// Create a new Legacy gas strategy.
    ///
    /// # Arguments
    /// * `rpc_url` - HTTP endpoint used for `eth_gasPrice`
    /// * `initial_gas_price` - Seed value for the cache, in wei
    /// * `max_gas_price` - Cap applied to every fetched price, in wei
    pub fn new(rpc_url: impl Into<String>, initial_gas_price: u128, max_gas_price: u128) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            max_gas_price,
            cached_gas_price_gwei: AtomicU64::new((initial_gas_price / super::GWEI) as u64),
        }
    }

    /// Last fetched gas price, truncated to whole gwei.
    pub fn cached_gas_price_gwei(&self) -> u64 {
        self.cached_gas_price_gwei.load(Ordering::Relaxed)
    }

    fn cap(&self, gas_price: u128) -> u128 {
        gas_price.min(self.max_gas_price)
    }

    fn update_cache(&self, gas_price: u128) {
        self.cached_gas_price_gwei
            .store((gas_price / super::GWEI) as u64, Ordering::Relaxed);
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_gas_price(&self) -> Result<u128> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let market = provider.get_gas_price().await?;
        let capped = self.cap(market);
        self.update_cache(capped);

        debug!(
            market_wei = market,
            capped_wei = capped,
            "Fetched market gas price"
        );

        Ok(capped)
    }

    fn max_gas_price(&self) -> u128 {
        self.max_gas_price
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::GWEI;

    #[test]
    fn test_legacy_strategy_creation() {
        let strategy = LegacyGasStrategy::new("http://localhost:8545", 3 * GWEI, 100 * GWEI);
        assert_eq!(strategy.max_gas_price(), 100 * GWEI);
        assert_eq!(strategy.cached_gas_price_gwei(), 3);
        assert_eq!(strategy.strategy_name(), "Legacy");
    }

    #[test]
    fn test_legacy_cap() {
        let strategy = LegacyGasStrategy::new("http://localhost:8545", GWEI, 10 * GWEI);
        assert_eq!(strategy.cap(5 * GWEI), 5 * GWEI);
        assert_eq!(strategy.cap(20 * GWEI), 10 * GWEI);

        strategy.update_cache(strategy.cap(20 * GWEI));
        assert_eq!(strategy.cached_gas_price_gwei(), 10);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_gas_price() {
        let strategy = LegacyGasStrategy::new("https://eth.llamarpc.com", GWEI, 1_000 * GWEI);
        let price = strategy.fetch_gas_price().await.unwrap();
        assert!(price > 0);
        assert!(price <= 1_000 * GWEI);
    }
}
