//! Gas price sources for bidding.
//!
//! The bidding controller only needs one number from the network: the
//! current market gas price. This module provides a trait-based abstraction
//! so the controller can be driven by a live RPC strategy in production and
//! by a fixed price in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use liquidator_chain::gas::{GasStrategy, LegacyGasStrategy};
//!
//! let legacy = LegacyGasStrategy::new("https://rpc.example", 1_000_000_000, 500_000_000_000);
//! let price = legacy.fetch_gas_price().await?;
//! ```

mod legacy;

pub use legacy::LegacyGasStrategy;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// One gwei in wei.
pub const GWEI: u128 = 1_000_000_000;

/// Trait for market gas price sources.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Fetch the current market gas price in wei.
    ///
    /// Network failures are returned to the caller, never retried here.
    async fn fetch_gas_price(&self) -> Result<u128>;

    /// Upper bound this strategy will ever bid, in wei.
    fn max_gas_price(&self) -> u128;

    /// Get the strategy name for logging/debugging.
    fn strategy_name(&self) -> &'static str;
}

/// Gas price source that always reports the same price.
///
/// Useful for dry runs against a fork and for tests.
#[derive(Debug, Clone)]
pub struct FixedGasStrategy {
    gas_price: u128,
}

impl FixedGasStrategy {
    pub fn new(gas_price: u128) -> Self {
        Self { gas_price }
    }
}

#[async_trait]
impl GasStrategy for FixedGasStrategy {
    async fn fetch_gas_price(&self) -> Result<u128> {
        Ok(self.gas_price)
    }

    fn max_gas_price(&self) -> u128 {
        u128::MAX
    }

    fn strategy_name(&self) -> &'static str {
        "Fixed"
    }
}

/// Convert a gwei amount (possibly fractional) to wei.
pub fn gwei_to_wei(gwei: f64) -> u128 {
    if gwei <= 0.0 {
        return 0;
    }
    (gwei * GWEI as f64) as u128
}
