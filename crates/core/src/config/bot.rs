//! Configuration management with profile support.
//!
//! Provides centralized configuration for the bidder with support for
//! different profiles (testing, production, aggressive) or a TOML file.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tx_builder::MissingOraclePolicy;
use crate::u256_math::{ether_str, format_wad};

/// Smallest replacement bump nodes accept (10%).
pub const MIN_REPLACEMENT_BUMP_BPS: u16 = 1_000;

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main configuration structure containing all bot parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Bidding loop and profitability gate
    #[serde(default)]
    pub bidding: BiddingConfig,

    /// Replace-by-fee and gas price limits
    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Bidding loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiddingConfig {
    /// Tick period (milliseconds)
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Maximum fee per transaction, decimal in settlement units ("0.5")
    #[serde(default = "default_max_fee", with = "ether_str")]
    pub max_fee: U256,

    /// Fraction of the market gas price a fresh bid starts at (basis points)
    #[serde(default = "default_initial_bid_bps")]
    pub initial_bid_bps: u16,

    /// Behaviour when a price update is needed but no oracle data exists
    #[serde(default)]
    pub missing_oracle_policy: MissingOraclePolicy,
}

fn default_interval() -> u64 {
    1_000
}
fn default_max_fee() -> U256 {
    // 0.5 units
    U256::from(500_000_000_000_000_000u64)
}
fn default_initial_bid_bps() -> u16 {
    4_000
}

impl Default for BiddingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            max_fee: default_max_fee(),
            initial_bid_bps: default_initial_bid_bps(),
            missing_oracle_policy: MissingOraclePolicy::default(),
        }
    }
}

impl BiddingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Transaction queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minimum bump over the live bid when replacing (basis points)
    #[serde(default = "default_bump")]
    pub replacement_bump_bps: u16,

    /// Gas price cap (gwei)
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: f64,

    /// Gas price assumed before the first RPC read (gwei)
    #[serde(default = "default_initial_gas_price")]
    pub initial_gas_price_gwei: f64,
}

fn default_bump() -> u16 {
    1_200
}
fn default_max_gas_price() -> f64 {
    500.0
}
fn default_initial_gas_price() -> f64 {
    1.0
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            replacement_bump_bps: default_bump(),
            max_gas_price_gwei: default_max_gas_price(),
            initial_gas_price_gwei: default_initial_gas_price(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            bidding: BiddingConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create a testing profile: fast ticks, tiny fee ceiling.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            bidding: BiddingConfig {
                interval_ms: 250,
                max_fee: U256::from(10_000_000_000_000_000u64), // 0.01
                initial_bid_bps: 4_000,
                missing_oracle_policy: MissingOraclePolicy::SkipPriceUpdates,
            },
            queue: QueueConfig {
                replacement_bump_bps: 1_200,
                max_gas_price_gwei: 50.0,
                initial_gas_price_gwei: 0.1,
            },
        }
    }

    /// Create a production profile with conservative settings.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            bidding: BiddingConfig::default(),
            queue: QueueConfig {
                max_gas_price_gwei: 300.0,
                ..Default::default()
            },
        }
    }

    /// Create an aggressive profile: faster re-bids from a higher start.
    pub fn aggressive() -> Self {
        Self {
            profile: "aggressive".to_string(),
            bidding: BiddingConfig {
                interval_ms: 200,
                max_fee: U256::from(2_000_000_000_000_000_000u64), // 2.0
                initial_bid_bps: 7_000,
                missing_oracle_policy: MissingOraclePolicy::DropAll,
            },
            queue: QueueConfig {
                replacement_bump_bps: 1_100,
                max_gas_price_gwei: 1_000.0,
                initial_gas_price_gwei: 1.0,
            },
        }
    }

    /// Named profile, or `None` if the name is unknown.
    pub fn profile(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default()),
            "testing" | "test" => Some(Self::testing()),
            "production" | "prod" => Some(Self::production()),
            "aggressive" | "aggro" => Some(Self::aggressive()),
            _ => None,
        }
    }

    /// Get profile from environment variable BOT_PROFILE, or default.
    /// Supported values: testing, production, aggressive, or a `.toml` path
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = std::env::var("BOT_PROFILE").unwrap_or_else(|_| "default".to_string());
        if profile.ends_with(".toml") {
            return Self::from_file(&profile);
        }
        Self::profile(&profile).ok_or(ConfigError::Invalid {
            field: "BOT_PROFILE",
            reason: format!("unknown profile {profile:?}"),
        })
    }

    /// Reject values the bidder cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |field: &'static str, reason: String| Err(ConfigError::Invalid { field, reason });

        if self.bidding.interval_ms == 0 {
            return invalid("bidding.interval_ms", "must be positive".to_string());
        }
        if self.bidding.max_fee.is_zero() {
            return invalid("bidding.max_fee", "must be positive".to_string());
        }
        if self.bidding.initial_bid_bps == 0 || self.bidding.initial_bid_bps > 10_000 {
            return invalid(
                "bidding.initial_bid_bps",
                format!("{} not in 1..=10000", self.bidding.initial_bid_bps),
            );
        }
        if self.queue.replacement_bump_bps < MIN_REPLACEMENT_BUMP_BPS {
            return invalid(
                "queue.replacement_bump_bps",
                format!(
                    "{} below the {} nodes require",
                    self.queue.replacement_bump_bps, MIN_REPLACEMENT_BUMP_BPS
                ),
            );
        }
        if self.queue.max_gas_price_gwei.is_nan() || self.queue.max_gas_price_gwei <= 0.0 {
            return invalid("queue.max_gas_price_gwei", "must be positive".to_string());
        }
        if self.queue.initial_gas_price_gwei > self.queue.max_gas_price_gwei {
            return invalid(
                "queue.initial_gas_price_gwei",
                "above max_gas_price_gwei".to_string(),
            );
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            interval_ms = self.bidding.interval_ms,
            max_fee = %format_wad(self.bidding.max_fee),
            initial_bid_bps = self.bidding.initial_bid_bps,
            missing_oracle_policy = ?self.bidding.missing_oracle_policy,
            "Bidding parameters"
        );
        tracing::info!(
            replacement_bump_bps = self.queue.replacement_bump_bps,
            max_gas_price_gwei = self.queue.max_gas_price_gwei,
            initial_gas_price_gwei = self.queue.initial_gas_price_gwei,
            "Queue parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::parse_wad;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.bidding.interval_ms, 1_000);
        assert_eq!(config.bidding.max_fee, parse_wad("0.5").unwrap());
        assert_eq!(config.bidding.initial_bid_bps, 4_000);
        assert_eq!(config.bidding.missing_oracle_policy, MissingOraclePolicy::DropAll);
        assert_eq!(config.queue.replacement_bump_bps, 1_200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profiles_validate() {
        for name in ["default", "testing", "production", "aggressive"] {
            let config = BotConfig::profile(name).unwrap();
            assert!(config.validate().is_ok(), "{name} profile invalid");
        }
        assert!(BotConfig::profile("reckless").is_none());
    }

    #[test]
    fn test_testing_profile() {
        let config = BotConfig::testing();
        assert_eq!(config.profile, "testing");
        assert!(config.bidding.max_fee < BotConfig::default().bidding.max_fee);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BotConfig = toml::from_str(
            r#"
            profile = "custom"

            [bidding]
            max_fee = "0.25"
            missing_oracle_policy = "skip_price_updates"
            "#,
        )
        .unwrap();

        assert_eq!(config.profile, "custom");
        assert_eq!(config.bidding.max_fee, parse_wad("0.25").unwrap());
        assert_eq!(
            config.bidding.missing_oracle_policy,
            MissingOraclePolicy::SkipPriceUpdates
        );
        assert_eq!(config.bidding.interval_ms, 1_000);
        assert_eq!(config.queue, QueueConfig::default());
    }

    #[test]
    fn test_serialization() {
        let config = BotConfig::testing();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"testing\""));

        let parsed: BotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = BotConfig::default();
        config.queue.replacement_bump_bps = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue.replacement_bump_bps"));

        let mut config = BotConfig::default();
        config.bidding.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = BotConfig::from_file("/nonexistent/bot.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
