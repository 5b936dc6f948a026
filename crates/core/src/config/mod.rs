//! Runtime configuration for the bidder.
//!
//! Profiles (default, testing, production, aggressive) or a TOML file,
//! selected through `BOT_PROFILE`.

mod bot;

pub use bot::{
    BiddingConfig, BotConfig, ConfigError, QueueConfig,
    MIN_REPLACEMENT_BUMP_BPS,
};
