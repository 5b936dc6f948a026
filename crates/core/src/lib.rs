//! Liquidator core logic.
//!
//! This crate provides the bidding side of the liquidation bot:
//! - Candidate bookkeeping with staleness eviction
//! - Fee estimation and the profitability gate
//! - Aggregated batch transaction construction
//! - The replace-by-fee bid controller and the task that drives it
//! - Bus events and runtime configuration

mod bidder;
mod candidates;
pub mod config;
pub mod events;
mod fees;
mod service;
mod tx_builder;
pub mod u256_math;

pub use bidder::{BidController, BidState, BidderConfig, TickOutcome};
pub use candidates::{Candidate, CandidateAggregate, CandidateStore};
pub use config::{BotConfig, ConfigError};
pub use events::{parse_event_line, BusEvent, EventBus, LiquidationCandidate, WireEvent};
pub use fees::{estimate_fee, initial_gas_price, Gate, INITIAL_BID_BPS};
pub use service::{spawn_bidder, BidderHandle};
pub use tx_builder::{
    MissingOraclePolicy, PendingTransaction, TransactionBuilder, TxKind, GAS_PER_BORROWER,
    PLAIN_GAS_OVERHEAD, PRICE_UPDATE_GAS_OVERHEAD,
};
