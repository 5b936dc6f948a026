//! Liquidator chain interaction layer.
//!
//! This crate provides the ledger-facing collaborators of the bidder:
//! - Liquidator contract binding (single and batch liquidation calldata)
//! - Market gas price strategies
//! - Transaction signing with local nonce tracking
//! - Slot-based transaction queue with replace-by-fee
//! - Holder for signed oracle price payloads

pub mod contracts;
pub mod gas;
pub mod oracle;
pub mod queue;
mod signer;

pub use contracts::{buffered_gas_limit, LiquidatorContract, SINGLE_LIQUIDATION_GAS_BUFFER_BPS};
pub use gas::{FixedGasStrategy, GasStrategy, LegacyGasStrategy, GWEI};
pub use oracle::{PostableData, PriceOracle, SignedPriceFeed};
pub use queue::{replacement_gas_price, QueueError, QueuedTx, TransactionQueue, TxQueue};
pub use signer::{NonceManager, TransactionSender};
