//! Slot-based transaction queue with replace-by-fee.
//!
//! Each slot owns one nonce. A slot's transaction can be replaced by a
//! higher-priced one or dumped (replaced with a zero-value self transfer)
//! until the nonce is consumed on chain, at which point the slot is pruned.
//!
//! Replacement pricing is split in two phases: [`TxQueue::propose_replacement`]
//! computes the gas price a replacement would need without broadcasting or
//! mutating anything, and [`TxQueue::replace`] commits a replacement at a
//! caller-chosen price.

use alloy::primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::gas::{GasStrategy, GWEI};
use crate::signer::TransactionSender;

/// Gas limit of a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Default minimum bump over the slot's current price (12%).
///
/// Nodes reject replacements below +10%; the extra margin absorbs rounding
/// differences between clients.
pub const DEFAULT_REPLACEMENT_BUMP_BPS: u16 = 1_200;

/// A fully specified legacy transaction waiting in a queue slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTx {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl QueuedTx {
    /// Contract call with no value attached.
    pub fn call(to: Address, input: Bytes, gas_price: u128, gas_limit: u64) -> Self {
        Self {
            to,
            input,
            value: U256::ZERO,
            gas_price,
            gas_limit,
        }
    }

    /// Zero-value transfer to `account` itself; occupies a nonce and does nothing.
    pub fn noop(account: Address, gas_price: u128) -> Self {
        Self::call(account, Bytes::new(), gas_price, TRANSFER_GAS_LIMIT)
    }

    pub fn is_noop(&self) -> bool {
        self.input.is_empty() && self.value.is_zero()
    }

    /// Same transaction at a different gas price.
    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }
}

/// Queue failures that are not transport errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("slot {index} out of range (queue length {len})")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("replacement for slot {index} needs {required} wei, above cap {cap} wei")]
    AboveCap { index: usize, required: u128, cap: u128 },

    #[error("replacement for slot {index} offers {offered} wei, needs at least {required} wei")]
    Underpriced {
        index: usize,
        offered: u128,
        required: u128,
    },
}

/// Transaction queue consumed by the bidder.
#[async_trait]
pub trait TxQueue: Send + Sync + Debug {
    /// Number of occupied slots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop slots whose nonce has been consumed on chain.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    /// Put `tx` into a new slot and broadcast it.
    async fn append(&self, tx: QueuedTx) -> Result<B256>;

    /// Gas price a replacement of slot `index` would need to win against the
    /// current network state. Broadcasts nothing and mutates nothing.
    async fn propose_replacement(&self, index: usize, tx: &QueuedTx) -> Result<u128>;

    /// Replace slot `index` with `tx` at `tx.gas_price` and broadcast it.
    async fn replace(&self, index: usize, tx: QueuedTx) -> Result<B256>;

    /// Replace slot `index` with a no-op.
    async fn dump(&self, index: usize) -> Result<B256>;
}

/// Minimum gas price a replacement needs.
///
/// `max(previous * (1 + bump), market)`, rounding the bump up so the result
/// is never below what a node requires.
pub fn replacement_gas_price(previous: u128, market: u128, bump_bps: u16) -> u128 {
    let numerator = previous.saturating_mul(10_000 + bump_bps as u128);
    let bumped = numerator.div_ceil(10_000);
    bumped.max(market)
}

#[derive(Debug, Clone)]
struct Slot {
    nonce: u64,
    tx: QueuedTx,
    hash: B256,
}

/// [`TxQueue`] backed by a [`TransactionSender`] and a market price source.
pub struct TransactionQueue {
    sender: Arc<TransactionSender>,
    gas: Arc<dyn GasStrategy>,
    bump_bps: u16,
    slots: Mutex<Vec<Slot>>,
}

impl TransactionQueue {
    pub fn new(sender: Arc<TransactionSender>, gas: Arc<dyn GasStrategy>) -> Self {
        Self {
            sender,
            gas,
            bump_bps: DEFAULT_REPLACEMENT_BUMP_BPS,
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Set the minimum replacement bump in basis points.
    pub fn with_bump_bps(mut self, bump_bps: u16) -> Self {
        self.bump_bps = bump_bps;
        self
    }

    fn slot(&self, index: usize) -> Result<Slot> {
        let slots = self.slots.lock();
        slots.get(index).cloned().ok_or_else(|| {
            QueueError::SlotOutOfRange {
                index,
                len: slots.len(),
            }
            .into()
        })
    }

    fn store(&self, index: usize, nonce: u64, tx: QueuedTx, hash: B256) {
        let mut slots = self.slots.lock();
        // The slot may have been pruned while we were broadcasting.
        if let Some(slot) = slots.get_mut(index).filter(|s| s.nonce == nonce) {
            slot.tx = tx;
            slot.hash = hash;
        }
    }

    async fn required_price(&self, index: usize, slot: &Slot) -> Result<u128> {
        let market = self.gas.fetch_gas_price().await?;
        let required = replacement_gas_price(slot.tx.gas_price, market, self.bump_bps);
        let cap = self.gas.max_gas_price();
        if required > cap {
            return Err(QueueError::AboveCap { index, required, cap }.into());
        }
        Ok(required)
    }
}

#[async_trait]
impl TxQueue for TransactionQueue {
    fn len(&self) -> usize {
        self.slots.lock().len()
    }

    async fn refresh(&self) -> Result<()> {
        let confirmed = self.sender.confirmed_nonce().await?;
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|slot| slot.nonce >= confirmed);
        let pruned = before - slots.len();
        if pruned > 0 {
            debug!(
                pruned,
                confirmed_nonce = confirmed,
                next_nonce = self.sender.next_nonce(),
                "Pruned confirmed slots"
            );
        }
        Ok(())
    }

    async fn append(&self, tx: QueuedTx) -> Result<B256> {
        let nonce = self.sender.reserve_nonce();
        let hash = self.sender.broadcast(&tx, nonce).await?;
        self.slots.lock().push(Slot { nonce, tx, hash });
        Ok(hash)
    }

    async fn propose_replacement(&self, index: usize, _tx: &QueuedTx) -> Result<u128> {
        let slot = self.slot(index)?;
        self.required_price(index, &slot).await
    }

    async fn replace(&self, index: usize, tx: QueuedTx) -> Result<B256> {
        let slot = self.slot(index)?;
        let required = replacement_gas_price(slot.tx.gas_price, 0, self.bump_bps);
        if tx.gas_price < required {
            return Err(QueueError::Underpriced {
                index,
                offered: tx.gas_price,
                required,
            }
            .into());
        }

        let hash = self.sender.broadcast(&tx, slot.nonce).await?;
        info!(
            index,
            nonce = slot.nonce,
            replaced = %slot.hash,
            gas_price_gwei = tx.gas_price / GWEI,
            "Slot replaced"
        );
        self.store(index, slot.nonce, tx, hash);
        Ok(hash)
    }

    async fn dump(&self, index: usize) -> Result<B256> {
        let slot = self.slot(index)?;
        if slot.tx.is_noop() {
            return Ok(slot.hash);
        }

        let gas_price = match self.required_price(index, &slot).await {
            Ok(price) => price,
            Err(e) => {
                warn!(index, error = %e, "Cannot price dump, leaving slot as is");
                return Err(e);
            }
        };

        let noop = QueuedTx::noop(self.sender.address, gas_price);
        let hash = self.sender.broadcast(&noop, slot.nonce).await?;
        info!(index, nonce = slot.nonce, gas_price_gwei = gas_price / GWEI, "Slot dumped");
        self.store(index, slot.nonce, noop, hash);
        Ok(hash)
    }
}

impl Debug for TransactionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionQueue")
            .field("sender", &self.sender.address)
            .field("gas_strategy", &self.gas.strategy_name())
            .field("bump_bps", &self.bump_bps)
            .field("slots", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_price_bumps_previous() {
        // 10 gwei + 12% = 11.2 gwei, market lower
        let price = replacement_gas_price(10 * GWEI, 5 * GWEI, 1_200);
        assert_eq!(price, 11_200_000_000);
    }

    #[test]
    fn test_replacement_price_follows_market() {
        let price = replacement_gas_price(10 * GWEI, 30 * GWEI, 1_200);
        assert_eq!(price, 30 * GWEI);
    }

    #[test]
    fn test_replacement_price_rounds_up() {
        // 7 * 1.12 = 7.84 -> 8
        assert_eq!(replacement_gas_price(7, 0, 1_200), 8);
        assert_eq!(replacement_gas_price(0, 0, 1_200), 0);
    }

    #[test]
    fn test_noop_tx() {
        let account = Address::repeat_byte(9);
        let noop = QueuedTx::noop(account, GWEI);
        assert!(noop.is_noop());
        assert_eq!(noop.to, account);
        assert_eq!(noop.gas_limit, TRANSFER_GAS_LIMIT);

        let call = QueuedTx::call(account, Bytes::from(vec![1, 2, 3]), GWEI, 100_000);
        assert!(!call.is_noop());
        assert_eq!(call.clone().with_gas_price(2 * GWEI).gas_price, 2 * GWEI);
    }

    #[test]
    fn test_queue_error_messages() {
        let err = QueueError::SlotOutOfRange { index: 2, len: 1 };
        assert_eq!(err.to_string(), "slot 2 out of range (queue length 1)");

        let err = QueueError::Underpriced {
            index: 0,
            offered: 10,
            required: 12,
        };
        assert!(err.to_string().contains("needs at least 12 wei"));
    }
}
