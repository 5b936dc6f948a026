//! Aggregated liquidation transaction construction.
//!
//! Turns the whole candidate set into one batch call. Candidates that need a
//! fresh oracle price force the price-update call shape, which embeds the
//! oracle's current signed payload.

use alloy::primitives::{Address, U256};
use liquidator_chain::{LiquidatorContract, PostableData, PriceOracle, QueuedTx};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::candidates::{CandidateAggregate, CandidateStore};
use crate::fees::estimate_fee;

/// Gas charged per liquidated borrower in a batch.
pub const GAS_PER_BORROWER: u64 = 20_000;
/// Fixed overhead of a plain batch.
pub const PLAIN_GAS_OVERHEAD: u64 = 100_000;
/// Fixed overhead of a batch that posts prices first.
pub const PRICE_UPDATE_GAS_OVERHEAD: u64 = 400_000;

/// Call shape of the aggregated transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Plain,
    WithPriceUpdate,
}

impl TxKind {
    /// Gas limit for a batch of `borrowers` accounts.
    pub fn gas_limit(self, borrowers: usize) -> u64 {
        let overhead = match self {
            TxKind::Plain => PLAIN_GAS_OVERHEAD,
            TxKind::WithPriceUpdate => PRICE_UPDATE_GAS_OVERHEAD,
        };
        GAS_PER_BORROWER
            .saturating_mul(borrowers as u64)
            .saturating_add(overhead)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Plain => "plain",
            TxKind::WithPriceUpdate => "with_price_update",
        }
    }
}

/// What to do when some candidate needs a price update but no oracle payload
/// is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingOraclePolicy {
    /// Build nothing, not even for candidates that need no update.
    #[default]
    DropAll,
    /// Build a plain batch from the candidates that need no update.
    SkipPriceUpdates,
}

/// The single cached transaction the controller bids with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub borrowers: Vec<Address>,
    pub repay_tokens: Vec<Address>,
    pub seize_tokens: Vec<Address>,
    /// Price payload, present exactly when `kind` is `WithPriceUpdate`
    pub prices: Option<PostableData>,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Revenue of the included candidates at build time (WAD)
    pub revenue_snapshot: U256,
}

impl PendingTransaction {
    fn from_aggregate(
        kind: TxKind,
        aggregate: CandidateAggregate,
        prices: Option<PostableData>,
        gas_price: u128,
    ) -> Self {
        let gas_limit = kind.gas_limit(aggregate.len());
        Self {
            kind,
            borrowers: aggregate.borrowers,
            repay_tokens: aggregate.repay_tokens,
            seize_tokens: aggregate.seize_tokens,
            prices,
            gas_price,
            gas_limit,
            revenue_snapshot: aggregate.revenue,
        }
    }

    /// Current fee at `gas_price` (WAD).
    pub fn fee(&self) -> U256 {
        estimate_fee(self.gas_price, self.gas_limit)
    }

    /// Fee this transaction would cost at another gas price (WAD).
    pub fn fee_at(&self, gas_price: u128) -> U256 {
        estimate_fee(gas_price, self.gas_limit)
    }

    /// Encode into a queue-ready transaction.
    pub fn to_queued(&self, contract: &LiquidatorContract) -> QueuedTx {
        match (self.kind, &self.prices) {
            (TxKind::WithPriceUpdate, Some(prices)) => contract.liquidate_many_with_price_update(
                prices,
                &self.borrowers,
                &self.repay_tokens,
                &self.seize_tokens,
                self.gas_price,
                self.gas_limit,
            ),
            _ => contract.liquidate_many(
                &self.borrowers,
                &self.repay_tokens,
                &self.seize_tokens,
                self.gas_price,
                self.gas_limit,
            ),
        }
    }
}

/// Builds [`PendingTransaction`]s from the candidate set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionBuilder {
    policy: MissingOraclePolicy,
}

impl TransactionBuilder {
    pub fn new(policy: MissingOraclePolicy) -> Self {
        Self { policy }
    }

    /// Build the transaction for the current candidate set.
    ///
    /// Returns `None` when there is nothing to liquidate, or when a price
    /// update is required, no oracle payload is available and the policy is
    /// [`MissingOraclePolicy::DropAll`].
    pub fn build(
        &self,
        store: &CandidateStore,
        oracle: Option<&dyn PriceOracle>,
        gas_price: u128,
    ) -> Option<PendingTransaction> {
        let aggregate = store.aggregate();
        if aggregate.is_empty() {
            return None;
        }

        if !aggregate.needs_price_update {
            return Some(PendingTransaction::from_aggregate(
                TxKind::Plain,
                aggregate,
                None,
                gas_price,
            ));
        }

        if let Some(prices) = oracle.and_then(|o| o.postable_data()) {
            return Some(PendingTransaction::from_aggregate(
                TxKind::WithPriceUpdate,
                aggregate,
                Some(prices),
                gas_price,
            ));
        }

        match self.policy {
            MissingOraclePolicy::DropAll => {
                warn!(
                    candidates = aggregate.len(),
                    oracle = oracle.map(|o| o.name()).unwrap_or("none"),
                    "Price update required but no oracle data, dropping transaction"
                );
                None
            }
            MissingOraclePolicy::SkipPriceUpdates => {
                let plain = store.aggregate_where(|c| !c.needs_price_update);
                debug!(
                    kept = plain.len(),
                    skipped = aggregate.len() - plain.len(),
                    "Price update required but no oracle data, skipping those candidates"
                );
                if plain.is_empty() {
                    return None;
                }
                Some(PendingTransaction::from_aggregate(
                    TxKind::Plain,
                    plain,
                    None,
                    gas_price,
                ))
            }
        }
    }
}
