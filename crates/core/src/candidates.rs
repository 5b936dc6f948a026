//! Liquidation candidate bookkeeping.
//!
//! One entry per borrower address. Entries are refreshed in place by repeat
//! events and evicted when they have not been seen within a sweep window.
//! Iteration order is by address, which keeps every aggregate (and therefore
//! every encoded transaction) deterministic.

use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;

/// A borrower currently eligible for liquidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Borrower address (unique key)
    pub borrower: Address,
    /// Market whose debt is repaid
    pub repay_token: Address,
    /// Market whose collateral is seized
    pub seize_token: Address,
    /// Liquidation only works after posting a fresh oracle price
    pub needs_price_update: bool,
    /// Estimated profit (WAD)
    pub revenue: U256,
    /// Last refresh, unix milliseconds
    pub last_seen_ms: u64,
}

/// Index-aligned view of a set of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateAggregate {
    pub borrowers: Vec<Address>,
    pub repay_tokens: Vec<Address>,
    pub seize_tokens: Vec<Address>,
    /// Sum of revenue over exactly the listed borrowers (WAD)
    pub revenue: U256,
    /// True if any listed candidate needs a price update
    pub needs_price_update: bool,
}

impl CandidateAggregate {
    pub fn len(&self) -> usize {
        self.borrowers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.borrowers.is_empty()
    }

    fn push(&mut self, candidate: &Candidate) {
        self.borrowers.push(candidate.borrower);
        self.repay_tokens.push(candidate.repay_token);
        self.seize_tokens.push(candidate.seize_token);
        self.revenue += candidate.revenue;
        self.needs_price_update |= candidate.needs_price_update;
    }
}

/// Borrower → candidate map.
#[derive(Debug, Default)]
pub struct CandidateStore {
    candidates: BTreeMap<Address, Candidate>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `borrower`.
    ///
    /// Returns `true` when the borrower was not tracked before. The return
    /// value is informational only.
    pub fn upsert(
        &mut self,
        borrower: Address,
        repay_token: Address,
        seize_token: Address,
        needs_price_update: bool,
        revenue: U256,
        now_ms: u64,
    ) -> bool {
        let candidate = Candidate {
            borrower,
            repay_token,
            seize_token,
            needs_price_update,
            revenue,
            last_seen_ms: now_ms,
        };
        self.candidates.insert(borrower, candidate).is_none()
    }

    /// Remove every candidate with `now - last_seen > max_age_ms`.
    ///
    /// Returns the evicted borrowers.
    pub fn evict_stale(&mut self, max_age_ms: u64, now_ms: u64) -> Vec<Address> {
        let mut evicted = Vec::new();
        self.candidates.retain(|borrower, candidate| {
            let fresh = now_ms.saturating_sub(candidate.last_seen_ms) <= max_age_ms;
            if !fresh {
                evicted.push(*borrower);
            }
            fresh
        });
        evicted
    }

    /// Aggregate of all candidates, ordered by borrower address.
    pub fn aggregate(&self) -> CandidateAggregate {
        self.aggregate_where(|_| true)
    }

    /// Aggregate of the candidates matching `include`, ordered by address.
    pub fn aggregate_where<F>(&self, include: F) -> CandidateAggregate
    where
        F: Fn(&Candidate) -> bool,
    {
        let mut aggregate = CandidateAggregate::default();
        for candidate in self.candidates.values().filter(|c| include(c)) {
            aggregate.push(candidate);
        }
        aggregate
    }

    pub fn get(&self, borrower: &Address) -> Option<&Candidate> {
        self.candidates.get(borrower)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }

    /// Total revenue of all tracked candidates (WAD).
    pub fn total_revenue(&self) -> U256 {
        self.candidates.values().map(|c| c.revenue).sum()
    }
}
