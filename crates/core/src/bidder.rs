//! Bid controller: profitability gating, submission and replace-by-fee.
//!
//! The controller owns the candidate store and the single pending
//! transaction. Event handlers only update that cached state; submissions
//! happen exclusively on [`BidController::tick`].

use alloy::primitives::{B256, U256};
use anyhow::Result;
use liquidator_chain::{GasStrategy, LiquidatorContract, PriceOracle, QueueError, TxQueue, GWEI};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::candidates::CandidateStore;
use crate::config::BotConfig;
use crate::events::{BusEvent, LiquidationCandidate};
use crate::fees::{initial_gas_price, Gate};
use crate::tx_builder::{MissingOraclePolicy, PendingTransaction, TransactionBuilder};
use crate::u256_math::wad_to_f64;

/// The controller bids through a single queue slot.
const SUBMISSION_SLOT: usize = 0;

/// Runtime parameters of the controller.
#[derive(Debug, Clone)]
pub struct BidderConfig {
    /// Tick period
    pub interval: Duration,
    /// Fee ceiling (WAD)
    pub max_fee: U256,
    /// Damping of the market price for a fresh bid
    pub initial_bid_bps: u16,
    pub missing_oracle_policy: MissingOraclePolicy,
}

impl From<&BotConfig> for BidderConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            interval: config.bidding.interval(),
            max_fee: config.bidding.max_fee,
            initial_bid_bps: config.bidding.initial_bid_bps,
            missing_oracle_policy: config.bidding.missing_oracle_policy,
        }
    }
}

/// Whether the controller currently has a bid on the submission slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidState {
    Idle,
    Submitted,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No pending transaction; any live submission was withdrawn
    Idle,
    /// The gate failed for the current price; submissions were withdrawn
    Withdrawn(Gate),
    /// First submission into an empty slot
    Submitted { tx_hash: B256, gas_price: u128 },
    /// Live submission replaced at a higher price
    Rebid { tx_hash: B256, gas_price: u128 },
    /// Outbidding would fail the gate; the live submission was left as is
    Held { proposed: u128, gate: Gate },
    /// Controller has been stopped
    Stopped,
}

/// Periodic bidding state machine.
pub struct BidController {
    store: CandidateStore,
    pending: Option<PendingTransaction>,
    oracle: Option<Arc<dyn PriceOracle>>,
    builder: TransactionBuilder,
    contract: LiquidatorContract,
    queue: Arc<dyn TxQueue>,
    gas: Arc<dyn GasStrategy>,
    config: BidderConfig,
    state: BidState,
    /// Last rebuild failed; the next tick retries it
    rebuild_pending: bool,
    stopped: bool,
}

impl BidController {
    pub fn new(
        contract: LiquidatorContract,
        queue: Arc<dyn TxQueue>,
        gas: Arc<dyn GasStrategy>,
        config: BidderConfig,
    ) -> Self {
        Self {
            store: CandidateStore::new(),
            pending: None,
            oracle: None,
            builder: TransactionBuilder::new(config.missing_oracle_policy),
            contract,
            queue,
            gas,
            config,
            state: BidState::Idle,
            rebuild_pending: false,
            stopped: false,
        }
    }

    pub fn config(&self) -> &BidderConfig {
        &self.config
    }

    pub fn store(&self) -> &CandidateStore {
        &self.store
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    pub fn state(&self) -> BidState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Run one bidding round.
    #[instrument(skip(self), fields(candidates = self.store.len()))]
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if self.stopped {
            return Ok(TickOutcome::Stopped);
        }

        self.queue.refresh().await?;

        if self.rebuild_pending {
            debug!("Retrying failed rebuild");
            self.rebuild().await?;
        }

        let Some(tx) = self.pending.clone() else {
            self.withdraw_all().await?;
            return Ok(TickOutcome::Idle);
        };

        let fee = tx.fee();
        let gate = Gate::check(fee, self.config.max_fee, tx.revenue_snapshot);
        if !gate.passed() {
            info!(
                reason = gate.as_str(),
                fee_eth = wad_to_f64(fee),
                revenue_eth = wad_to_f64(tx.revenue_snapshot),
                max_fee_eth = wad_to_f64(self.config.max_fee),
                "Not profitable, withdrawing"
            );
            self.withdraw_all().await?;
            return Ok(TickOutcome::Withdrawn(gate));
        }

        let queued = tx.to_queued(&self.contract);

        if self.queue.is_empty() {
            let tx_hash = self.queue.append(queued).await?;
            self.state = BidState::Submitted;
            info!(
                tx_hash = %tx_hash,
                kind = tx.kind.as_str(),
                borrowers = tx.borrowers.len(),
                gas_price_gwei = tx.gas_price as f64 / GWEI as f64,
                fee_eth = wad_to_f64(fee),
                revenue_eth = wad_to_f64(tx.revenue_snapshot),
                "Liquidation submitted"
            );
            return Ok(TickOutcome::Submitted {
                tx_hash,
                gas_price: tx.gas_price,
            });
        }

        let proposed = match self.queue.propose_replacement(SUBMISSION_SLOT, &queued).await {
            Ok(price) => price,
            Err(e) => {
                if let Some(QueueError::AboveCap { required, .. }) =
                    e.downcast_ref::<QueueError>()
                {
                    debug!(required, "Replacement above gas price cap, holding bid");
                    return Ok(TickOutcome::Held {
                        proposed: *required,
                        gate: Gate::AboveCeiling,
                    });
                }
                return Err(e);
            }
        };

        let proposed_fee = tx.fee_at(proposed);
        let gate = Gate::check(proposed_fee, self.config.max_fee, tx.revenue_snapshot);
        if !gate.passed() {
            debug!(
                reason = gate.as_str(),
                proposed_gwei = proposed as f64 / GWEI as f64,
                proposed_fee_eth = wad_to_f64(proposed_fee),
                "Outbid ceiling reached, holding current bid"
            );
            return Ok(TickOutcome::Held { proposed, gate });
        }

        let tx_hash = self
            .queue
            .replace(SUBMISSION_SLOT, queued.with_gas_price(proposed))
            .await?;
        if let Some(pending) = self.pending.as_mut() {
            pending.gas_price = proposed;
        }
        self.state = BidState::Submitted;

        info!(
            tx_hash = %tx_hash,
            borrowers = tx.borrowers.len(),
            previous_gwei = tx.gas_price as f64 / GWEI as f64,
            gas_price_gwei = proposed as f64 / GWEI as f64,
            fee_eth = wad_to_f64(proposed_fee),
            "Re-bid"
        );
        Ok(TickOutcome::Rebid {
            tx_hash,
            gas_price: proposed,
        })
    }

    /// Dispatch one bus event to its handler.
    pub async fn on_event(&mut self, event: BusEvent, now_ms: u64) -> Result<()> {
        match event {
            BusEvent::Liquidate(candidate) => self.on_new_candidate(candidate, false, now_ms).await,
            BusEvent::LiquidateWithPriceUpdate(candidate) => {
                self.on_new_candidate(candidate, true, now_ms).await
            }
            BusEvent::CheckComplete { time } => self.on_stale_sweep(time, now_ms).await,
            BusEvent::OracleSet(oracle) => {
                self.on_oracle_set(oracle);
                Ok(())
            }
        }
    }

    #[instrument(skip(self, candidate), fields(borrower = %candidate.address))]
    pub async fn on_new_candidate(
        &mut self,
        candidate: LiquidationCandidate,
        needs_price_update: bool,
        now_ms: u64,
    ) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        let is_new = self.store.upsert(
            candidate.address,
            candidate.repay_token_id,
            candidate.seize_token_id,
            needs_price_update,
            candidate.profitability,
            now_ms,
        );
        debug!(
            is_new,
            needs_price_update,
            revenue_eth = wad_to_f64(candidate.profitability),
            "Candidate upserted"
        );

        self.rebuild().await
    }

    #[instrument(skip(self))]
    pub async fn on_stale_sweep(&mut self, max_age_ms: u64, now_ms: u64) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        let evicted = self.store.evict_stale(max_age_ms, now_ms);
        if !evicted.is_empty() {
            debug!(
                evicted = evicted.len(),
                remaining = self.store.len(),
                "Stale candidates evicted"
            );
        }

        self.rebuild().await
    }

    /// Replace the active oracle. Takes effect on the next rebuild.
    pub fn on_oracle_set(&mut self, oracle: Arc<dyn PriceOracle>) {
        info!(oracle = oracle.name(), "Oracle set");
        self.oracle = Some(oracle);
    }

    /// Forget every candidate and withdraw every submission.
    pub async fn reset(&mut self) -> Result<()> {
        self.store.clear();
        self.pending = None;
        self.rebuild_pending = false;
        self.withdraw_all().await
    }

    /// Reset and halt permanently. Safe to call more than once.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        if let Err(e) = self.reset().await {
            warn!(error = %e, "Withdraw during stop failed");
        }
        self.stopped = true;
        info!("Bid controller stopped");
    }

    /// Recompute the pending transaction from the candidate set.
    ///
    /// On failure the candidate set is kept and the rebuild is retried by
    /// the next tick.
    async fn rebuild(&mut self) -> Result<()> {
        if self.store.is_empty() {
            self.pending = None;
            self.rebuild_pending = false;
            return Ok(());
        }

        let previous = self.pending.as_ref().map(|tx| tx.gas_price);
        let fetched =
            initial_gas_price(previous, self.gas.as_ref(), self.config.initial_bid_bps).await;
        self.rebuild_pending = fetched.is_err();
        let gas_price = fetched?;

        self.pending = self
            .builder
            .build(&self.store, self.oracle.as_deref(), gas_price);

        match &self.pending {
            Some(tx) => debug!(
                kind = tx.kind.as_str(),
                borrowers = tx.borrowers.len(),
                gas_limit = tx.gas_limit,
                gas_price_gwei = tx.gas_price as f64 / GWEI as f64,
                revenue_eth = wad_to_f64(tx.revenue_snapshot),
                "Pending transaction rebuilt"
            ),
            None => debug!(candidates = self.store.len(), "No pending transaction"),
        }
        Ok(())
    }

    /// Dump every occupied slot, trying all of them before reporting the
    /// first failure.
    async fn withdraw_all(&mut self) -> Result<()> {
        let slots = self.queue.len();
        let mut first_error = None;

        for index in 0..slots {
            if let Err(e) = self.queue.dump(index).await {
                warn!(index, error = %e, "Dump failed");
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if slots > 0 && self.state == BidState::Submitted {
            info!(slots, "Submissions withdrawn");
        }
        self.state = BidState::Idle;
        Ok(())
    }
}

impl std::fmt::Debug for BidController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BidController")
            .field("candidates", &self.store.len())
            .field("pending", &self.pending.is_some())
            .field("state", &self.state)
            .field("stopped", &self.stopped)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
