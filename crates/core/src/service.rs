//! Runs a [`BidController`] as a single tokio task.
//!
//! The task owns the controller outright. Commands, bus events and ticks are
//! multiplexed by one `select!`, so handler bodies never interleave and no
//! lock guards the candidate set or the pending transaction.

use chrono::Utc;
use liquidator_chain::PriceOracle;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bidder::{BidController, TickOutcome};
use crate::events::{BusEvent, EventBus};

enum Command {
    SetOracle(Arc<dyn PriceOracle>),
    Stop(oneshot::Sender<()>),
}

/// Handle to a running bidder task.
#[derive(Debug)]
pub struct BidderHandle {
    commands: mpsc::Sender<Command>,
    task: Option<JoinHandle<()>>,
}

/// Subscribe `controller` to `bus` and start ticking every
/// `controller.config().interval`.
pub fn spawn_bidder(controller: BidController, bus: &EventBus) -> BidderHandle {
    let (commands, command_rx) = mpsc::channel(16);
    let events = bus.subscribe();
    let task = tokio::spawn(run(controller, command_rx, events));

    BidderHandle {
        commands,
        task: Some(task),
    }
}

impl BidderHandle {
    /// Replace the controller's oracle.
    pub async fn set_oracle(&self, oracle: Arc<dyn PriceOracle>) {
        if self.commands.send(Command::SetOracle(oracle)).await.is_err() {
            debug!("Bidder already stopped, oracle not set");
        }
    }

    /// Withdraw every submission and halt the bidder.
    ///
    /// Returns once the task has reset the controller and exited. No tick
    /// runs after this returns. Later calls return immediately.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Stop(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        if let Err(e) = task.await {
            warn!(error = %e, "Bidder task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

async fn run(
    mut controller: BidController,
    mut commands: mpsc::Receiver<Command>,
    mut events: broadcast::Receiver<BusEvent>,
) {
    let mut ticker = interval(controller.config().interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut bus_open = true;

    info!(interval_ms = controller.config().interval.as_millis() as u64, "Bidder started");

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::SetOracle(oracle)) => controller.on_oracle_set(oracle),
                Some(Command::Stop(ack)) => {
                    controller.stop().await;
                    let _ = ack.send(());
                    break;
                }
                // Every handle dropped: nobody can stop us any more
                None => {
                    controller.stop().await;
                    break;
                }
            },

            event = events.recv(), if bus_open => match event {
                Ok(event) => {
                    let topic = event.topic();
                    if let Err(e) = controller.on_event(event, now_ms()).await {
                        warn!(topic, error = %e, "Event handler failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Bidder lagging behind the bus, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed");
                    bus_open = false;
                }
            },

            _ = ticker.tick() => match controller.tick().await {
                Ok(TickOutcome::Stopped) => break,
                Ok(outcome) => debug!(?outcome, "Tick"),
                Err(e) => warn!(error = %e, "Tick failed"),
            },
        }
    }

    info!("Bidder exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidder::tests::{candidate, controller, Call};
    use std::time::Duration;

    #[tokio::test]
    async fn test_events_then_tick_submit() {
        let (bidder, queue) = controller("0.5");
        let bus = EventBus::new(16);
        let mut handle = spawn_bidder(bidder, &bus);

        bus.publish(BusEvent::Liquidate(candidate(1, "1.0")));

        let mut submitted = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if queue.calls().iter().any(|c| matches!(c, Call::Append(_))) {
                submitted = true;
                break;
            }
        }
        assert!(submitted);

        handle.stop().await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_stop_dumps_and_halts() {
        let (bidder, queue) = controller("0.5");
        let bus = EventBus::new(16);
        let mut handle = spawn_bidder(bidder, &bus);

        bus.publish(BusEvent::Liquidate(candidate(1, "1.0")));
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !queue.slots.lock().is_empty() {
                break;
            }
        }

        handle.stop().await;
        assert_eq!(queue.dumps(), 1);

        let calls = queue.calls().len();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(queue.calls().len(), calls);

        // Second stop is a no-op
        handle.stop().await;
        assert_eq!(queue.dumps(), 1);
    }

    #[tokio::test]
    async fn test_stop_without_submission() {
        let (bidder, queue) = controller("0.5");
        let bus = EventBus::new(16);
        let mut handle = spawn_bidder(bidder, &bus);

        handle.stop().await;
        assert!(queue.calls().is_empty());
        assert_eq!(bus.publish(BusEvent::CheckComplete { time: 1 }), 0);
    }
}
