//! Bus events consumed by the bidder and the in-process bus carrying them.
//!
//! Events arrive either from in-process publishers (typed [`BusEvent`]s) or
//! as JSON lines (`{"topic": "...", "data": {...}}`) parsed into
//! [`WireEvent`]s.

use alloy::primitives::{Address, U256};
use liquidator_chain::{PostableData, PriceOracle, SignedPriceFeed};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::u256_math::ether_str;

pub const TOPIC_LIQUIDATE: &str = "Candidate.Liquidate";
pub const TOPIC_LIQUIDATE_WITH_PRICE_UPDATE: &str = "Candidate.LiquidateWithPriceUpdate";
pub const TOPIC_CHECK_COMPLETE: &str = "Message.CheckCandidatesLiquidityComplete";
pub const TOPIC_ORACLE_SET: &str = "Oracle.Set";

/// Default capacity of the broadcast channel: the most events a slow
/// subscriber can fall behind before it starts losing the oldest.
pub const DEFAULT_BUS_CAPACITY: usize = 1_024;

/// Payload of both candidate topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationCandidate {
    /// Borrower
    pub address: Address,
    pub repay_token_id: Address,
    pub seize_token_id: Address,
    /// Estimated profit, decimal string in settlement units
    #[serde(with = "ether_str")]
    pub profitability: U256,
}

/// Event as delivered to the bidder.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Liquidate(LiquidationCandidate),
    LiquidateWithPriceUpdate(LiquidationCandidate),
    /// Sweep candidates older than `time` milliseconds
    CheckComplete { time: u64 },
    OracleSet(Arc<dyn PriceOracle>),
}

impl BusEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BusEvent::Liquidate(_) => TOPIC_LIQUIDATE,
            BusEvent::LiquidateWithPriceUpdate(_) => TOPIC_LIQUIDATE_WITH_PRICE_UPDATE,
            BusEvent::CheckComplete { .. } => TOPIC_CHECK_COMPLETE,
            BusEvent::OracleSet(_) => TOPIC_ORACLE_SET,
        }
    }
}

/// Serialized form of a [`BusEvent`].
///
/// `Oracle.Set` carries the signed payload itself; it becomes a
/// [`SignedPriceFeed`] holding that payload, expiring after `maxAgeMs`
/// when given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data")]
pub enum WireEvent {
    #[serde(rename = "Candidate.Liquidate")]
    Liquidate(LiquidationCandidate),
    #[serde(rename = "Candidate.LiquidateWithPriceUpdate")]
    LiquidateWithPriceUpdate(LiquidationCandidate),
    #[serde(rename = "Message.CheckCandidatesLiquidityComplete")]
    CheckComplete { time: u64 },
    #[serde(rename = "Oracle.Set")]
    OracleSet {
        name: String,
        prices: PostableData,
        #[serde(default, rename = "maxAgeMs", skip_serializing_if = "Option::is_none")]
        max_age_ms: Option<u64>,
    },
}

impl From<WireEvent> for BusEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Liquidate(candidate) => BusEvent::Liquidate(candidate),
            WireEvent::LiquidateWithPriceUpdate(candidate) => {
                BusEvent::LiquidateWithPriceUpdate(candidate)
            }
            WireEvent::CheckComplete { time } => BusEvent::CheckComplete { time },
            WireEvent::OracleSet { name, prices, max_age_ms } => {
                let mut feed = SignedPriceFeed::with_data(name, prices);
                if let Some(ms) = max_age_ms {
                    feed = feed.with_max_age(Duration::from_millis(ms));
                }
                BusEvent::OracleSet(Arc::new(feed))
            }
        }
    }
}

/// Parse one JSON line into an event.
pub fn parse_event_line(line: &str) -> serde_json::Result<BusEvent> {
    serde_json::from_str::<WireEvent>(line).map(BusEvent::from)
}

/// Cloneable publish/subscribe handle.
///
/// Each subscriber buffers at most `capacity` events. A subscriber that
/// falls further behind loses the oldest ones and is told how many on its
/// next `recv` (`RecvError::Lagged`); it then continues from the oldest
/// event still buffered.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: BusEvent) -> usize {
        let topic = event.topic();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(topic, "No subscribers, event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::parse_wad;

    #[test]
    fn test_parse_candidate_line() {
        let line = r#"{"topic":"Candidate.LiquidateWithPriceUpdate","data":{
            "address":"0x1111111111111111111111111111111111111111",
            "repayTokenId":"0x2222222222222222222222222222222222222222",
            "seizeTokenId":"0x3333333333333333333333333333333333333333",
            "profitability":"0.6"}}"#;

        let event = parse_event_line(line).unwrap();
        assert_eq!(event.topic(), TOPIC_LIQUIDATE_WITH_PRICE_UPDATE);
        match event {
            BusEvent::LiquidateWithPriceUpdate(candidate) => {
                assert_eq!(candidate.address, Address::repeat_byte(0x11));
                assert_eq!(candidate.seize_token_id, Address::repeat_byte(0x33));
                assert_eq!(candidate.profitability, parse_wad("0.6").unwrap());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_sweep_line() {
        let event = parse_event_line(
            r#"{"topic":"Message.CheckCandidatesLiquidityComplete","data":{"time":30000}}"#,
        )
        .unwrap();
        assert!(matches!(event, BusEvent::CheckComplete { time: 30_000 }));
    }

    #[test]
    fn test_parse_oracle_line() {
        let line = r#"{"topic":"Oracle.Set","data":{"name":"reporter","prices":{
            "messages":["0x01"],"signatures":["0x02"],"symbols":["BTC"]}}}"#;

        match parse_event_line(line).unwrap() {
            BusEvent::OracleSet(oracle) => {
                assert_eq!(oracle.name(), "reporter");
                let data = oracle.postable_data().unwrap();
                assert_eq!(data.symbols, vec!["BTC".to_string()]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unknown_topic_rejected() {
        assert!(parse_event_line(r#"{"topic":"Candidate.Ignore","data":{}}"#).is_err());
        assert!(parse_event_line("not json").is_err());
    }

    #[test]
    fn test_bad_profitability_rejected() {
        let line = r#"{"topic":"Candidate.Liquidate","data":{
            "address":"0x1111111111111111111111111111111111111111",
            "repayTokenId":"0x2222222222222222222222222222222222222222",
            "seizeTokenId":"0x3333333333333333333333333333333333333333",
            "profitability":"lots"}}"#;
        assert!(parse_event_line(line).is_err());
    }

    #[tokio::test]
    async fn test_bus_delivers_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(BusEvent::CheckComplete { time: 1 }), 1);
        bus.publish(BusEvent::CheckComplete { time: 2 });

        assert!(matches!(rx.recv().await.unwrap(), BusEvent::CheckComplete { time: 1 }));
        assert!(matches!(rx.recv().await.unwrap(), BusEvent::CheckComplete { time: 2 }));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_loses_at_most_overflow() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for time in 1..=5 {
            bus.publish(BusEvent::CheckComplete { time });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!(matches!(rx.recv().await.unwrap(), BusEvent::CheckComplete { time: 4 }));
        assert!(matches!(rx.recv().await.unwrap(), BusEvent::CheckComplete { time: 5 }));
    }

    #[test]
    fn test_oracle_set_max_age() {
        let line = r#"{"topic":"Oracle.Set","data":{"name":"reporter","maxAgeMs":0,"prices":{
            "messages":["0x01"],"signatures":["0x02"],"symbols":["BTC"]}}}"#;

        match parse_event_line(line).unwrap() {
            BusEvent::OracleSet(oracle) => {
                std::thread::sleep(Duration::from_millis(5));
                assert!(oracle.postable_data().is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(BusEvent::CheckComplete { time: 1 }), 0);
    }
}
