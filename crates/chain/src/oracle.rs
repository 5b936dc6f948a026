//! Signed price payloads for liquidations that need a fresh oracle price.
//!
//! Some liquidations only become valid after a new price is posted on chain.
//! The liquidator contract accepts the signed messages, their signatures and
//! the asset symbols alongside the batch, so the oracle side of the bidder
//! only has to hand over whatever payload it currently holds.

use alloy::primitives::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::debug;

/// Price update payload, index-aligned across the three sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostableData {
    pub messages: Vec<Bytes>,
    pub signatures: Vec<Bytes>,
    pub symbols: Vec<String>,
}

impl PostableData {
    pub fn new(messages: Vec<Bytes>, signatures: Vec<Bytes>, symbols: Vec<String>) -> Self {
        Self {
            messages,
            signatures,
            symbols,
        }
    }

    /// Number of prices in the payload.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// A payload can be posted only when it is non-empty and aligned.
    pub fn is_postable(&self) -> bool {
        !self.is_empty()
            && self.messages.len() == self.signatures.len()
            && self.messages.len() == self.symbols.len()
    }
}

/// Source of postable price data.
pub trait PriceOracle: Send + Sync + Debug {
    /// Current payload, or `None` when nothing postable is available.
    fn postable_data(&self) -> Option<PostableData>;

    /// Name for logging.
    fn name(&self) -> &str;
}

/// In-process holder for the latest signed price payload.
///
/// Whatever receives signed prices (a reporter feed, an `Oracle.Set` event)
/// pushes them here; the bidder reads them when building a transaction.
#[derive(Debug)]
pub struct SignedPriceFeed {
    name: String,
    latest: RwLock<Option<(PostableData, Instant)>>,
    max_age: Option<Duration>,
}

impl SignedPriceFeed {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest: RwLock::new(None),
            max_age: None,
        }
    }

    /// Create a feed seeded with a payload.
    pub fn with_data(name: impl Into<String>, data: PostableData) -> Self {
        let feed = Self::new(name);
        feed.update(data);
        feed
    }

    /// Treat payloads older than `max_age` as unavailable.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Replace the held payload.
    pub fn update(&self, data: PostableData) {
        debug!(
            feed = %self.name,
            prices = data.len(),
            symbols = ?data.symbols,
            "Signed price payload updated"
        );
        *self.latest.write() = Some((data, Instant::now()));
    }

    /// Drop the held payload.
    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

impl PriceOracle for SignedPriceFeed {
    fn postable_data(&self) -> Option<PostableData> {
        let guard = self.latest.read();
        let (data, received_at) = guard.as_ref()?;

        if let Some(max_age) = self.max_age {
            if received_at.elapsed() > max_age {
                return None;
            }
        }

        data.is_postable().then(|| data.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: usize) -> PostableData {
        PostableData::new(
            (0..n).map(|i| Bytes::from(vec![i as u8; 32])).collect(),
            (0..n).map(|i| Bytes::from(vec![i as u8; 65])).collect(),
            (0..n).map(|i| format!("SYM{i}")).collect(),
        )
    }

    #[test]
    fn test_postable_alignment() {
        assert!(payload(2).is_postable());
        assert!(!PostableData::default().is_postable());

        let mut misaligned = payload(2);
        misaligned.symbols.pop();
        assert!(!misaligned.is_postable());
    }

    #[test]
    fn test_payload_json_shape() {
        let json = r#"{"messages":["0x0102"],"signatures":["0x03"],"symbols":["ETH"]}"#;
        let data: PostableData = serde_json::from_str(json).unwrap();
        assert_eq!(data.messages[0], Bytes::from(vec![1u8, 2]));
        assert!(data.is_postable());
        assert_eq!(serde_json::to_string(&data).unwrap(), json);
    }

    #[test]
    fn test_feed_update_and_clear() {
        let feed = SignedPriceFeed::new("reporter");
        assert!(feed.postable_data().is_none());

        feed.update(payload(3));
        assert_eq!(feed.postable_data().unwrap().len(), 3);

        feed.clear();
        assert!(feed.postable_data().is_none());
    }

    #[test]
    fn test_feed_rejects_misaligned_payload() {
        let mut data = payload(2);
        data.signatures.clear();
        let feed = SignedPriceFeed::with_data("reporter", data);
        assert!(feed.postable_data().is_none());
    }

    #[test]
    fn test_feed_max_age() {
        let feed = SignedPriceFeed::with_data("reporter", payload(1))
            .with_max_age(Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(2));
        assert!(feed.postable_data().is_none());

        let fresh = SignedPriceFeed::with_data("reporter", payload(1))
            .with_max_age(Duration::from_secs(60));
        assert!(fresh.postable_data().is_some());
    }
}
