//! Live Distribution Hub
//!
//! Fans new contacts out to every connected subscriber. Each subscriber is
//! an independent sink; one failing sink is removed without affecting the
//! others or the caller.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tidewatch_core::StoredContact;

/// Why a delivery to one subscriber failed
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Subscriber channel closed")]
    Closed,

    #[error("Subscriber channel full")]
    Full,

    #[error("Failed to serialize contact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A live subscriber endpoint
#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn deliver(&self, contact: &StoredContact) -> Result<(), DeliveryError>;
}

/// Sink that forwards JSON frames to a connection writer
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ContactSink for ChannelSink {
    async fn deliver(&self, contact: &StoredContact) -> Result<(), DeliveryError> {
        let frame = serde_json::to_string(contact)?;
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Registry key for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Frames buffered per connection before it counts as stalled
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub struct DistributionHub {
    subscribers: DashMap<SubscriberId, Arc<dyn ContactSink>>,
}

impl DistributionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. No history is replayed.
    pub fn connect(&self, sink: Arc<dyn ContactSink>) -> SubscriberId {
        let id = SubscriberId::new();
        self.subscribers.insert(id, sink);
        info!(
            "Subscriber {} connected. Total subscribers: {}",
            id,
            self.subscribers.len()
        );
        id
    }

    /// Register a channel-backed subscriber and hand back its frame stream
    pub fn connect_channel(&self, capacity: usize) -> (SubscriberId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.connect(Arc::new(ChannelSink::new(tx)));
        (id, rx)
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            info!(
                "Subscriber {} disconnected. Remaining subscribers: {}",
                id,
                self.subscribers.len()
            );
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver a stored contact to every subscriber, dropping the ones that fail
    pub async fn broadcast(&self, contact: &StoredContact) -> BroadcastReport {
        if !contact.contact.is_valid() {
            debug!("Not broadcasting contact without coordinates");
            return BroadcastReport::default();
        }

        // Snapshot so no map guard is held across an await
        let targets: Vec<(SubscriberId, Arc<dyn ContactSink>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let results = join_all(targets.iter().map(|(id, sink)| async move {
            (*id, sink.deliver(contact).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Dropping subscriber {}: {}", id, e);
                    self.disconnect(id);
                    report.dropped += 1;
                }
            }
        }

        debug!(
            "Broadcast contact {}: delivered {}, dropped {}",
            contact.id, report.delivered, report.dropped
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_core::{Contact, Coordinates};

    fn valid_contact() -> StoredContact {
        StoredContact {
            id: 7,
            contact: Contact::new("tanker", "2024-10-20T05:30:00Z")
                .with_position(Some(Coordinates::new(12.5, 45.25)))
                .with_speed(Some(10.0)),
        }
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_isolated() {
        let hub = DistributionHub::new();
        let (_first, mut rx1) = hub.connect_channel(8);
        let (second, rx2) = hub.connect_channel(8);
        let (_third, mut rx3) = hub.connect_channel(8);
        drop(rx2);

        let report = hub.broadcast(&valid_contact()).await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 1 });
        assert_eq!(hub.subscriber_count(), 2);
        assert!(!hub.disconnect(second));

        let frame: serde_json::Value = serde_json::from_str(&rx1.recv().await.unwrap()).unwrap();
        assert_eq!(frame["id"], 7);
        assert_eq!(frame["type"], "tanker");
        assert_eq!(frame["latitude"], 12.5);
        assert!(rx3.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_channel_drops_subscriber() {
        let hub = DistributionHub::new();
        let (_id, _rx) = hub.connect_channel(1);

        assert_eq!(hub.broadcast(&valid_contact()).await.delivered, 1);
        let report = hub.broadcast(&valid_contact()).await;
        assert_eq!(report, BroadcastReport { delivered: 0, dropped: 1 });
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_contact_not_broadcast() {
        let hub = DistributionHub::new();
        let (_id, mut rx) = hub.connect_channel(8);

        let unpositioned = StoredContact {
            id: 1,
            contact: Contact::new("tanker", "t"),
        };
        let report = hub.broadcast(&unpositioned).await;
        assert_eq!(report, BroadcastReport::default());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let hub = DistributionHub::new();
        let (id, _rx) = hub.connect_channel(8);
        assert!(hub.disconnect(id));
        assert!(!hub.disconnect(id));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
