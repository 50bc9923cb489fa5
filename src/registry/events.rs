//! Simulator event bus
//!
//! tokio broadcast pub/sub: stations publish lifecycle events, control-plane
//! servers subscribe and forward them to their clients.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SimulatorEvent {
    #[serde(rename_all = "camelCase")]
    Started { hash_id: String, station_id: String },
    #[serde(rename_all = "camelCase")]
    Stopped { hash_id: String, station_id: String },
    /// BootNotification sent, waiting for the CSMS verdict.
    #[serde(rename_all = "camelCase")]
    Registered { hash_id: String, station_id: String },
    #[serde(rename_all = "camelCase")]
    Accepted { hash_id: String, station_id: String },
    /// Configuration or state changed (persisted snapshot refreshed).
    #[serde(rename_all = "camelCase")]
    Updated { hash_id: String, station_id: String },
    #[serde(rename_all = "camelCase")]
    ConnectorStatusChanged {
        hash_id: String,
        station_id: String,
        connector_id: u32,
        status: String,
    },
    #[serde(rename_all = "camelCase")]
    TransactionStarted {
        hash_id: String,
        station_id: String,
        connector_id: u32,
        transaction_id: String,
    },
    #[serde(rename_all = "camelCase")]
    TransactionStopped {
        hash_id: String,
        station_id: String,
        connector_id: u32,
        transaction_id: String,
    },
}

impl SimulatorEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Stopped { .. } => "stopped",
            Self::Registered { .. } => "registered",
            Self::Accepted { .. } => "accepted",
            Self::Updated { .. } => "updated",
            Self::ConnectorStatusChanged { .. } => "connectorStatusChanged",
            Self::TransactionStarted { .. } => "transactionStarted",
            Self::TransactionStopped { .. } => "transactionStopped",
        }
    }

    pub fn hash_id(&self) -> &str {
        match self {
            Self::Started { hash_id, .. }
            | Self::Stopped { hash_id, .. }
            | Self::Registered { hash_id, .. }
            | Self::Accepted { hash_id, .. }
            | Self::Updated { hash_id, .. }
            | Self::ConnectorStatusChanged { hash_id, .. }
            | Self::TransactionStarted { hash_id, .. }
            | Self::TransactionStopped { hash_id, .. } => hash_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    #[serde(flatten)]
    pub event: SimulatorEvent,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: SimulatorEvent) {
        let message = EventMessage {
            timestamp: Utc::now(),
            event,
        };
        match self.sender.send(message) {
            Ok(count) => {
                debug!(subscribers = count, "Event published");
            }
            Err(_) => {
                // No subscribers; normal when no UI client is connected.
            }
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        let receiver = self.sender.subscribe();
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        EventSubscriber {
            receiver,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "Event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();

        bus.publish(SimulatorEvent::Accepted {
            hash_id: "abc".into(),
            station_id: "CS-1".into(),
        });

        let message = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            subscriber.recv(),
        )
        .await
        .expect("timeout")
        .expect("no message");
        assert_eq!(message.event.event_type(), "accepted");
        assert_eq!(message.event.hash_id(), "abc");
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
