//! Event types and the in-process event bus
//!
//! Events flow from the aggregator, the mode state and the background jobs to
//! every real-time subscriber (WebSocket and SSE connections).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Tableau event types
///
/// Serialized with an internal `type` tag so clients can dispatch on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TableauEvent {
    /// The current dashboard mode changed
    ModeChanged {
        /// Mode before the transition
        from: String,
        /// Mode after the transition
        to: String,
        /// Monotonic mode-state version after the transition
        version: u64,
        timestamp: DateTime<Utc>,
    },

    /// A composed dashboard snapshot is ready for subscribers
    ///
    /// The snapshot is carried as JSON so this crate does not depend on the
    /// aggregator's result type.
    SnapshotPublished {
        mode: String,
        snapshot: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// A rotation pool was rebuilt outside the request path
    PoolRefreshed {
        category: String,
        filter_signature: String,
        items: usize,
        timestamp: DateTime<Utc>,
    },
}

impl TableauEvent {
    /// Event name for SSE `event:` fields and logging
    pub fn event_type(&self) -> &'static str {
        match self {
            TableauEvent::ModeChanged { .. } => "ModeChanged",
            TableauEvent::SnapshotPublished { .. } => "SnapshotPublished",
            TableauEvent::PoolRefreshed { .. } => "PoolRefreshed",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`:
/// - publishing never blocks on slow subscribers
/// - subscribers only see events emitted after they subscribe
/// - lagging subscribers lose the oldest events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TableauEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TableauEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TableauEvent,
    ) -> Result<usize, broadcast::error::SendError<TableauEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TableauEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_changed() -> TableauEvent {
        TableauEvent::ModeChanged {
            from: "morning".to_string(),
            to: "evening".to_string(),
            version: 2,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(mode_changed()).is_err());
        // Lossy variant swallows the error
        bus.emit_lossy(mode_changed());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        assert_eq!(bus.emit(mode_changed()).unwrap(), 1);

        match rx.recv().await.unwrap() {
            TableauEvent::ModeChanged { to, version, .. } => {
                assert_eq!(to, "evening");
                assert_eq!(version, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_serialized_tag_matches_event_type() {
        let event = mode_changed();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "modeChanged");
        assert_eq!(event.event_type(), "ModeChanged");
    }
}
