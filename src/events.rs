use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::ItemRef;

/// Events the engine publishes for external gateways (notifications,
/// analytics) to subscribe to; the core holds no transport handle
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BatchGenerated {
        batch_id: Uuid,
        user_id: Uuid,
        recommendation_count: usize,
        confidence: u8,
    },
    FeedbackRecorded {
        batch_id: Uuid,
        item: ItemRef,
        helpful: bool,
    },
}

/// Broadcast fan-out for domain events
///
/// Publishing never blocks and never fails the request; with no subscribers
/// the event is simply dropped.
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!(event = ?event, "Publishing domain event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}
