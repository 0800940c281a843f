use chrono::{DateTime, Utc};
use common::{OrderId, Version};
use domain::{Aggregate, DomainEvent, Order, OrderEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An order event as stored in the per-order history log.
///
/// Versions start at 1 with `OrderPlaced` and increase by one per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: EventId,
    pub order_id: OrderId,
    pub version: Version,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: OrderEvent,
}

impl EventRecord {
    /// Builds history records for events that were just applied to `order`.
    ///
    /// `order` must already reflect the events, so the last event gets the
    /// order's current version.
    pub fn for_applied(order: &Order, events: &[OrderEvent]) -> Vec<EventRecord> {
        let base = order.version().as_i64() - events.len() as i64;
        events
            .iter()
            .enumerate()
            .map(|(i, event)| EventRecord {
                event_id: EventId::new(),
                order_id: order.id(),
                version: Version::new(base + i as i64 + 1),
                event_type: event.event_type().to_string(),
                occurred_at: event.occurred_at(),
                payload: event.clone(),
            })
            .collect()
    }

    /// Returns the version the order had before these events were applied.
    pub fn expected_version(order: &Order, events: &[OrderEvent]) -> Version {
        Version::new(order.version().as_i64() - events.len() as i64)
    }
}
