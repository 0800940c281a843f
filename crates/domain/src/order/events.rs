//! Order domain events.

use chrono::{DateTime, Utc};
use common::{Identity, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderLine, OrderNumber, PaymentMethod, ShippingAddress};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed at checkout.
    OrderPlaced(OrderPlacedData),

    /// Fulfillment started preparing the order.
    OrderProcessing(StatusChangedData),

    /// Order left the warehouse.
    OrderShipped(StatusChangedData),

    /// Order reached the customer.
    OrderDelivered(StatusChangedData),

    /// Order was cancelled and its stock returned.
    OrderCancelled(OrderCancelledData),

    /// Administrative notes were replaced.
    OrderNotesAmended(NotesAmendedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderProcessing(_) => "OrderProcessing",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderNotesAmended(_) => "OrderNotesAmended",
        }
    }
}

impl OrderEvent {
    /// Returns when the event happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(data) => data.placed_at,
            OrderEvent::OrderProcessing(data)
            | OrderEvent::OrderShipped(data)
            | OrderEvent::OrderDelivered(data) => data.at,
            OrderEvent::OrderCancelled(data) => data.cancelled_at,
            OrderEvent::OrderNotesAmended(data) => data.at,
        }
    }
}

/// Data for OrderPlaced event.
///
/// Carries the full order as created by checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub identity: Identity,
    pub order_number: OrderNumber,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items_price: Money,
    pub shipping_price: Money,
    pub tax_price: Money,
    pub total_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

/// Data for the forward status events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for OrderNotesAmended event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesAmendedData {
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_tagging() {
        let at = Utc::now();
        let event = OrderEvent::OrderCancelled(OrderCancelledData {
            reason: "changed my mind".to_string(),
            cancelled_at: at,
        });
        assert_eq!(event.event_type(), "OrderCancelled");
        assert_eq!(event.occurred_at(), at);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderCancelled");
        assert_eq!(json["data"]["reason"], "changed my mind");
    }

    #[test]
    fn test_status_event_roundtrip() {
        let event = OrderEvent::OrderShipped(StatusChangedData { at: Utc::now() });
        let json = serde_json::to_string(&event).unwrap();
        let back: OrderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
