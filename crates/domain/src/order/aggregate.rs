//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Identity, Money, OrderId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::ValidationError;
use crate::pricing::PriceBreakdown;

use super::{
    OrderError, OrderEvent, OrderLine, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingAddress,
    events::{NotesAmendedData, OrderCancelledData, OrderPlacedData, StatusChangedData},
};

/// Maximum length of order notes, in characters.
pub const MAX_NOTES_LEN: usize = 500;

/// Reason recorded when a cancellation does not give one.
pub const DEFAULT_CANCELLATION_REASON: &str = "Customer requested cancellation";

/// Trims notes and checks their length. Blank notes become `None`.
pub fn normalize_notes(notes: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(notes) = notes else {
        return Ok(None);
    };
    let notes = notes.trim();
    let len = notes.chars().count();
    if len > MAX_NOTES_LEN {
        return Err(ValidationError::NotesTooLong {
            len,
            max: MAX_NOTES_LEN,
        });
    }
    Ok((!notes.is_empty()).then(|| notes.to_string()))
}

/// Everything checkout knows about an order it is about to place.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub identity: Identity,
    pub order_number: OrderNumber,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub price: PriceBreakdown,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

/// Order aggregate root.
///
/// Created once by checkout and then moved through its lifecycle by
/// [`OrderEvent`]s. Prices and lines never change after placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    identity: Identity,
    order_number: OrderNumber,
    lines: Vec<OrderLine>,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    #[serde(rename = "orderStatus")]
    status: OrderStatus,
    items_price: Money,
    shipping_price: Money,
    tax_price: Money,
    total_price: Money,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,

    /// Current version for optimistic concurrency.
    version: Version,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn version(&self) -> Version {
        self.version
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => {
                *self = Self::from_data(data, self.version.next());
                return;
            }
            OrderEvent::OrderProcessing(data) => {
                self.status = OrderStatus::Processing;
                self.updated_at = data.at;
            }
            OrderEvent::OrderShipped(data) => {
                self.status = OrderStatus::Shipped;
                self.updated_at = data.at;
            }
            OrderEvent::OrderDelivered(data) => {
                self.status = OrderStatus::Delivered;
                self.delivered_at = Some(data.at);
                self.updated_at = data.at;
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_at = Some(data.cancelled_at);
                self.cancellation_reason = Some(data.reason);
                self.updated_at = data.cancelled_at;
            }
            OrderEvent::OrderNotesAmended(data) => {
                self.notes = data.notes;
                self.updated_at = data.at;
            }
        }
        self.version = self.version.next();
    }
}

impl Order {
    /// Builds an order from its placement event, at version 1.
    pub fn from_placed(data: OrderPlacedData) -> Self {
        Self::from_data(data, Version::first())
    }

    fn from_data(data: OrderPlacedData, version: Version) -> Self {
        Self {
            id: data.order_id,
            identity: data.identity,
            order_number: data.order_number,
            lines: data.lines,
            shipping_address: data.shipping_address,
            payment_method: data.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending,
            items_price: data.items_price,
            shipping_price: data.shipping_price,
            tax_price: data.tax_price,
            total_price: data.total_price,
            notes: data.notes,
            created_at: data.placed_at,
            updated_at: data.placed_at,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            version,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn order_number(&self) -> OrderNumber {
        self.order_number
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items_price(&self) -> Money {
        self.items_price
    }

    pub fn shipping_price(&self) -> Money {
        self.shipping_price
    }

    pub fn tax_price(&self) -> Money {
        self.tax_price
    }

    /// Returns `items_price + shipping_price + tax_price`.
    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Returns true if `requester` is the identity the order was placed under.
    pub fn is_owned_by(&self, requester: &Identity) -> bool {
        &self.identity == requester
    }

    /// Fails with `Forbidden` unless `requester` owns the order.
    pub fn authorize(&self, requester: &Identity) -> Result<(), OrderError> {
        if self.is_owned_by(requester) {
            Ok(())
        } else {
            Err(OrderError::Forbidden)
        }
    }
}

// Command methods (return events)
impl Order {
    /// Validates a new order and returns it together with its placement event.
    pub fn create(new: NewOrder) -> Result<(Order, Vec<OrderEvent>), OrderError> {
        let data = Self::placement(new)?;
        let order = Self::from_placed(data.clone());
        Ok((order, vec![OrderEvent::OrderPlaced(data)]))
    }

    fn placement(new: NewOrder) -> Result<OrderPlacedData, OrderError> {
        if new.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        let notes = normalize_notes(new.notes)?;
        let total_price = new.price.total().ok_or(OrderError::TotalOverflow)?;

        Ok(OrderPlacedData {
            order_id: new.order_id,
            identity: new.identity,
            order_number: new.order_number,
            lines: new.lines,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            items_price: new.price.items,
            shipping_price: new.price.shipping,
            tax_price: new.price.tax,
            total_price,
            notes,
            placed_at: new.placed_at,
        })
    }

    /// Cancels the order on behalf of its owner.
    ///
    /// The caller is responsible for returning the lines' quantities to stock
    /// in the same transaction that persists the event.
    pub fn cancel(
        &self,
        requester: &Identity,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.authorize(requester)?;

        if !self.status.can_cancel() {
            return Err(match self.status {
                OrderStatus::Cancelled => OrderError::AlreadyCancelled,
                _ => OrderError::CannotCancelDelivered,
            });
        }

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelledData {
            reason,
            cancelled_at: at,
        })])
    }

    /// Moves a pending order to processing.
    pub fn start_processing(&self, at: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        self.advance_to(OrderStatus::Processing, "start processing")?;
        Ok(vec![OrderEvent::OrderProcessing(StatusChangedData { at })])
    }

    /// Marks a processing order as shipped.
    pub fn ship(&self, at: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        self.advance_to(OrderStatus::Shipped, "ship")?;
        Ok(vec![OrderEvent::OrderShipped(StatusChangedData { at })])
    }

    /// Marks a shipped order as delivered.
    pub fn deliver(&self, at: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        self.advance_to(OrderStatus::Delivered, "deliver")?;
        Ok(vec![OrderEvent::OrderDelivered(StatusChangedData { at })])
    }

    /// Replaces the order notes. Allowed in every status.
    pub fn amend_notes(
        &self,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let notes = normalize_notes(notes)?;
        if notes == self.notes {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::OrderNotesAmended(NotesAmendedData {
            notes,
            at,
        })])
    }

    fn advance_to(&self, target: OrderStatus, action: &'static str) -> Result<(), OrderError> {
        if self.status.next() == Some(target) {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                current: self.status,
                action,
            })
        }
    }
}
