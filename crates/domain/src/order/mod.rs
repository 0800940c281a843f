//! Order aggregate and related types.

mod aggregate;
mod events;
mod number;
mod state;
mod value_objects;

pub use aggregate::{DEFAULT_CANCELLATION_REASON, MAX_NOTES_LEN, NewOrder, Order, normalize_notes};
pub use events::{
    NotesAmendedData, OrderCancelledData, OrderEvent, OrderPlacedData, StatusChangedData,
};
pub use number::{OrderNumber, OrderNumberError};
pub use state::OrderStatus;
pub use value_objects::{
    OrderLine, PaymentMethod, PaymentStatus, ShippingAddress, ShippingAddressInput,
};

use thiserror::Error;

use crate::error::ValidationError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requester does not own the order.
    #[error("Not authorized to access this order")]
    Forbidden,

    /// Delivered orders cannot be cancelled.
    #[error("Cannot cancel delivered orders")]
    CannotCancelDelivered,

    /// The order was already cancelled.
    #[error("Order is already cancelled")]
    AlreadyCancelled,

    /// Order is not in the expected status.
    #[error("Invalid state transition: cannot {action} from {current} status")]
    InvalidStateTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// Order has no lines.
    #[error("Order has no lines")]
    NoLines,

    /// The order total does not fit in the money range.
    #[error("Order total is too large")]
    TotalOverflow,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
