//! Service-level error types.

use common::{LineId, ProductId};
use domain::{CartError, OrderError, ValidationError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the cart, checkout and order lifecycle services.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Malformed or incomplete input.
    #[error("{0}")]
    InvalidArgument(String),

    /// The product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The cart line is not in the cart.
    #[error("Item not found in cart: {0}")]
    LineNotFound(LineId),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// A cart line refers to a product that has left the catalog. The name
    /// is the one captured when the product was added to the cart.
    #[error("Product {product} is no longer available")]
    ProductGone {
        product_id: ProductId,
        product: String,
    },

    /// Requested quantity exceeds live stock.
    #[error("Not enough stock for {product}. Available: {available}")]
    InsufficientStock {
        product: String,
        requested: u32,
        available: u32,
    },

    #[error("Your cart is empty")]
    EmptyCart,

    /// The requester does not own the order.
    #[error("Not authorized to access this order")]
    Forbidden,

    /// The order status does not allow the operation.
    #[error("{0}")]
    InvalidStateTransition(String),

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    /// No order number could be issued within the retry budget.
    #[error("Could not issue an order number: {0}")]
    SequencerExhausted(String),

    /// The backing store failed; nothing was changed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

/// Stable classification of [`FulfillmentError`], independent of its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    ProductGone,
    InsufficientStock,
    EmptyCart,
    Forbidden,
    InvalidStateTransition,
    AlreadyCancelled,
    SequencerExhausted,
    StorageUnavailable,
}

impl ErrorKind {
    /// Machine-readable name, used in responses and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ProductGone => "product_gone",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::EmptyCart => "empty_cart",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::AlreadyCancelled => "already_cancelled",
            ErrorKind::SequencerExhausted => "sequencer_exhausted",
            ErrorKind::StorageUnavailable => "storage_unavailable",
        }
    }

    /// Returns true if the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::SequencerExhausted | ErrorKind::StorageUnavailable
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FulfillmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FulfillmentError::ProductNotFound(_)
            | FulfillmentError::LineNotFound(_)
            | FulfillmentError::OrderNotFound(_) => ErrorKind::NotFound,
            FulfillmentError::ProductGone { .. } => ErrorKind::ProductGone,
            FulfillmentError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            FulfillmentError::EmptyCart => ErrorKind::EmptyCart,
            FulfillmentError::Forbidden => ErrorKind::Forbidden,
            FulfillmentError::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            FulfillmentError::AlreadyCancelled => ErrorKind::AlreadyCancelled,
            FulfillmentError::SequencerExhausted(_) => ErrorKind::SequencerExhausted,
            FulfillmentError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => FulfillmentError::ProductNotFound(id),
            StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id.to_string()),
            other => FulfillmentError::StorageUnavailable(other),
        }
    }
}

impl From<CartError> for FulfillmentError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity { .. } | CartError::TotalOverflow => {
                FulfillmentError::InvalidArgument(err.to_string())
            }
            CartError::LineNotFound { line_id } => FulfillmentError::LineNotFound(line_id),
            CartError::InsufficientStock {
                product_name,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product: product_name,
                requested,
                available,
            },
        }
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Forbidden => FulfillmentError::Forbidden,
            OrderError::AlreadyCancelled => FulfillmentError::AlreadyCancelled,
            OrderError::CannotCancelDelivered | OrderError::InvalidStateTransition { .. } => {
                FulfillmentError::InvalidStateTransition(err.to_string())
            }
            OrderError::NoLines => FulfillmentError::EmptyCart,
            OrderError::TotalOverflow => FulfillmentError::InvalidArgument(err.to_string()),
            OrderError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for FulfillmentError {
    fn from(err: ValidationError) -> Self {
        FulfillmentError::InvalidArgument(err.to_string())
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
