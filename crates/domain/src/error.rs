//! Input validation errors.

use thiserror::Error;

/// Errors raised while constructing value objects from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// The payment method is not one of the supported methods.
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// The payment status is not one of the known statuses.
    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    /// The order status is not one of the known statuses.
    #[error("Invalid order status: {0}")]
    InvalidOrderStatus(String),

    /// Notes exceed the maximum length.
    #[error("Notes too long: {len} characters (maximum {max})")]
    NotesTooLong { len: usize, max: usize },
}
