//! Shopping cart aggregate.

mod aggregate;

pub use aggregate::{Cart, CartLine};

use common::LineId;
use thiserror::Error;

/// Errors that can occur during cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity below one.
    #[error("Quantity must be at least 1 (got {quantity})")]
    InvalidQuantity { quantity: u32 },

    /// The addressed line is not in the cart.
    #[error("Item not found in cart: {line_id}")]
    LineNotFound { line_id: LineId },

    /// The requested quantity exceeds live catalog stock.
    #[error("Not enough stock for {product_name}. Available: {available}")]
    InsufficientStock {
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// The cart's totals would not fit in the money or quantity range.
    #[error("Cart total is too large")]
    TotalOverflow,
}
