//! Domain layer for the storefront fulfillment core.
//!
//! This crate is pure (no I/O) and provides:
//! - the `Cart` aggregate with derived running totals
//! - the `Order` aggregate, its status machine and lifecycle events
//! - validated value objects (shipping address, payment method, order number)
//! - the `PricingEngine` for shipping and tax

pub mod aggregate;
pub mod cart;
pub mod error;
pub mod order;
pub mod pricing;
pub mod product;

pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{Cart, CartError, CartLine};
pub use error::ValidationError;
pub use order::{
    DEFAULT_CANCELLATION_REASON, MAX_NOTES_LEN, NewOrder, Order, OrderError, OrderEvent,
    OrderLine, OrderNumber, OrderNumberError, OrderPlacedData, OrderStatus, PaymentMethod,
    PaymentStatus, ShippingAddress, ShippingAddressInput, normalize_notes,
};
pub use pricing::{PriceBreakdown, PricingConfig, PricingEngine};
pub use product::Product;
