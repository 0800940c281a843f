//! Shared types for the storefront fulfillment core.
//!
//! Identifiers, the cart/order partition key ([`Identity`]), integer money in
//! currency minor units and the optimistic-concurrency [`Version`].

pub mod identity;
pub mod money;
pub mod types;

pub use identity::{Identity, SessionToken, UserId};
pub use money::Money;
pub use types::{LineId, OrderId, ProductId, Version};
