//! Application services of the storefront core.
//!
//! - [`CartService`]: per-identity carts
//! - [`CheckoutService`]: atomic cart-to-order conversion
//! - [`OrderSequencer`]: `ORD-YYYYMMDD-NNNNN` order numbers
//! - [`OrderLifecycle`]: cancellation, fulfilment progression and order reads
//!
//! All services are generic over a [`store::Store`].

pub mod cart;
pub mod checkout;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod sequencer;

pub use cart::CartService;
pub use checkout::{CheckoutPreview, CheckoutRequest, CheckoutService};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorKind, FulfillmentError, Result};
pub use lifecycle::OrderLifecycle;
pub use sequencer::{OrderSequencer, SequenceError, SequencerConfig};
