//! Persistence for the storefront core.
//!
//! Provides the [`Store`] and [`Transaction`] traits with an in-memory
//! implementation for tests and default runs, and a PostgreSQL implementation
//! built on sqlx.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use event::{EventId, EventRecord};
pub use memory::{FailurePoint, InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::{OrderPage, OrderQuery, OrderStats};
pub use store::{CatalogGateway, Store, Transaction};
