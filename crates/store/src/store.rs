use async_trait::async_trait;
use chrono::NaiveDate;
use common::{Identity, OrderId, ProductId};
use domain::{Cart, Order, OrderEvent, OrderNumber, Product};

use crate::{EventRecord, OrderPage, OrderQuery, OrderStats, Result};

/// Read access to the product catalog plus stock adjustment.
///
/// The catalog owns product identity and stock; carts and orders only hold
/// product ids and the deliberate order line snapshot.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Looks up the current catalog state of a product.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Adds `delta` to a product's stock and returns the new stock.
    ///
    /// Fails with `ProductNotFound` for an unknown product and with
    /// `InsufficientStock` if the result would be negative, in which case
    /// stock is left unchanged.
    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32>;
}

/// A unit of work against the store.
///
/// Everything done through a transaction becomes visible together on
/// [`commit`](Transaction::commit). Dropping a transaction without committing
/// discards all of its changes.
#[async_trait]
pub trait Transaction: Send {
    /// Loads a product and locks it until the transaction ends.
    async fn lock_product(&mut self, id: &ProductId) -> Result<Option<Product>>;

    /// Conditionally adjusts stock; see [`CatalogGateway::adjust_stock`].
    async fn adjust_stock(&mut self, id: &ProductId, delta: i64) -> Result<u32>;

    /// Loads the cart of an identity and locks it until the transaction ends.
    ///
    /// Concurrent checkouts of the same cart serialize here; the later one
    /// sees the cart as the earlier one left it.
    async fn lock_cart(&mut self, identity: &Identity) -> Result<Option<Cart>>;

    /// Inserts or replaces the cart of its identity.
    async fn save_cart(&mut self, cart: &Cart) -> Result<()>;

    /// Issues the next order sequence for a calendar day, starting at 1.
    ///
    /// The counter is part of the transaction: an aborted transaction does
    /// not consume a sequence.
    async fn next_order_sequence(&mut self, day: NaiveDate) -> Result<u32>;

    /// Inserts a newly placed order and its first history events.
    ///
    /// Fails with `Conflict` if the order number is already taken.
    async fn insert_order(&mut self, order: &Order, events: &[OrderEvent]) -> Result<()>;

    /// Loads an order and locks it until the transaction ends.
    async fn load_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Persists an order after `events` were applied to it and appends them
    /// to its history.
    ///
    /// Fails with `Conflict` if the stored order is no longer at the version
    /// the events were produced against.
    async fn update_order(&mut self, order: &Order, events: &[OrderEvent]) -> Result<()>;

    /// Makes all changes durable and visible.
    async fn commit(self) -> Result<()>;
}

/// Core trait for store implementations.
///
/// All implementations must be thread-safe and cheap to clone.
#[async_trait]
pub trait Store: CatalogGateway + Clone + 'static {
    /// The transaction type handed out by [`begin`](Store::begin).
    type Tx: Transaction;

    /// Starts a transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Inserts or replaces a catalog product.
    async fn upsert_product(&self, product: &Product) -> Result<()>;

    /// Loads the cart of an identity.
    async fn load_cart(&self, identity: &Identity) -> Result<Option<Cart>>;

    /// Inserts or replaces the cart of its identity.
    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    /// Looks up an order by id.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Looks up an order by its order number.
    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>>;

    /// Lists an identity's orders, newest first.
    async fn list_orders(&self, identity: &Identity, query: &OrderQuery) -> Result<OrderPage>;

    /// Computes order statistics for an identity.
    async fn order_stats(&self, identity: &Identity) -> Result<OrderStats>;

    /// Returns an order's history in version order (oldest first).
    async fn order_events(&self, id: OrderId) -> Result<Vec<EventRecord>>;
}
