use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{Identity, OrderId, ProductId};
use domain::{Aggregate, Cart, Order, OrderEvent, OrderNumber, Product};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CatalogGateway, EventRecord, OrderPage, OrderQuery, OrderStats, Result, Store, StoreError,
    Transaction,
};

/// Operations that can be told to fail, for exercising rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// `Transaction::adjust_stock` fails with `Unavailable`.
    AdjustStock,
    /// `Transaction::insert_order` fails with `Conflict`, as if the order
    /// number had been taken.
    InsertOrderConflict,
    /// `Transaction::save_cart` fails with `Unavailable`.
    SaveCart,
    /// `Transaction::commit` fails with `Unavailable`.
    Commit,
}

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<Identity, Cart>,
    orders: HashMap<OrderId, Order>,
    order_numbers: HashMap<OrderNumber, OrderId>,
    events: HashMap<OrderId, Vec<EventRecord>>,
    sequences: HashMap<NaiveDate, u32>,
}

impl State {
    fn adjust_stock(&mut self, id: &ProductId, delta: i64) -> Result<u32> {
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;

        let updated = i64::from(product.stock) + delta;
        if updated < 0 {
            tracing::warn!(
                product_id = %id,
                delta,
                available = product.stock,
                "stock adjustment refused"
            );
            return Err(StoreError::InsufficientStock {
                product_id: id.clone(),
                requested: u32::try_from(-delta).unwrap_or(u32::MAX),
                available: product.stock,
            });
        }
        product.stock = u32::try_from(updated)
            .map_err(|_| StoreError::Unavailable(format!("stock overflow for {id}")))?;
        Ok(product.stock)
    }

    fn append_events(&mut self, order: &Order, events: &[OrderEvent]) {
        self.events
            .entry(order.id())
            .or_default()
            .extend(EventRecord::for_applied(order, events));
    }
}

#[derive(Debug, Default)]
struct Faults {
    remaining: HashMap<FailurePoint, u32>,
}

impl Faults {
    fn trip(&mut self, point: FailurePoint) -> bool {
        match self.remaining.get_mut(&point) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

/// In-memory store implementation for testing and single-process runs.
///
/// Transactions take a store-wide lock and work on a copy of the state, which
/// replaces the shared state on commit. Transactions are therefore fully
/// serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose catalog holds `products`.
    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().await;
            for product in products {
                state.products.insert(product.id.clone(), product);
            }
        }
        store
    }

    /// Makes the next `times` calls at `point` fail.
    pub async fn fail_at(&self, point: FailurePoint, times: u32) {
        self.faults.lock().await.remaining.insert(point, times);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl CatalogGateway for InMemoryStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(id).cloned())
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32> {
        self.state.lock().await.adjust_stock(id, delta)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn load_cart(&self, identity: &Identity) -> Result<Option<Cart>> {
        Ok(self.state.lock().await.carts.get(identity).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state
            .lock()
            .await
            .carts
            .insert(cart.identity().clone(), cart.clone());
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .order_numbers
            .get(number)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn list_orders(&self, identity: &Identity, query: &OrderQuery) -> Result<OrderPage> {
        let state = self.state.lock().await;
        let mut orders: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| order.is_owned_by(identity) && query.matches(order))
            .collect();

        // Newest first
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.order_number().cmp(&a.order_number()))
        });

        let total = orders.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let page = orders
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(OrderPage::new(page, query, total))
    }

    async fn order_stats(&self, identity: &Identity) -> Result<OrderStats> {
        let state = self.state.lock().await;
        Ok(OrderStats::from_orders(
            state.orders.values().filter(|o| o.is_owned_by(identity)),
        ))
    }

    async fn order_events(&self, id: OrderId) -> Result<Vec<EventRecord>> {
        let state = self.state.lock().await;
        let mut events = state.events.get(&id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryTransaction {
    async fn tripped(&self, point: FailurePoint) -> bool {
        self.faults.lock().await.trip(point)
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_product(&mut self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(id).cloned())
    }

    async fn adjust_stock(&mut self, id: &ProductId, delta: i64) -> Result<u32> {
        if self.tripped(FailurePoint::AdjustStock).await {
            return Err(StoreError::Unavailable("injected stock failure".into()));
        }
        self.working.adjust_stock(id, delta)
    }

    async fn lock_cart(&mut self, identity: &Identity) -> Result<Option<Cart>> {
        Ok(self.working.carts.get(identity).cloned())
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<()> {
        if self.tripped(FailurePoint::SaveCart).await {
            return Err(StoreError::Unavailable("injected cart failure".into()));
        }
        self.working
            .carts
            .insert(cart.identity().clone(), cart.clone());
        Ok(())
    }

    async fn next_order_sequence(&mut self, day: NaiveDate) -> Result<u32> {
        let counter = self.working.sequences.entry(day).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }

    async fn insert_order(&mut self, order: &Order, events: &[OrderEvent]) -> Result<()> {
        if self.tripped(FailurePoint::InsertOrderConflict).await {
            return Err(StoreError::Conflict(format!(
                "order number {} already exists",
                order.order_number()
            )));
        }
        if self.working.order_numbers.contains_key(&order.order_number()) {
            return Err(StoreError::Conflict(format!(
                "order number {} already exists",
                order.order_number()
            )));
        }
        if self.working.orders.contains_key(&order.id()) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id()
            )));
        }

        self.working
            .order_numbers
            .insert(order.order_number(), order.id());
        self.working.orders.insert(order.id(), order.clone());
        self.working.append_events(order, events);
        Ok(())
    }

    async fn load_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn update_order(&mut self, order: &Order, events: &[OrderEvent]) -> Result<()> {
        let expected = EventRecord::expected_version(order, events);
        let current = self
            .working
            .orders
            .get(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;

        if current.version() != expected {
            return Err(StoreError::Conflict(format!(
                "order {}: expected version {expected}, found {}",
                order.id(),
                current.version()
            )));
        }

        self.working.orders.insert(order.id(), order.clone());
        self.working.append_events(order, events);
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        if self.tripped(FailurePoint::Commit).await {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn widget(stock: u32) -> Product {
        Product::new("W1", "Widget", Money::new(1_000), stock)
    }

    #[tokio::test]
    async fn adjust_stock_never_goes_negative() {
        let store = InMemoryStore::with_products([widget(2)]).await;
        let id = ProductId::new("W1");

        assert_eq!(store.adjust_stock(&id, -2).await.unwrap(), 0);
        let err = store.adjust_stock(&id, -1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 1,
                available: 0,
                ..
            }
        ));
        assert_eq!(store.adjust_stock(&id, 3).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn adjust_stock_unknown_product() {
        let store = InMemoryStore::new();
        let err = store.adjust_stock(&ProductId::new("nope"), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = InMemoryStore::with_products([widget(5)]).await;
        let id = ProductId::new("W1");

        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(&id, -2).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(&id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::with_products([widget(5)]).await;
        let id = ProductId::new("W1");
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.adjust_stock(&id, -5).await.unwrap();
            assert_eq!(tx.next_order_sequence(day).await.unwrap(), 1);
        }

        assert_eq!(store.get_product(&id).await.unwrap().unwrap().stock, 5);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_order_sequence(day).await.unwrap(), 1);
        assert_eq!(tx.next_order_sequence(day).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        let store = InMemoryStore::with_products([widget(5)]).await;
        let id = ProductId::new("W1");
        store.fail_at(FailurePoint::Commit, 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(&id, -1).await.unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(StoreError::Unavailable(_))
        ));

        assert_eq!(store.get_product(&id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn sequences_are_per_day() {
        let store = InMemoryStore::new();
        let monday = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let tuesday = monday.succ_opt().unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_order_sequence(monday).await.unwrap(), 1);
        assert_eq!(tx.next_order_sequence(tuesday).await.unwrap(), 1);
        assert_eq!(tx.next_order_sequence(monday).await.unwrap(), 2);
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_order_sequence(monday).await.unwrap(), 3);
    }
}
