//! Order status changes and order reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Identity, OrderId};
use domain::{Aggregate, Order, OrderError, OrderEvent, OrderNumber};
use store::{EventRecord, OrderPage, OrderQuery, OrderStats, Store, StoreError, Transaction};

use crate::clock::{Clock, SystemClock};
use crate::error::{FulfillmentError, Result};

/// Moves orders through their lifecycle and serves order reads.
///
/// Every change loads the order under a lock, applies the aggregate's events
/// and persists order and history together in one transaction.
#[derive(Debug, Clone)]
pub struct OrderLifecycle<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> OrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cancels an order on behalf of its owner and returns its lines to stock.
    #[tracing::instrument(skip(self, reason), fields(identity = %identity))]
    pub async fn cancel(
        &self,
        identity: &Identity,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(&mut tx, order_id).await?;

        let events = order.cancel(identity, reason, now)?;
        order.apply_events(events.clone());
        tx.update_order(&order, &events).await?;

        // Same product order as checkout takes its locks in
        let mut restock: Vec<_> = order.lines().iter().collect();
        restock.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        for line in restock {
            match tx
                .adjust_stock(&line.product_id, i64::from(line.quantity))
                .await
            {
                Ok(_) => {}
                Err(StoreError::ProductNotFound(product_id)) => {
                    tracing::warn!(
                        %order_id,
                        %product_id,
                        quantity = line.quantity,
                        "product left the catalog, stock not restored"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        tx.commit().await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(
            %order_id,
            order_number = %order.order_number(),
            reason = order.cancellation_reason().unwrap_or_default(),
            "order cancelled"
        );
        Ok(order)
    }

    /// Moves a pending order to processing.
    #[tracing::instrument(skip(self))]
    pub async fn start_processing(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, Order::start_processing).await
    }

    /// Marks a processing order as shipped.
    #[tracing::instrument(skip(self))]
    pub async fn ship(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, Order::ship).await
    }

    /// Marks a shipped order as delivered.
    #[tracing::instrument(skip(self))]
    pub async fn deliver(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, Order::deliver).await
    }

    /// Replaces the order notes. Allowed in every status, including terminal ones.
    #[tracing::instrument(skip(self, notes))]
    pub async fn amend_notes(&self, order_id: OrderId, notes: Option<String>) -> Result<Order> {
        self.transition(order_id, |order: &Order, at| order.amend_notes(notes, at))
            .await
    }

    /// Returns an order if `identity` owns it.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn get(&self, identity: &Identity, order_id: OrderId) -> Result<Order> {
        let order = self.find_by_id(order_id).await?;
        order.authorize(identity)?;
        Ok(order)
    }

    /// Looks an order up by id without an ownership check.
    pub async fn find_by_id(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))
    }

    /// Looks an order up by its `ORD-YYYYMMDD-NNNNN` number without an
    /// ownership check. A malformed number is reported as not found.
    pub async fn find_by_number(&self, order_number: &str) -> Result<Order> {
        let not_found = || FulfillmentError::OrderNotFound(order_number.to_string());
        let number: OrderNumber = order_number.trim().parse().map_err(|_| not_found())?;
        self.store
            .find_order_by_number(&number)
            .await?
            .ok_or_else(not_found)
    }

    /// Lists the identity's orders, newest first.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn list(&self, identity: &Identity, query: &OrderQuery) -> Result<OrderPage> {
        Ok(self.store.list_orders(identity, query).await?)
    }

    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn stats(&self, identity: &Identity) -> Result<OrderStats> {
        Ok(self.store.order_stats(identity).await?)
    }

    /// Returns the change history of an order the identity owns.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn history(&self, identity: &Identity, order_id: OrderId) -> Result<Vec<EventRecord>> {
        self.get(identity, order_id).await?;
        Ok(self.store.order_events(order_id).await?)
    }

    async fn transition<F>(&self, order_id: OrderId, command: F) -> Result<Order>
    where
        F: FnOnce(&Order, DateTime<Utc>) -> std::result::Result<Vec<OrderEvent>, OrderError>,
    {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(&mut tx, order_id).await?;

        let events = command(&order, now)?;
        if events.is_empty() {
            return Ok(order);
        }
        order.apply_events(events.clone());
        tx.update_order(&order, &events).await?;
        tx.commit().await?;

        tracing::info!(
            %order_id,
            status = %order.status(),
            version = %order.version(),
            "order updated"
        );
        Ok(order)
    }
}

async fn load_locked<T: Transaction>(tx: &mut T, order_id: OrderId) -> Result<Order> {
    tx.load_order(order_id)
        .await?
        .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))
}
