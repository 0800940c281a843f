use common::Money;
use domain::{Order, OrderStatus, PaymentStatus};
use serde::Serialize;

/// Filters and pagination for listing an identity's orders.
///
/// Results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Filter by order status.
    pub status: Option<OrderStatus>,

    /// Filter by payment status.
    pub payment_status: Option<PaymentStatus>,

    /// One-based page number.
    pub page: u32,

    /// Orders per page.
    pub limit: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            payment_status: None,
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

impl OrderQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a query for the first page with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by order status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by payment status.
    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    /// Selects a page. Page 0 is treated as 1.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Sets the page size, capped at `MAX_LIMIT`. A limit of 0 selects
    /// `DEFAULT_LIMIT`.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = match limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        };
        self
    }

    /// Number of orders to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    /// Returns true if `order` passes the filters.
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| order.status() == s)
            && self
                .payment_status
                .is_none_or(|s| order.payment_status() == s)
    }
}

/// One page of orders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_orders: u64,
    pub orders_per_page: u32,
}

impl OrderPage {
    pub fn new(orders: Vec<Order>, query: &OrderQuery, total_orders: u64) -> Self {
        let limit = u64::from(query.limit.max(1));
        Self {
            orders,
            current_page: query.page,
            total_pages: total_orders.div_ceil(limit),
            total_orders,
            orders_per_page: query.limit,
        }
    }
}

/// Aggregate figures over an identity's orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    /// Sum of `totalPrice` over every order, cancelled ones included.
    pub total_spent: Money,
    pub pending_orders: u64,
    pub processing_orders: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
}

impl OrderStats {
    /// Computes statistics over a set of orders.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut stats = Self::default();
        for order in orders {
            stats.total_orders += 1;
            stats.total_spent = stats.total_spent.saturating_add(order.total_price());
            *stats.count_mut(order.status()) += 1;
        }
        stats
    }

    fn count_mut(&mut self, status: OrderStatus) -> &mut u64 {
        match status {
            OrderStatus::Pending => &mut self.pending_orders,
            OrderStatus::Processing => &mut self.processing_orders,
            OrderStatus::Shipped => &mut self.shipped_orders,
            OrderStatus::Delivered => &mut self.delivered_orders,
            OrderStatus::Cancelled => &mut self.cancelled_orders,
        }
    }
}
