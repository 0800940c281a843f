//! HTTP route handlers.

pub mod cart;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;

use domain::{PricingConfig, PricingEngine};
use fulfillment::{CartService, CheckoutService, OrderLifecycle, OrderSequencer, SequencerConfig};
use serde::Serialize;
use store::Store;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderLifecycle<S>,
    pub store: S,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, pricing: PricingConfig, sequencer: SequencerConfig) -> Self {
        Self {
            carts: CartService::new(store.clone()),
            checkout: CheckoutService::new(
                store.clone(),
                PricingEngine::new(pricing),
                OrderSequencer::new(sequencer),
            ),
            orders: OrderLifecycle::new(store.clone()),
            store,
        }
    }
}

/// Pagination block of list responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_orders: u64,
    pub orders_per_page: u32,
}

/// Success envelope: `{"success": true, "message"?, "data", "pagination"?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Parses a UUID path segment into a typed id.
pub(crate) fn parse_id<T: From<uuid::Uuid>>(id: &str, what: &str) -> Result<T, ApiError> {
    uuid::Uuid::parse_str(id.trim())
        .map(T::from)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} format: {e}")))
}
