//! HTTP API server for the storefront fulfillment core.
//!
//! Provides REST endpoints for carts, checkout and order history, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/api/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/api/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/api/cart/items/{line_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/api/checkout", post(routes::checkout::create::<S>))
        .route("/api/checkout/preview", post(routes::checkout::preview::<S>))
        .route("/api/checkout/{order_id}", get(routes::checkout::get_by_id::<S>))
        .route(
            "/api/checkout/order/{order_number}",
            get(routes::checkout::get_by_number::<S>),
        )
        .route("/api/orders", get(routes::orders::list::<S>))
        .route("/api/orders/stats", get(routes::orders::stats::<S>))
        .route("/api/orders/{order_id}", get(routes::orders::get::<S>))
        .route("/api/orders/{order_id}/events", get(routes::orders::events::<S>))
        .route("/api/orders/{order_id}/cancel", patch(routes::orders::cancel::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store, configured from `config`.
pub fn create_default_state<S: Store>(store: S, config: &Config) -> Arc<AppState<S>> {
    Arc::new(AppState::new(
        store,
        config.pricing.clone(),
        config.sequencer,
    ))
}

/// Registers descriptions for the metrics emitted by the services.
pub fn describe_metrics() {
    metrics::describe_counter!("checkout_attempts_total", "Checkout requests received");
    metrics::describe_counter!("orders_created_total", "Orders successfully placed");
    metrics::describe_counter!(
        "checkout_failures_total",
        "Checkouts that failed, labelled by error kind"
    );
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        metrics::Unit::Seconds,
        "Time to place an order"
    );
    metrics::describe_counter!(
        "order_number_conflicts_total",
        "Checkout transactions retried after an order number conflict"
    );
    metrics::describe_counter!("orders_cancelled_total", "Orders cancelled by their owner");
    metrics::describe_counter!(
        "cart_mutations_total",
        "Cart changes, labelled by operation"
    );
}
