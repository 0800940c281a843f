//! Order history and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use common::OrderId;
use domain::{Order, OrderStatus, PaymentStatus};
use fulfillment::FulfillmentError;
use serde::Deserialize;
use store::{EventRecord, OrderQuery, OrderStats, Store};

use super::{ApiResponse, AppState, Pagination, parse_id};
use crate::error::ApiError;
use crate::identity::ResolvedIdentity;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

impl ListOrdersParams {
    fn into_query(self) -> Result<OrderQuery, ApiError> {
        let mut query = OrderQuery::new()
            .page(self.page.unwrap_or(1))
            .limit(self.limit.unwrap_or(OrderQuery::DEFAULT_LIMIT));

        if let Some(status) = non_blank(self.status) {
            let status: OrderStatus = status.parse().map_err(FulfillmentError::from)?;
            query = query.status(status);
        }
        if let Some(status) = non_blank(self.payment_status) {
            let status: PaymentStatus = status.parse().map_err(FulfillmentError::from)?;
            query = query.payment_status(status);
        }
        Ok(query)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

// -- Handlers --

/// GET /api/orders: the caller's orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ApiError> {
    let Query(params) = params?;
    let query = params.into_query()?;
    let page = state.orders.list(&identity, &query).await?;

    let pagination = Pagination {
        current_page: page.current_page,
        total_pages: page.total_pages,
        total_orders: page.total_orders,
        orders_per_page: page.orders_per_page,
    };
    Ok(Json(ApiResponse::ok(page.orders).with_pagination(pagination)))
}

/// GET /api/orders/stats: order counts and total spent.
#[tracing::instrument(skip(state))]
pub async fn stats<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> Result<Json<ApiResponse<OrderStats>>, ApiError> {
    let stats = state.orders.stats(&identity).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/orders/{orderId}: one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order ID")?;
    let order = state.orders.get(&identity, order_id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// GET /api/orders/{orderId}/events: change history of one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn events<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<EventRecord>>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order ID")?;
    let history = state.orders.history(&identity, order_id).await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// PATCH /api/orders/{orderId}/cancel: cancel with an optional `{"reason"}` body.
#[tracing::instrument(skip(state, body))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order ID")?;
    let req: CancelOrderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelOrderRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let order = state.orders.cancel(&identity, order_id, req.reason).await?;
    Ok(Json(
        ApiResponse::ok(order).with_message("Order cancelled successfully"),
    ))
}
