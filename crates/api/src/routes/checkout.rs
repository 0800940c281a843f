//! Checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::Order;
use fulfillment::{CheckoutPreview, CheckoutRequest};
use store::Store;

use super::{ApiResponse, AppState, parse_id};
use crate::error::ApiError;
use crate::identity::ResolvedIdentity;

/// POST /api/checkout: turn the caller's cart into an order.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ApiError> {
    let Json(req) = payload?;
    let order = state.checkout.create_order(&identity, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(order).with_message("Order created successfully")),
    ))
}

/// POST /api/checkout/preview: price the caller's cart.
#[tracing::instrument(skip(state))]
pub async fn preview<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> Result<Json<ApiResponse<CheckoutPreview>>, ApiError> {
    let preview = state.checkout.preview(&identity).await?;
    Ok(Json(ApiResponse::ok(preview)))
}

/// GET /api/checkout/{orderId}: order confirmation by id.
#[tracing::instrument(skip(state))]
pub async fn get_by_id<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order ID")?;
    let order = state.orders.find_by_id(order_id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// GET /api/checkout/order/{orderNumber}: order confirmation by number.
#[tracing::instrument(skip(state))]
pub async fn get_by_number<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state.orders.find_by_number(&order_number).await?;
    Ok(Json(ApiResponse::ok(order)))
}
