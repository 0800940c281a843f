//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{LineId, Money, ProductId};
use domain::{Cart, CartLine};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{ApiResponse, AppState, parse_id};
use crate::error::ApiError;
use crate::identity::ResolvedIdentity;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
    pub line_total: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub total_items: u32,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CartLine> for CartItemResponse {
    fn from(line: &CartLine) -> Self {
        Self {
            line_id: line.line_id,
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            price: line.unit_price,
            line_total: line.line_total(),
        }
    }
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            items: cart.lines().iter().map(CartItemResponse::from).collect(),
            total_items: cart.total_items(),
            total_amount: cart.total_amount(),
            created_at: cart.created_at(),
            updated_at: cart.updated_at(),
        }
    }
}

type CartResult = Result<Json<ApiResponse<CartResponse>>, ApiError>;

// -- Handlers --

/// GET /api/cart: the caller's cart.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> CartResult {
    let cart = state.carts.get(&identity).await?;
    Ok(Json(ApiResponse::ok(cart.into())))
}

/// POST /api/cart/items: add a product (quantity defaults to 1).
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> CartResult {
    let Json(req) = payload?;
    let product_id = ProductId::new(req.product_id.trim());
    let cart = state
        .carts
        .add_item(&identity, &product_id, req.quantity.unwrap_or(1))
        .await?;
    Ok(Json(
        ApiResponse::ok(cart.into()).with_message("Item added to cart"),
    ))
}

/// PUT /api/cart/items/{lineId}: set a line's quantity.
#[tracing::instrument(skip(state, payload))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(line_id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> CartResult {
    let Json(req) = payload?;
    let line_id: LineId = parse_id(&line_id, "item ID")?;
    let cart = state
        .carts
        .update_item(&identity, line_id, req.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(cart.into()).with_message("Cart updated")))
}

/// DELETE /api/cart/items/{lineId}: remove a line (no-op if absent).
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
    Path(line_id): Path<String>,
) -> CartResult {
    let line_id: LineId = parse_id(&line_id, "item ID")?;
    let cart = state.carts.remove_item(&identity, line_id).await?;
    Ok(Json(
        ApiResponse::ok(cart.into()).with_message("Item removed from cart"),
    ))
}

/// DELETE /api/cart: empty the cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResolvedIdentity(identity): ResolvedIdentity,
) -> CartResult {
    let cart = state.carts.clear(&identity).await?;
    Ok(Json(ApiResponse::ok(cart.into()).with_message("Cart cleared")))
}
