//! Cart route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use cartwheel_core::ProductId;

use crate::error::Result;
use crate::middleware::Customer;
use crate::models::{Cart, CartSnapshot};
use crate::state::AppState;

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of the increase and decrease endpoints.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Show the customer's cart with live prices.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state.carts().snapshot(customer_id).await?;
    Ok(Json(snapshot))
}

/// Open the customer's cart. Opening an existing cart returns it unchanged.
#[instrument(skip(state))]
pub async fn open(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
) -> Result<Json<Cart>> {
    let cart = state.carts().get_or_create(customer_id).await?;
    Ok(Json(cart))
}

/// Add a product to the cart.
///
/// Adding a product already in the cart increases its quantity.
#[instrument(skip(state, body), fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state
        .carts()
        .add_item(customer_id, body.product_id, body.quantity)
        .await?;
    Ok(Json(snapshot))
}

#[instrument(skip(state, body))]
pub async fn increase(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state
        .carts()
        .increase_item(customer_id, product_id, body.quantity)
        .await?;
    Ok(Json(snapshot))
}

/// Decrease a line's quantity; reaching zero removes the line.
#[instrument(skip(state, body))]
pub async fn decrease(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state
        .carts()
        .decrease_item(customer_id, product_id, body.quantity)
        .await?;
    Ok(Json(snapshot))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state.carts().remove_item(customer_id, product_id).await?;
    Ok(Json(snapshot))
}
