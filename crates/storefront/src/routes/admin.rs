//! Catalog and stock administration handlers.
//!
//! These routes are expected to sit behind the operator network; they
//! carry no customer identity.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use cartwheel_core::{InventoryId, ProductId};

use crate::error::Result;
use crate::models::NewProduct;
use crate::services::CreatedProduct;
use crate::state::AppState;

/// Body of `POST /admin/inventories/{id}/stock`.
#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub stock: u32,
}

/// Create an unpublished product with an empty inventory.
#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<CreatedProduct>)> {
    let created = state.catalog().add_product(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
pub async fn publish_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.catalog().publish_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn add_stock(
    State(state): State<AppState>,
    Path(id): Path<InventoryId>,
    Json(body): Json<AddStockRequest>,
) -> Result<StatusCode> {
    state.stock().add_stock(id, body.stock).await?;
    Ok(StatusCode::NO_CONTENT)
}
