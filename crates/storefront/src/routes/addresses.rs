//! Address route handlers.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::Customer;
use crate::models::Address;
use crate::services::AddressInput;
use crate::state::AppState;

/// Validate a shipping address against its ZIP code and store it.
///
/// The customer's first address becomes their default.
#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = state.addresses().resolve(customer_id, input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}
