//! Checkout route handlers.
//!
//! The checkout transaction runs in its own task so a client disconnect
//! cannot cancel it halfway; the task is bounded by the configured
//! checkout timeout instead.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use cartwheel_core::{AddressId, OrderId};

use crate::error::{AppError, Result};
use crate::middleware::Customer;
use crate::models::{CheckoutReceipt, PaymentReceipt};
use crate::services::{CheckoutRequest, CommerceError};
use crate::state::AppState;

/// Gateway recorded when the client doesn't name one.
pub const DEFAULT_GATEWAY: &str = "mercado_pago";

/// Body of `POST /checkout`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub address_id: AddressId,
    pub transaction_id: String,
    #[serde(default)]
    pub gateway: Option<String>,
}

/// Place an order for everything in the customer's cart.
#[instrument(skip(state, body), fields(address_id = %body.address_id))]
pub async fn place_order(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    if body.transaction_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "transactionId cannot be empty".to_string(),
        ));
    }

    let request = CheckoutRequest {
        customer_id,
        address_id: body.address_id,
        payment: PaymentReceipt {
            gateway: body
                .gateway
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GATEWAY.to_string()),
            transaction_id: body.transaction_id,
        },
    };

    let orchestrator = state.checkout().clone();
    let timeout = state.checkout_timeout();
    let receipt = tokio::spawn(async move {
        tokio::time::timeout(timeout, orchestrator.checkout(request))
            .await
            .unwrap_or(Err(CommerceError::UpstreamUnavailable("checkout")))
    })
    .await
    .map_err(|e| AppError::Internal(format!("checkout task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Show one of the customer's placed orders.
#[instrument(skip(state))]
pub async fn show_order(
    State(state): State<AppState>,
    Customer(customer_id): Customer,
    Path(order_id): Path<OrderId>,
) -> Result<Json<CheckoutReceipt>> {
    let receipt = state.checkout().get_order(customer_id, order_id).await?;
    Ok(Json(receipt))
}
