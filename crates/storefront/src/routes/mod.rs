//! HTTP route handlers for storefront.
//!
//! Handlers are a thin translation layer: decode JSON, call one service
//! operation, encode the result. Customer identity comes from the
//! `x-customer-id` header (see [`crate::middleware::Customer`]).
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                            - Liveness
//! GET    /health/ready                      - Store ping
//!
//! # Cart
//! GET    /cart                              - Cart snapshot
//! POST   /cart                              - Open the customer's cart
//! POST   /cart/items                        - Add item {productId, quantity}
//! POST   /cart/items/{productId}/increase   - Increase quantity {quantity}
//! POST   /cart/items/{productId}/decrease   - Decrease quantity {quantity}
//! DELETE /cart/items/{productId}            - Remove item
//!
//! # Addresses
//! POST   /addresses                         - Validate and store an address
//!
//! # Checkout
//! POST   /checkout                          - Place an order
//! GET    /orders/{orderId}                  - Read a placed order
//!
//! # Admin
//! POST   /admin/products                    - Create product and inventory
//! POST   /admin/products/{id}/publish       - Publish a product
//! POST   /admin/inventories/{id}/stock      - Add stock
//! ```

pub mod addresses;
pub mod admin;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::open))
        .route("/items", post(cart::add))
        .route("/items/{product_id}", axum::routing::delete(cart::remove))
        .route("/items/{product_id}/increase", post(cart::increase))
        .route("/items/{product_id}/decrease", post(cart::decrease))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(admin::create_product))
        .route("/products/{id}/publish", post(admin::publish_product))
        .route("/inventories/{id}/stock", post(admin::add_stock))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .route("/addresses", post(addresses::create))
        .route("/checkout", post(checkout::place_order))
        .route("/orders/{order_id}", get(checkout::show_order))
        .nest("/admin", admin_routes())
}
