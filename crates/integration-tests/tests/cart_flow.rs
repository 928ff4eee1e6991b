//! Cart mutations through the HTTP API.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use cartwheel_core::CustomerId;
use cartwheel_integration_tests::TestContext;

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let (status, _) = ctx.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.send(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cart_requires_customer_identity() {
    let ctx = TestContext::new();

    let (status, body) = ctx.send(Method::GET, "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_unknown_customer_has_no_cart() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .send(Method::GET, "/cart", Some(CustomerId::generate()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "cart not found");
}

#[tokio::test]
async fn test_add_increase_decrease_remove() {
    let ctx = TestContext::new();
    let customer = ctx.new_customer().await;
    let product = ctx.seed_product(2999, 10).await;

    // Add 3, then add 2 more to the same line.
    for quantity in [3, 2] {
        let (status, _) = ctx
            .send(
                Method::POST,
                "/cart/items",
                Some(customer),
                Some(json!({ "productId": product, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, cart) = ctx.send(Method::GET, "/cart", Some(customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["totalItems"], 1);
    assert_eq!(cart["totalQuantity"], 5);
    assert_eq!(cart["totalPrice"], 5 * 2999);

    // Increasing past stock is rejected and leaves the line alone.
    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("/cart/items/{product}/increase"),
            Some(customer),
            Some(json!({ "quantity": 6 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "product quantity exceeds the stock available");

    let (status, cart) = ctx
        .send(
            Method::POST,
            &format!("/cart/items/{product}/increase"),
            Some(customer),
            Some(json!({ "quantity": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["totalQuantity"], 10);

    // Decreasing to zero removes the line.
    let (status, cart) = ctx
        .send(
            Method::POST,
            &format!("/cart/items/{product}/decrease"),
            Some(customer),
            Some(json!({ "quantity": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["totalItems"], 0);

    let (status, _) = ctx
        .send(
            Method::DELETE,
            &format!("/cart/items/{product}"),
            Some(customer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zero_quantity_is_rejected() {
    let ctx = TestContext::new();
    let customer = ctx.new_customer().await;
    let product = ctx.seed_product(100, 5).await;

    let (status, body) = ctx
        .send(
            Method::POST,
            "/cart/items",
            Some(customer),
            Some(json!({ "productId": product, "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "product quantity cannot be zero");
}

#[tokio::test]
async fn test_add_beyond_stock_is_rejected() {
    let ctx = TestContext::new();
    let customer = ctx.new_customer().await;
    let product = ctx.seed_product(100, 2).await;

    let (status, _) = ctx
        .send(
            Method::POST,
            "/cart/items",
            Some(customer),
            Some(json!({ "productId": product, "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, cart) = ctx.send(Method::GET, "/cart", Some(customer), None).await;
    assert_eq!(cart["totalItems"], 0);
}

#[tokio::test]
async fn test_opening_cart_twice_returns_same_cart() {
    let ctx = TestContext::new();
    let customer = CustomerId::generate();

    let (_, first) = ctx.send(Method::POST, "/cart", Some(customer), None).await;
    let (_, second) = ctx.send(Method::POST, "/cart", Some(customer), None).await;
    assert_eq!(first["id"], second["id"]);
}
