//! Integration tests for Cartwheel.
//!
//! The tests drive the real storefront router with
//! `tower::ServiceExt::oneshot` over the in-memory store, so they need no
//! database or network.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_flow` - Cart mutations and stock checks
//! - `addresses` - Address validation and ZIP caching
//! - `checkout` - Order placement and atomicity

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use cartwheel_core::{CustomerId, ZipCode};
use cartwheel_storefront::db::MemoryStore;
use cartwheel_storefront::middleware::CUSTOMER_ID_HEADER;
use cartwheel_storefront::state::AppState;
use cartwheel_storefront::zipcode::{MokaZipCache, ZipCodeError, ZipCodeLookup, ZipLocation};

/// ZIP gateway stand-in that knows a single ZIP code and counts calls.
#[derive(Debug, Default)]
pub struct CountingLookup {
    calls: AtomicUsize,
}

impl CountingLookup {
    /// ZIP code this gateway resolves.
    pub const KNOWN_ZIP: &'static str = "73301";

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZipCodeLookup for CountingLookup {
    async fn lookup(&self, zip: &ZipCode) -> Result<Option<ZipLocation>, ZipCodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((zip.as_str() == Self::KNOWN_ZIP).then(|| ZipLocation {
            city: "Austin".to_owned(),
            state: "TX".to_owned(),
        }))
    }
}

/// A storefront router over fresh in-memory state.
#[derive(Clone)]
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub lookup: Arc<CountingLookup>,
    pub app: Router,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let lookup = Arc::new(CountingLookup::default());
        let state = AppState::new(
            store.clone(),
            lookup.clone(),
            Arc::new(MokaZipCache::new(1_000)),
            Duration::from_secs(2),
            Duration::from_secs(5),
        );
        Self {
            store,
            lookup,
            app: cartwheel_storefront::app(state),
        }
    }

    /// Send a request and return the status with the decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        customer: Option<CustomerId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(customer_id) = customer {
            builder = builder.header(CUSTOMER_ID_HEADER, customer_id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Create, publish and stock a product through the admin API.
    /// Returns the product ID.
    pub async fn seed_product(&self, price: i64, stock: u32) -> String {
        let (status, created) = self
            .send(
                Method::POST,
                "/admin/products",
                None,
                Some(serde_json::json!({ "name": format!("Product {price}"), "price": price })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");

        let product_id = created["product"]["id"].as_str().unwrap().to_owned();
        let inventory_id = created["inventory"]["id"].as_str().unwrap().to_owned();

        let (status, _) = self
            .send(
                Method::POST,
                &format!("/admin/products/{product_id}/publish"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        if stock > 0 {
            let (status, _) = self
                .send(
                    Method::POST,
                    &format!("/admin/inventories/{inventory_id}/stock"),
                    None,
                    Some(serde_json::json!({ "stock": stock })),
                )
                .await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        product_id
    }

    /// Open a cart for a new customer.
    pub async fn new_customer(&self) -> CustomerId {
        let customer_id = CustomerId::generate();
        let (status, _) = self
            .send(Method::POST, "/cart", Some(customer_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        customer_id
    }

    /// Register a valid address for `customer_id`. Returns the address ID.
    pub async fn add_address(&self, customer_id: CustomerId, number: &str) -> String {
        let (status, address) = self
            .send(
                Method::POST,
                "/addresses",
                Some(customer_id),
                Some(serde_json::json!({
                    "street": "Congress Ave",
                    "number": number,
                    "city": "Austin",
                    "state": "TX",
                    "zipCode": CountingLookup::KNOWN_ZIP,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{address}");
        address["id"].as_str().unwrap().to_owned()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
