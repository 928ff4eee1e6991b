//! Persistence for the commerce core.
//!
//! # Database: `cartwheel`
//!
//! All tables live in the `commerce` schema:
//!
//! - `products` / `inventories` - Catalog and stock (1:1)
//! - `carts` / `cart_items` - One cart per customer, one line per product
//! - `addresses` - Append-only shipping addresses, one default per customer
//! - `orders` / `order_items` / `payments` - Immutable checkout output
//!
//! # Transactions
//!
//! Services never talk to a pool directly. They open a [`CommerceTx`] through
//! a [`CommerceStore`], do every read and write for one business operation on
//! it, then [`CommerceTx::commit`]. Dropping a transaction without committing
//! rolls it back, so an early `?` return is always safe.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! ```

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

use cartwheel_core::{
    AddressId, CartId, CartItemId, CustomerId, InventoryId, OrderId, Price, ProductId,
    ProductStatus,
};

use crate::models::{
    Address, Cart, CartItem, CartLine, Inventory, Order, OrderItem, Payment, Product,
};

#[cfg(any(test, feature = "test-support"))]
pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgCommerceStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate cart line).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The store could not be reached in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// `lock_not_available`: `lock_timeout` expired waiting for a row lock.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// `query_canceled`: `statement_timeout` expired.
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        let timed_out = match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
            sqlx::Error::Database(db_err) => matches!(
                db_err.code().as_deref(),
                Some(LOCK_NOT_AVAILABLE | QUERY_CANCELED)
            ),
            _ => false,
        };
        if timed_out {
            Self::Unavailable(e.to_string())
        } else {
            Self::Database(e)
        }
    }
}

/// Outcome of a conditional stock write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockWrite {
    /// The row had enough stock and was updated.
    Applied,
    /// The write would leave the row out of range (below zero, or past
    /// `i32::MAX` for additions); nothing changed.
    Rejected,
}

/// Entry point to transactional storage.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn CommerceTx>, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// One open transaction.
///
/// Every method runs inside the same transaction. Methods named `lock_*`
/// take row locks that are held until commit or rollback.
#[async_trait]
pub trait CommerceTx: Send {
    // Catalog

    /// Insert a product row.
    async fn insert_product(&mut self, product: &Product) -> Result<(), RepositoryError>;

    /// Insert an inventory row.
    async fn insert_inventory(&mut self, inventory: &Inventory) -> Result<(), RepositoryError>;

    /// Get a product by ID.
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Set a product's status. Returns `false` if the product doesn't exist.
    async fn set_product_status(
        &mut self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<bool, RepositoryError>;

    /// Set a product's current price. Returns `false` if the product doesn't exist.
    async fn set_product_price(&mut self, id: ProductId, price: Price)
    -> Result<bool, RepositoryError>;

    // Stock

    /// Get and lock the inventory row for a product.
    async fn lock_inventory_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<Inventory>, RepositoryError>;

    /// Add `amount` units, only if the result stays within `i32`.
    ///
    /// Returns `None` if the inventory row doesn't exist and
    /// `Some(StockWrite::Rejected)` if the addition would overflow.
    async fn increment_stock(
        &mut self,
        inventory_id: InventoryId,
        amount: i32,
    ) -> Result<Option<StockWrite>, RepositoryError>;

    /// Remove `amount` units only if at least `amount` are available.
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        amount: i32,
    ) -> Result<StockWrite, RepositoryError>;

    // Carts

    /// Get a customer's cart.
    async fn find_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>, RepositoryError>;

    /// Get and lock a customer's cart.
    ///
    /// Every cart mutation and checkout takes this lock first, so operations
    /// on one cart are serialized and locks are always taken cart first,
    /// then inventory, then lines.
    async fn lock_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>, RepositoryError>;

    /// Insert a cart row. Does nothing if the customer already has a cart.
    async fn insert_cart(&mut self, cart: &Cart) -> Result<(), RepositoryError>;

    /// Get and lock the line for `(cart, product)`.
    async fn lock_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// Insert a new line.
    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<(), RepositoryError>;

    /// Overwrite a line's quantity.
    async fn update_cart_item_quantity(
        &mut self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError>;

    /// Delete one line.
    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<(), RepositoryError>;

    /// Lines joined with current product data, oldest first.
    ///
    /// With `lock` set, the line rows stay locked until the transaction ends.
    async fn cart_lines(&mut self, cart_id: CartId, lock: bool)
    -> Result<Vec<CartLine>, RepositoryError>;

    /// Delete every line in a cart. Returns the number removed.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64, RepositoryError>;

    // Addresses

    /// Serialize address writes for one customer until the transaction ends.
    async fn lock_customer_addresses(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<(), RepositoryError>;

    /// Whether the customer already has a default address.
    async fn has_default_address(&mut self, customer_id: CustomerId)
    -> Result<bool, RepositoryError>;

    /// Insert an address row as given.
    async fn insert_address(&mut self, address: &Address) -> Result<(), RepositoryError>;

    /// Flag an address as its customer's default.
    async fn promote_to_default(&mut self, address_id: AddressId) -> Result<(), RepositoryError>;

    /// Get one of a customer's addresses.
    async fn find_address(
        &mut self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<Option<Address>, RepositoryError>;

    // Orders

    /// Insert an order row.
    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError>;

    /// Insert an order item row.
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), RepositoryError>;

    /// Insert a payment row.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), RepositoryError>;

    /// Get one of a customer's orders.
    async fn find_order(
        &mut self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Items of an order with their frozen prices.
    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;

    /// The payment recorded for an order.
    async fn find_payment(&mut self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError>;

    /// Make every write in this transaction visible.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `timeout` - How long a request may wait for a connection, a row lock
///   or a single statement
///
/// Every connection runs with `lock_timeout` and `statement_timeout` set to
/// `timeout`, so a transaction stuck behind another's row locks fails with
/// [`RepositoryError::Unavailable`] instead of waiting forever.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be
/// established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let timeout_ms = format!("{}ms", timeout.as_millis());
    let options = PgConnectOptions::from_str(database_url.expose_secret())?.options([
        ("lock_timeout", timeout_ms.as_str()),
        ("statement_timeout", timeout_ms.as_str()),
    ]);

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
}
