//! `PostgreSQL` adapter for [`CommerceStore`].
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate
//! builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use cartwheel_core::{
    AddressId, CartId, CartItemId, CustomerId, InventoryId, OrderId, OrderItemId, PaymentId,
    Price, ProductId, ProductStatus,
};

use super::{CommerceStore, CommerceTx, RepositoryError, StockWrite};
use crate::models::{
    Address, Cart, CartItem, CartLine, Inventory, Order, OrderItem, Payment, Product,
};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgCommerceStore {
    pool: PgPool,
}

impl PgCommerceStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CommerceStore for PgCommerceStore {
    async fn begin(&self) -> Result<Box<dyn CommerceTx>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCommerceTx { tx }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::from(e)
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    status: String,
    name: String,
    description: Option<String>,
    price: Price,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ProductStatus>()
            .map_err(RepositoryError::DataCorruption)?;
        Ok(Self {
            id: row.id,
            status,
            name: row.name,
            description: row.description,
            price: row.price,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    id: InventoryId,
    product_id: ProductId,
    stock_quantity: i32,
}

impl From<InventoryRow> for Inventory {
    fn from(row: InventoryRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            stock_quantity: row.stock_quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    customer_id: CustomerId,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    product_id: ProductId,
    name: String,
    description: Option<String>,
    quantity: i32,
    price: Price,
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    customer_id: CustomerId,
    is_default: bool,
    street: String,
    number: String,
    city: String,
    state: String,
    zip_code: String,
    address_line: String,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            is_default: row.is_default,
            street: row.street,
            number: row.number,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            address_line: row.address_line,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: CustomerId,
    address_id: AddressId,
    total_quantity: i64,
    total_price: Price,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price: Price,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    order_id: OrderId,
    payment_gateway_name: String,
    payment_gateway_transaction_id: String,
    created_at: DateTime<Utc>,
}

// =============================================================================
// Transaction
// =============================================================================

struct PgCommerceTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CommerceTx for PgCommerceTx {
    async fn insert_product(&mut self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.products (id, status, name, description, price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(product.id)
        .bind(product.status.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "product"))?;
        Ok(())
    }

    async fn insert_inventory(&mut self, inventory: &Inventory) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.inventories (id, product_id, stock_quantity)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(inventory.id)
        .bind(inventory.product_id)
        .bind(inventory.stock_quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "inventory"))?;
        Ok(())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, status, name, description, price, created_at
            FROM commerce.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn set_product_status(
        &mut self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE commerce.products SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_product_price(
        &mut self,
        id: ProductId,
        price: Price,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE commerce.products SET price = $2 WHERE id = $1")
            .bind(id)
            .bind(price)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn lock_inventory_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<Inventory>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            r"
            SELECT id, product_id, stock_quantity
            FROM commerce.inventories
            WHERE product_id = $1
            FOR UPDATE
            ",
        )
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Inventory::from))
    }

    async fn increment_stock(
        &mut self,
        inventory_id: InventoryId,
        amount: i32,
    ) -> Result<Option<StockWrite>, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE commerce.inventories
            SET stock_quantity = stock_quantity + $2
            WHERE id = $1 AND stock_quantity <= 2147483647 - $2
            ",
        )
        .bind(inventory_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(Some(StockWrite::Applied));
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM commerce.inventories WHERE id = $1)",
        )
        .bind(inventory_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists.then_some(StockWrite::Rejected))
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        amount: i32,
    ) -> Result<StockWrite, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE commerce.inventories
            SET stock_quantity = stock_quantity - $2
            WHERE product_id = $1 AND stock_quantity >= $2
            ",
        )
        .bind(product_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() > 0 {
            Ok(StockWrite::Applied)
        } else {
            Ok(StockWrite::Rejected)
        }
    }

    async fn find_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, customer_id, created_at FROM commerce.carts WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Cart {
            id: r.id,
            customer_id: r.customer_id,
            created_at: r.created_at,
        }))
    }

    async fn lock_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, customer_id, created_at
            FROM commerce.carts
            WHERE customer_id = $1
            FOR UPDATE
            ",
        )
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Cart {
            id: r.id,
            customer_id: r.customer_id,
            created_at: r.created_at,
        }))
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.carts (id, customer_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id) DO NOTHING
            ",
        )
        .bind(cart.id)
        .bind(cart.customer_id)
        .bind(cart.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, cart_id, product_id, quantity
            FROM commerce.cart_items
            WHERE cart_id = $1 AND product_id = $2
            FOR UPDATE
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| CartItem {
            id: r.id,
            cart_id: r.cart_id,
            product_id: r.product_id,
            quantity: r.quantity,
        }))
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.cart_items (id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(item.id)
        .bind(item.cart_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "cart line"))?;
        Ok(())
    }

    async fn update_cart_item_quantity(
        &mut self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE commerce.cart_items SET quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM commerce.cart_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn cart_lines(
        &mut self,
        cart_id: CartId,
        lock: bool,
    ) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = if lock {
            r"
            SELECT ci.id, ci.product_id, p.name, p.description, ci.quantity, p.price
            FROM commerce.cart_items ci
            JOIN commerce.products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            FOR UPDATE OF ci
            "
        } else {
            r"
            SELECT ci.id, ci.product_id, p.name, p.description, ci.quantity, p.price
            FROM commerce.cart_items ci
            JOIN commerce.products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            "
        };

        let rows = sqlx::query_as::<_, CartLineRow>(sql)
            .bind(cart_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                id: r.id,
                product_id: r.product_id,
                name: r.name,
                description: r.description,
                quantity: r.quantity,
                price: r.price,
            })
            .collect())
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM commerce.cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_customer_addresses(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(customer_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn has_default_address(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM commerce.addresses
                WHERE customer_id = $1 AND is_default
            )
            ",
        )
        .bind(customer_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_address(&mut self, address: &Address) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.addresses
                (id, customer_id, is_default, street, number, city, state, zip_code,
                 address_line, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(address.id)
        .bind(address.customer_id)
        .bind(address.is_default)
        .bind(&address.street)
        .bind(&address.number)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(&address.address_line)
        .bind(address.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "default address"))?;
        Ok(())
    }

    async fn promote_to_default(&mut self, address_id: AddressId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE commerce.addresses SET is_default = TRUE WHERE id = $1")
            .bind(address_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| unique_violation(e, "default address"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_address(
        &mut self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, customer_id, is_default, street, number, city, state, zip_code,
                   address_line, created_at
            FROM commerce.addresses
            WHERE id = $1 AND customer_id = $2
            ",
        )
        .bind(address_id)
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.orders
                (id, customer_id, address_id, total_quantity, total_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.address_id)
        .bind(order.total_quantity)
        .bind(order.total_price)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.order_items (id, order_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO commerce.payments
                (id, order_id, payment_gateway_name, payment_gateway_transaction_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(&payment.gateway)
        .bind(&payment.gateway_transaction_id)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "payment"))?;
        Ok(())
    }

    async fn find_order(
        &mut self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, customer_id, address_id, total_quantity, total_price, created_at
            FROM commerce.orders
            WHERE id = $1 AND customer_id = $2
            ",
        )
        .bind(order_id)
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Order {
            id: r.id,
            customer_id: r.customer_id,
            address_id: r.address_id,
            total_quantity: r.total_quantity,
            total_price: r.total_price,
            created_at: r.created_at,
        }))
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, quantity, price
            FROM commerce.order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OrderItem {
                id: r.id,
                order_id: r.order_id,
                product_id: r.product_id,
                quantity: r.quantity,
                price: r.price,
            })
            .collect())
    }

    async fn find_payment(&mut self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT id, order_id, payment_gateway_name, payment_gateway_transaction_id, created_at
            FROM commerce.payments
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| Payment {
            id: r.id,
            order_id: r.order_id,
            gateway: r.payment_gateway_name,
            gateway_transaction_id: r.payment_gateway_transaction_id,
            created_at: r.created_at,
        }))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
