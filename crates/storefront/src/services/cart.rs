//! Cart store: one cart per customer, one line per product.
//!
//! Every mutation runs in a single transaction that locks the cart, then the
//! product's inventory row, then the line. The stock check and the quantity
//! write therefore see the same stock figure even under concurrent requests.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use cartwheel_core::{CartId, CartItemId, CustomerId, Price, ProductId};

use super::error::line_quantity;
use super::{CommerceError, stock};
use crate::db::{CommerceStore, CommerceTx};
use crate::models::{Cart, CartItem, CartLine, CartSnapshot};

/// Cart operations keyed by the owning customer.
#[derive(Clone)]
pub struct CartStore {
    store: Arc<dyn CommerceStore>,
}

impl CartStore {
    #[must_use]
    pub fn new(store: Arc<dyn CommerceStore>) -> Self {
        Self { store }
    }

    /// Return the customer's cart, creating it if needed.
    ///
    /// Called once at registration; safe to call again.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the store fails.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_or_create(&self, customer_id: CustomerId) -> Result<Cart, CommerceError> {
        let mut tx = self.store.begin().await?;
        if let Some(cart) = tx.find_cart(customer_id).await? {
            return Ok(cart);
        }

        tx.insert_cart(&Cart {
            id: CartId::generate(),
            customer_id,
            created_at: Utc::now(),
        })
        .await?;
        // A concurrent call may have won; read back whichever row exists.
        let cart = tx.find_cart(customer_id).await?.ok_or_else(|| {
            CommerceError::InvariantViolation(format!("cart for {customer_id} vanished after insert"))
        })?;
        tx.commit().await?;

        info!(cart_id = %cart.id, "Cart opened");
        Ok(cart)
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// Only the requested quantity is checked against stock; checkout's
    /// conditional decrement is the final guard for the merged total.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity`, `CartNotFound`, `ProductNotFound` or `StockExceeded`.
    #[instrument(skip(self), fields(customer_id = %customer_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, CommerceError> {
        let quantity = line_quantity(quantity)?;

        let mut tx = self.store.begin().await?;
        let cart = lock_cart(tx.as_mut(), customer_id).await?;
        if tx.find_product(product_id).await?.is_none() {
            return Err(CommerceError::ProductNotFound);
        }
        stock::reserve_in(tx.as_mut(), product_id, quantity).await?;

        match tx.lock_cart_item(cart.id, product_id).await? {
            Some(item) => {
                let merged = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CommerceError::StockExceeded)?;
                tx.update_cart_item_quantity(item.id, merged).await?;
            }
            None => {
                tx.insert_cart_item(&CartItem {
                    id: CartItemId::generate(),
                    cart_id: cart.id,
                    product_id,
                    quantity,
                })
                .await?;
            }
        }

        let snapshot = snapshot_in(tx.as_mut(), cart.id, false).await?;
        tx.commit().await?;

        info!(quantity, "Item added to cart");
        Ok(snapshot)
    }

    /// Raise an existing line by `delta`, as long as the new total is in stock.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity`, `CartNotFound`, `ItemNotFound` or `StockExceeded`.
    #[instrument(skip(self), fields(customer_id = %customer_id, product_id = %product_id))]
    pub async fn increase_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        delta: u32,
    ) -> Result<CartSnapshot, CommerceError> {
        let delta = line_quantity(delta)?;

        let mut tx = self.store.begin().await?;
        let cart = lock_cart(tx.as_mut(), customer_id).await?;
        let item = lock_line(tx.as_mut(), cart.id, product_id).await?;
        let total = item
            .quantity
            .checked_add(delta)
            .ok_or(CommerceError::StockExceeded)?;
        stock::reserve_in(tx.as_mut(), product_id, total).await?;

        tx.update_cart_item_quantity(item.id, total).await?;
        let snapshot = snapshot_in(tx.as_mut(), cart.id, false).await?;
        tx.commit().await?;

        info!(quantity = total, "Cart item increased");
        Ok(snapshot)
    }

    /// Lower an existing line by `delta`. Reaching zero or below removes it.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity`, `CartNotFound` or `ItemNotFound`.
    #[instrument(skip(self), fields(customer_id = %customer_id, product_id = %product_id))]
    pub async fn decrease_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        delta: u32,
    ) -> Result<CartSnapshot, CommerceError> {
        let delta = i64::from(line_quantity(delta)?);

        let mut tx = self.store.begin().await?;
        let cart = lock_cart(tx.as_mut(), customer_id).await?;
        let item = lock_line(tx.as_mut(), cart.id, product_id).await?;

        if delta >= i64::from(item.quantity) {
            tx.delete_cart_item(item.id).await?;
            info!("Cart item removed by decrease");
        } else {
            // delta < quantity, so this fits in i32 and stays positive.
            let remaining = i32::try_from(i64::from(item.quantity) - delta).map_err(|_| {
                CommerceError::InvariantViolation("cart line quantity out of range".to_owned())
            })?;
            tx.update_cart_item_quantity(item.id, remaining).await?;
            info!(quantity = remaining, "Cart item decreased");
        }

        let snapshot = snapshot_in(tx.as_mut(), cart.id, false).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// `CartNotFound` or `ItemNotFound`.
    #[instrument(skip(self), fields(customer_id = %customer_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<CartSnapshot, CommerceError> {
        let mut tx = self.store.begin().await?;
        let cart = lock_cart(tx.as_mut(), customer_id).await?;
        let item = lock_line(tx.as_mut(), cart.id, product_id).await?;

        tx.delete_cart_item(item.id).await?;
        let snapshot = snapshot_in(tx.as_mut(), cart.id, false).await?;
        tx.commit().await?;

        info!("Cart item removed");
        Ok(snapshot)
    }

    /// Current cart contents priced at today's catalog prices.
    ///
    /// # Errors
    ///
    /// `CartNotFound` if the customer has no cart.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn snapshot(&self, customer_id: CustomerId) -> Result<CartSnapshot, CommerceError> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .find_cart(customer_id)
            .await?
            .ok_or(CommerceError::CartNotFound)?;
        snapshot_in(tx.as_mut(), cart.id, false).await
    }
}

pub(crate) async fn lock_cart(
    tx: &mut dyn CommerceTx,
    customer_id: CustomerId,
) -> Result<Cart, CommerceError> {
    tx.lock_cart(customer_id)
        .await?
        .ok_or(CommerceError::CartNotFound)
}

async fn lock_line(
    tx: &mut dyn CommerceTx,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<CartItem, CommerceError> {
    tx.lock_cart_item(cart_id, product_id)
        .await?
        .ok_or(CommerceError::ItemNotFound)
}

/// Read a cart's lines and compute its totals inside an open transaction.
pub(crate) async fn snapshot_in(
    tx: &mut dyn CommerceTx,
    cart_id: CartId,
    lock: bool,
) -> Result<CartSnapshot, CommerceError> {
    let items = tx.cart_lines(cart_id, lock).await?;
    let (total_quantity, total_price) = totals(&items)?;
    Ok(CartSnapshot {
        cart_id,
        total_items: items.len(),
        total_quantity,
        total_price,
        items,
    })
}

/// `(Σ quantity, Σ quantity × price)` over the lines.
fn totals(items: &[CartLine]) -> Result<(i64, Price), CommerceError> {
    let overflow = || CommerceError::InvariantViolation("cart total overflows".to_owned());
    items
        .iter()
        .try_fold((0_i64, Price::ZERO), |(quantity, price), line| {
            let line_total = line.price.times(line.quantity).ok_or_else(overflow)?;
            Ok((
                quantity + i64::from(line.quantity),
                price.checked_add(line_total).ok_or_else(overflow)?,
            ))
        })
}
