//! Cart models.
//!
//! A cart belongs to exactly one customer and holds at most one line per
//! product. [`CartSnapshot`] is a *live* read: prices are whatever the
//! catalog says right now, unlike the frozen prices on an order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{CartId, CartItemId, CustomerId, Price, ProductId};

/// A customer's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
}

/// A raw line item row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    /// Always positive; a line that would reach zero is deleted instead.
    pub quantity: i32,
}

/// A line item joined with the product's current name, description and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Line item ID.
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    /// Current unit price.
    pub price: Price,
}

/// A cart with its lines and totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart_id: CartId,
    /// Number of distinct lines.
    pub total_items: usize,
    /// Sum of line quantities.
    pub total_quantity: i64,
    /// Sum of `quantity * price` over all lines.
    pub total_price: Price,
    pub items: Vec<CartLine>,
}
