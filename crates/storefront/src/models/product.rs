//! Catalog and inventory models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwheel_core::{InventoryId, Price, ProductId, ProductStatus};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Catalog visibility.
    pub status: ProductStatus,
    /// Display name.
    pub name: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Current unit price. Orders capture their own copy.
    pub price: Price,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    /// Price in minor currency units; must be non-zero.
    pub price: i64,
}

/// The stock row for a product (1:1 with [`Product`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Unique inventory ID (the handle admins restock by).
    pub id: InventoryId,
    /// Product this stock belongs to.
    pub product_id: ProductId,
    /// Units available to sell. Never negative.
    pub stock_quantity: i32,
}
