//! Catalog, stock and cart commands.
//!
//! These go through the same services as the HTTP API, so every rule the
//! API enforces (non-zero price, positive stock additions) holds here too.

use std::sync::Arc;

use cartwheel_core::{CustomerId, InventoryId, ProductId};
use cartwheel_storefront::db::{CommerceStore, PgCommerceStore};
use cartwheel_storefront::models::NewProduct;
use cartwheel_storefront::services::{CartStore, CatalogService, StockLedger};

use super::{CommandError, connect};

async fn store() -> Result<Arc<dyn CommerceStore>, CommandError> {
    Ok(Arc::new(PgCommerceStore::new(connect().await?)))
}

/// Create a product and its inventory.
pub async fn add_product(
    name: String,
    description: Option<String>,
    price: i64,
) -> Result<(), CommandError> {
    let created = CatalogService::new(store().await?)
        .add_product(NewProduct {
            name,
            description,
            price,
        })
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Product created");
        println!("  product:   {}", created.product.id);
        println!("  inventory: {}", created.inventory.id);
    }
    Ok(())
}

pub async fn publish(id: ProductId) -> Result<(), CommandError> {
    CatalogService::new(store().await?).publish_product(id).await?;
    tracing::info!(product_id = %id, "Product published");
    Ok(())
}

pub async fn change_price(id: ProductId, price: i64) -> Result<(), CommandError> {
    CatalogService::new(store().await?)
        .change_price(id, price)
        .await?;
    tracing::info!(product_id = %id, price, "Price changed");
    Ok(())
}

pub async fn add_stock(id: InventoryId, amount: u32) -> Result<(), CommandError> {
    StockLedger::new(store().await?).add_stock(id, amount).await?;
    tracing::info!(inventory_id = %id, amount, "Stock added");
    Ok(())
}

pub async fn show_stock(product_id: ProductId) -> Result<(), CommandError> {
    let available = StockLedger::new(store().await?)
        .get_available(product_id)
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{product_id}: {available} available");
    }
    Ok(())
}

pub async fn open_cart(customer_id: CustomerId) -> Result<(), CommandError> {
    let cart = CartStore::new(store().await?)
        .get_or_create(customer_id)
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Cart {} for customer {customer_id}", cart.id);
    }
    Ok(())
}
