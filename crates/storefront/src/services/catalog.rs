//! Catalog administration.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use cartwheel_core::{InventoryId, Price, ProductId, ProductStatus};

use super::CommerceError;
use crate::db::CommerceStore;
use crate::models::{Inventory, NewProduct, Product};

/// A product together with its freshly created inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProduct {
    pub product: Product,
    pub inventory: Inventory,
}

/// Creates products and changes their catalog state.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CommerceStore>,
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Arc<dyn CommerceStore>) -> Self {
        Self { store }
    }

    /// Create an unpublished product with an empty inventory row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrice` if the price is zero or negative.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_product(&self, input: NewProduct) -> Result<CreatedProduct, CommerceError> {
        let price = Price::new(input.price)?;

        let product = Product {
            id: ProductId::generate(),
            status: ProductStatus::Unpublished,
            name: input.name,
            description: input.description,
            price,
            created_at: Utc::now(),
        };
        let inventory = Inventory {
            id: InventoryId::generate(),
            product_id: product.id,
            stock_quantity: 0,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_product(&product).await?;
        tx.insert_inventory(&inventory).await?;
        tx.commit().await?;

        info!(product_id = %product.id, inventory_id = %inventory.id, "Product created");
        Ok(CreatedProduct { product, inventory })
    }

    /// Make a product visible in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if the product doesn't exist.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn publish_product(&self, product_id: ProductId) -> Result<(), CommerceError> {
        let mut tx = self.store.begin().await?;
        if !tx
            .set_product_status(product_id, ProductStatus::Published)
            .await?
        {
            return Err(CommerceError::ProductNotFound);
        }
        tx.commit().await?;

        info!("Product published");
        Ok(())
    }

    /// Change a product's current price. Past orders keep their own prices.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrice` for a non-positive price and `ProductNotFound`
    /// if the product doesn't exist.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn change_price(&self, product_id: ProductId, price: i64) -> Result<(), CommerceError> {
        let price = Price::new(price)?;

        let mut tx = self.store.begin().await?;
        if !tx.set_product_price(product_id, price).await? {
            return Err(CommerceError::ProductNotFound);
        }
        tx.commit().await?;

        info!(price = %price, "Product price changed");
        Ok(())
    }

    /// Get a product.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if the product doesn't exist.
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, CommerceError> {
        let mut tx = self.store.begin().await?;
        tx.find_product(product_id)
            .await?
            .ok_or(CommerceError::ProductNotFound)
    }
}
