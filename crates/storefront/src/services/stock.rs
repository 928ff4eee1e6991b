//! Stock ledger: the only writer of inventory quantities.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use cartwheel_core::{InventoryId, ProductId};

use super::CommerceError;
use crate::db::{CommerceStore, CommerceTx, StockWrite};

/// Reads and adjusts available stock.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn CommerceStore>,
}

impl StockLedger {
    /// Create a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CommerceStore>) -> Self {
        Self { store }
    }

    /// Units currently available for a product.
    ///
    /// # Errors
    ///
    /// Returns `InventoryNotFound` if the product has no inventory row.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_available(&self, product_id: ProductId) -> Result<i32, CommerceError> {
        let mut tx = self.store.begin().await?;
        available_in(tx.as_mut(), product_id).await
    }

    /// Admin restock: add `amount` units to an inventory row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `amount` is zero or out of range,
    /// `InventoryNotFound` if the row doesn't exist, and `StockOverflow` if
    /// the row can't hold that many more units.
    #[instrument(skip(self), fields(inventory_id = %inventory_id))]
    pub async fn add_stock(&self, inventory_id: InventoryId, amount: u32) -> Result<(), CommerceError> {
        if amount == 0 {
            return Err(CommerceError::InvalidAmount);
        }
        let amount = i32::try_from(amount).map_err(|_| CommerceError::InvalidAmount)?;

        let mut tx = self.store.begin().await?;
        match tx.increment_stock(inventory_id, amount).await? {
            Some(StockWrite::Applied) => {}
            Some(StockWrite::Rejected) => {
                warn!(amount, "Stock addition would overflow the inventory row");
                return Err(CommerceError::StockOverflow);
            }
            None => return Err(CommerceError::InventoryNotFound),
        }
        tx.commit().await?;

        info!(amount, "Stock added");
        Ok(())
    }
}

/// Available stock read (and row-locked) inside an open transaction.
pub(crate) async fn available_in(
    tx: &mut dyn CommerceTx,
    product_id: ProductId,
) -> Result<i32, CommerceError> {
    tx.lock_inventory_for_product(product_id)
        .await?
        .map(|inventory| inventory.stock_quantity)
        .ok_or(CommerceError::InventoryNotFound)
}

/// Check that `quantity` units could be taken, without taking them.
///
/// The inventory row stays locked until `tx` ends, so the caller's
/// following write cannot race another reservation.
pub(crate) async fn reserve_in(
    tx: &mut dyn CommerceTx,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), CommerceError> {
    let available = available_in(tx, product_id).await?;
    if quantity > available {
        warn!(product_id = %product_id, quantity, available, "Reservation exceeds stock");
        return Err(CommerceError::StockExceeded);
    }
    Ok(())
}

/// Take `quantity` units, only if that many are available.
pub(crate) async fn decrement_in(
    tx: &mut dyn CommerceTx,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), CommerceError> {
    match tx.decrement_stock(product_id, quantity).await? {
        StockWrite::Applied => Ok(()),
        StockWrite::Rejected => {
            warn!(product_id = %product_id, quantity, "Conditional stock decrement rejected");
            Err(CommerceError::InsufficientStock { product_id })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::CatalogService;
    use crate::services::testing::seed_product;

    #[tokio::test]
    async fn test_new_product_has_zero_stock() {
        let store = Arc::new(MemoryStore::new());
        let created = CatalogService::new(store.clone())
            .add_product(crate::models::NewProduct {
                name: "Lamp".to_owned(),
                description: None,
                price: 1500,
            })
            .await
            .unwrap();

        let ledger = StockLedger::new(store);
        assert_eq!(ledger.get_available(created.product.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_stock_accumulates() {
        let store = Arc::new(MemoryStore::new());
        let (product_id, inventory_id) = seed_product(&store, 2999, 0).await;
        let ledger = StockLedger::new(store);

        ledger.add_stock(inventory_id, 10).await.unwrap();
        ledger.add_stock(inventory_id, 5).await.unwrap();

        assert_eq!(ledger.get_available(product_id).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_add_stock_rejects_zero() {
        let store = Arc::new(MemoryStore::new());
        let (_, inventory_id) = seed_product(&store, 2999, 3).await;
        let ledger = StockLedger::new(store);

        assert!(matches!(
            ledger.add_stock(inventory_id, 0).await,
            Err(CommerceError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn test_add_stock_overflow_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let (product_id, inventory_id) = seed_product(&store, 2999, i32::MAX - 1).await;
        let ledger = StockLedger::new(store);

        let err = ledger.add_stock(inventory_id, 2).await.unwrap_err();
        assert!(matches!(err, CommerceError::StockOverflow));
        assert_eq!(err.kind(), crate::services::ErrorKind::Conflict);
        assert!(!err.is_retryable());
        assert_eq!(ledger.get_available(product_id).await.unwrap(), i32::MAX - 1);

        ledger.add_stock(inventory_id, 1).await.unwrap();
        assert_eq!(ledger.get_available(product_id).await.unwrap(), i32::MAX);
    }

    #[tokio::test]
    async fn test_add_stock_unknown_inventory() {
        let ledger = StockLedger::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            ledger.add_stock(InventoryId::generate(), 1).await,
            Err(CommerceError::InventoryNotFound)
        ));
    }

    #[tokio::test]
    async fn test_get_available_unknown_product() {
        let ledger = StockLedger::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            ledger.get_available(ProductId::generate()).await,
            Err(CommerceError::InventoryNotFound)
        ));
    }

    #[tokio::test]
    async fn test_reserve_does_not_mutate() {
        let store = Arc::new(MemoryStore::new());
        let (product_id, _) = seed_product(&store, 2999, 10).await;

        let mut tx = store.begin().await.unwrap();
        reserve_in(tx.as_mut(), product_id, 10).await.unwrap();
        assert!(matches!(
            reserve_in(tx.as_mut(), product_id, 11).await,
            Err(CommerceError::StockExceeded)
        ));
        tx.commit().await.unwrap();

        let ledger = StockLedger::new(store);
        assert_eq!(ledger.get_available(product_id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let store = Arc::new(MemoryStore::new());
        let (product_id, _) = seed_product(&store, 2999, 4).await;

        let mut tx = store.begin().await.unwrap();
        decrement_in(tx.as_mut(), product_id, 3).await.unwrap();
        let err = decrement_in(tx.as_mut(), product_id, 2).await.unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientStock { product_id: p } if p == product_id));
        tx.commit().await.unwrap();

        let ledger = StockLedger::new(store);
        assert_eq!(ledger.get_available(product_id).await.unwrap(), 1);
    }
}
