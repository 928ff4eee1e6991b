//! In-memory [`CommerceStore`] for tests.
//!
//! `begin` takes an exclusive lock on the whole state and works on a copy;
//! `commit` writes the copy back. Transactions are therefore fully serialized,
//! which is stricter than the row locks the `PostgreSQL` adapter takes.
//!
//! [`MemoryStore::fail_next`] arms a one-shot failure at a given write so tests
//! can prove a half-finished operation leaves nothing behind.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use cartwheel_core::{
    AddressId, CartId, CartItemId, CustomerId, InventoryId, OrderId, Price, ProductId,
    ProductStatus,
};

use super::{CommerceStore, CommerceTx, RepositoryError, StockWrite};
use crate::models::{
    Address, Cart, CartItem, CartLine, Inventory, Order, OrderItem, Payment, Product,
};

/// A write that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    DecrementStock,
    InsertOrder,
    InsertOrderItem,
    InsertPayment,
    ClearCart,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: Vec<Product>,
    inventories: Vec<Inventory>,
    carts: Vec<Cart>,
    // Insertion order doubles as line order.
    cart_items: Vec<CartItem>,
    addresses: Vec<Address>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    payments: Vec<Payment>,
}

type Faults = Arc<std::sync::Mutex<HashSet<FailPoint>>>;

/// How long `begin` waits for the running transaction to finish.
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Store that keeps everything in process memory.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Faults,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            faults: Faults::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound how long `begin` waits behind another open transaction.
    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Make the next call that reaches `point` fail with
    /// [`RepositoryError::Unavailable`].
    pub fn fail_next(&self, point: FailPoint) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Number of committed payments.
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }

    /// Number of committed order items.
    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.order_items.len()
    }
}

#[async_trait]
impl CommerceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn CommerceTx>, RepositoryError> {
        let guard = tokio::time::timeout(self.lock_timeout, Arc::clone(&self.state).lock_owned())
            .await
            .map_err(|_| {
                RepositoryError::Unavailable(format!(
                    "no transaction slot within {:?}",
                    self.lock_timeout
                ))
            })?;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            faults: Arc::clone(&self.faults),
        }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    faults: Faults,
}

impl MemoryTx {
    fn trip(&self, point: FailPoint) -> Result<(), RepositoryError> {
        let armed = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&point);
        if armed {
            return Err(RepositoryError::Unavailable(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceTx for MemoryTx {
    async fn insert_product(&mut self, product: &Product) -> Result<(), RepositoryError> {
        if self.work.products.iter().any(|p| p.id == product.id) {
            return Err(RepositoryError::Conflict("product already exists".to_owned()));
        }
        self.work.products.push(product.clone());
        Ok(())
    }

    async fn insert_inventory(&mut self, inventory: &Inventory) -> Result<(), RepositoryError> {
        if self
            .work
            .inventories
            .iter()
            .any(|i| i.id == inventory.id || i.product_id == inventory.product_id)
        {
            return Err(RepositoryError::Conflict("inventory already exists".to_owned()));
        }
        self.work.inventories.push(*inventory);
        Ok(())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.work.products.iter().find(|p| p.id == id).cloned())
    }

    async fn set_product_status(
        &mut self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .work
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .map(|p| p.status = status)
            .is_some())
    }

    async fn set_product_price(
        &mut self,
        id: ProductId,
        price: Price,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .work
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .map(|p| p.price = price)
            .is_some())
    }

    async fn lock_inventory_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<Inventory>, RepositoryError> {
        Ok(self
            .work
            .inventories
            .iter()
            .find(|i| i.product_id == product_id)
            .copied())
    }

    async fn increment_stock(
        &mut self,
        inventory_id: InventoryId,
        amount: i32,
    ) -> Result<Option<StockWrite>, RepositoryError> {
        let Some(inventory) = self.work.inventories.iter_mut().find(|i| i.id == inventory_id)
        else {
            return Ok(None);
        };
        Ok(Some(match inventory.stock_quantity.checked_add(amount) {
            Some(total) => {
                inventory.stock_quantity = total;
                StockWrite::Applied
            }
            None => StockWrite::Rejected,
        }))
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        amount: i32,
    ) -> Result<StockWrite, RepositoryError> {
        self.trip(FailPoint::DecrementStock)?;
        match self
            .work
            .inventories
            .iter_mut()
            .find(|i| i.product_id == product_id)
        {
            Some(inventory) if inventory.stock_quantity >= amount => {
                inventory.stock_quantity -= amount;
                Ok(StockWrite::Applied)
            }
            _ => Ok(StockWrite::Rejected),
        }
    }

    async fn find_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self
            .work
            .carts
            .iter()
            .find(|c| c.customer_id == customer_id)
            .copied())
    }

    async fn lock_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>, RepositoryError> {
        self.find_cart(customer_id).await
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<(), RepositoryError> {
        if !self.work.carts.iter().any(|c| c.customer_id == cart.customer_id) {
            self.work.carts.push(*cart);
        }
        Ok(())
    }

    async fn lock_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .work
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .copied())
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> Result<(), RepositoryError> {
        if self
            .work
            .cart_items
            .iter()
            .any(|i| i.cart_id == item.cart_id && i.product_id == item.product_id)
        {
            return Err(RepositoryError::Conflict("cart line already exists".to_owned()));
        }
        self.work.cart_items.push(*item);
        Ok(())
    }

    async fn update_cart_item_quantity(
        &mut self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let item = self
            .work
            .cart_items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(RepositoryError::NotFound)?;
        item.quantity = quantity;
        Ok(())
    }

    async fn delete_cart_item(&mut self, id: CartItemId) -> Result<(), RepositoryError> {
        let before = self.work.cart_items.len();
        self.work.cart_items.retain(|i| i.id != id);
        if self.work.cart_items.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn cart_lines(
        &mut self,
        cart_id: CartId,
        _lock: bool,
    ) -> Result<Vec<CartLine>, RepositoryError> {
        self.work
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .map(|item| {
                let product = self
                    .work
                    .products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "cart line {} references missing product {}",
                            item.id, item.product_id
                        ))
                    })?;
                Ok(CartLine {
                    id: item.id,
                    product_id: item.product_id,
                    name: product.name.clone(),
                    description: product.description.clone(),
                    quantity: item.quantity,
                    price: product.price,
                })
            })
            .collect()
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64, RepositoryError> {
        self.trip(FailPoint::ClearCart)?;
        let before = self.work.cart_items.len();
        self.work.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - self.work.cart_items.len()) as u64)
    }

    async fn lock_customer_addresses(
        &mut self,
        _customer_id: CustomerId,
    ) -> Result<(), RepositoryError> {
        // The whole-state lock taken in `begin` already serializes writers.
        Ok(())
    }

    async fn has_default_address(
        &mut self,
        customer_id: CustomerId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .work
            .addresses
            .iter()
            .any(|a| a.customer_id == customer_id && a.is_default))
    }

    async fn insert_address(&mut self, address: &Address) -> Result<(), RepositoryError> {
        if address.is_default && self.has_default_address(address.customer_id).await? {
            return Err(RepositoryError::Conflict(
                "default address already exists".to_owned(),
            ));
        }
        self.work.addresses.push(address.clone());
        Ok(())
    }

    async fn promote_to_default(&mut self, address_id: AddressId) -> Result<(), RepositoryError> {
        let customer_id = self
            .work
            .addresses
            .iter()
            .find(|a| a.id == address_id)
            .map(|a| a.customer_id)
            .ok_or(RepositoryError::NotFound)?;
        if self
            .work
            .addresses
            .iter()
            .any(|a| a.customer_id == customer_id && a.is_default && a.id != address_id)
        {
            return Err(RepositoryError::Conflict(
                "default address already exists".to_owned(),
            ));
        }
        for address in &mut self.work.addresses {
            if address.id == address_id {
                address.is_default = true;
            }
        }
        Ok(())
    }

    async fn find_address(
        &mut self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        Ok(self
            .work
            .addresses
            .iter()
            .find(|a| a.id == address_id && a.customer_id == customer_id)
            .cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        self.trip(FailPoint::InsertOrder)?;
        self.work.orders.push(order.clone());
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), RepositoryError> {
        self.trip(FailPoint::InsertOrderItem)?;
        self.work.order_items.push(item.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), RepositoryError> {
        self.trip(FailPoint::InsertPayment)?;
        if self.work.payments.iter().any(|p| p.order_id == payment.order_id) {
            return Err(RepositoryError::Conflict("payment already exists".to_owned()));
        }
        self.work.payments.push(payment.clone());
        Ok(())
    }

    async fn find_order(
        &mut self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .work
            .orders
            .iter()
            .find(|o| o.id == order_id && o.customer_id == customer_id)
            .cloned())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .work
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_payment(&mut self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self
            .work
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.trip(FailPoint::Commit)?;
        let Self {
            mut guard, work, ..
        } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(price: i64) -> Product {
        Product {
            id: ProductId::generate(),
            status: ProductStatus::Published,
            name: "Widget".to_owned(),
            description: None,
            price: Price::new(price).unwrap(),
            created_at: Utc::now(),
        }
    }

    async fn seed(store: &MemoryStore, stock: i32) -> ProductId {
        let product = product(100);
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.insert_inventory(&Inventory {
            id: InventoryId::generate(),
            product_id: product.id,
            stock_quantity: stock,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        product.id
    }

    #[tokio::test]
    async fn test_begin_gives_up_behind_open_transaction() {
        let store = MemoryStore::new().with_lock_timeout(Duration::from_millis(50));
        let _held = store.begin().await.unwrap();

        assert!(matches!(
            store.begin().await,
            Err(RepositoryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryStore::new();
        let product_id = seed(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.decrement_stock(product_id, 5).await.unwrap(),
            StockWrite::Applied
        );
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        let inventory = tx.lock_inventory_for_product(product_id).await.unwrap();
        assert_eq!(inventory.unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_decrement_is_conditional() {
        let store = MemoryStore::new();
        let product_id = seed(&store, 3).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.decrement_stock(product_id, 4).await.unwrap(),
            StockWrite::Rejected
        );
        assert_eq!(
            tx.decrement_stock(product_id, 3).await.unwrap(),
            StockWrite::Applied
        );
        assert_eq!(
            tx.decrement_stock(ProductId::generate(), 1).await.unwrap(),
            StockWrite::Rejected
        );
    }

    #[tokio::test]
    async fn test_fail_point_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(FailPoint::Commit);

        let tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(RepositoryError::Unavailable(_))
        ));

        let tx = store.begin().await.unwrap();
        assert!(tx.commit().await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_cart_is_idempotent_per_customer() {
        let store = MemoryStore::new();
        let customer_id = CustomerId::generate();
        let mut tx = store.begin().await.unwrap();
        for _ in 0..2 {
            tx.insert_cart(&Cart {
                id: CartId::generate(),
                customer_id,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        let first = tx.find_cart(customer_id).await.unwrap().unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.find_cart(customer_id).await.unwrap(), Some(first));
    }
}
