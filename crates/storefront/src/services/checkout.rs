//! Checkout: turn a cart into an order, order items and a payment record.
//!
//! All steps share one transaction:
//!
//! 1. Lock the cart and read its lines (prices frozen here)
//! 2. Compute totals
//! 3. Conditionally decrement stock for every line
//! 4. Insert the order
//! 5. Insert one order item per line, at the frozen price
//! 6. Insert the payment
//! 7. Clear the cart
//! 8. Commit
//!
//! Any error before the commit drops the transaction, so nothing from a
//! failed checkout is ever visible.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use cartwheel_core::{AddressId, CustomerId, OrderId, OrderItemId, PaymentId};

use super::cart::{lock_cart, snapshot_in};
use super::{CommerceError, stock};
use crate::db::CommerceStore;
use crate::models::{CheckoutReceipt, Order, OrderItem, Payment, PaymentReceipt};

/// Everything checkout needs from the caller.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: CustomerId,
    /// Shipping address; must belong to the customer.
    pub address_id: AddressId,
    /// Authorization already obtained from the payment gateway.
    pub payment: PaymentReceipt,
}

/// Runs checkouts and reads back placed orders.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    store: Arc<dyn CommerceStore>,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn CommerceStore>) -> Self {
        Self { store }
    }

    /// Place an order for everything in the customer's cart.
    ///
    /// # Errors
    ///
    /// - `CartNotFound` / `AddressNotFound` for unknown references
    /// - `EmptyCart` if there is nothing to buy
    /// - `InsufficientStock` if any line can no longer be fulfilled
    /// - an upstream error if the store fails at any step
    #[instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, address_id = %request.address_id)
    )]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, CommerceError> {
        let CheckoutRequest {
            customer_id,
            address_id,
            payment,
        } = request;

        let mut tx = self.store.begin().await?;

        let cart = lock_cart(tx.as_mut(), customer_id).await?;
        if tx.find_address(customer_id, address_id).await?.is_none() {
            return Err(CommerceError::AddressNotFound);
        }

        let snapshot = snapshot_in(tx.as_mut(), cart.id, true).await?;
        if snapshot.items.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        for line in &snapshot.items {
            stock::decrement_in(tx.as_mut(), line.product_id, line.quantity).await?;
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            customer_id,
            address_id,
            total_quantity: snapshot.total_quantity,
            total_price: snapshot.total_price,
            created_at: now,
        };
        tx.insert_order(&order).await?;

        let mut items = Vec::with_capacity(snapshot.items.len());
        for line in &snapshot.items {
            let item = OrderItem {
                id: OrderItemId::generate(),
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
            };
            tx.insert_order_item(&item).await?;
            items.push(item);
        }

        let payment = Payment {
            id: PaymentId::generate(),
            order_id: order.id,
            gateway: payment.gateway,
            gateway_transaction_id: payment.transaction_id,
            created_at: now,
        };
        tx.insert_payment(&payment).await?;

        let cleared = tx.clear_cart(cart.id).await?;
        if cleared != snapshot.items.len() as u64 {
            return Err(CommerceError::InvariantViolation(format!(
                "cart {} changed during checkout: expected {} lines, cleared {cleared}",
                cart.id,
                snapshot.items.len()
            )));
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            total_quantity = order.total_quantity,
            total_price = %order.total_price,
            "Order placed"
        );
        Ok(CheckoutReceipt {
            order,
            items,
            payment,
        })
    }

    /// Read a placed order with its frozen item prices and payment.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` if the order doesn't exist or belongs to someone else.
    #[instrument(skip(self), fields(customer_id = %customer_id, order_id = %order_id))]
    pub async fn get_order(
        &self,
        customer_id: CustomerId,
        order_id: OrderId,
    ) -> Result<CheckoutReceipt, CommerceError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .find_order(customer_id, order_id)
            .await?
            .ok_or(CommerceError::OrderNotFound)?;
        let items = tx.order_items(order_id).await?;
        if items.is_empty() {
            return Err(CommerceError::InvariantViolation(format!(
                "order {order_id} has no items"
            )));
        }
        let payment = tx.find_payment(order_id).await?.ok_or_else(|| {
            CommerceError::InvariantViolation(format!("order {order_id} has no payment"))
        })?;
        Ok(CheckoutReceipt {
            order,
            items,
            payment,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::db::{FailPoint, MemoryStore};
    use crate::services::testing::{seed_address, seed_product};
    use crate::services::{CartStore, CatalogService, StockLedger};
    use cartwheel_core::ProductId;

    struct Fixture {
        store: Arc<MemoryStore>,
        carts: CartStore,
        checkout: CheckoutOrchestrator,
        ledger: StockLedger,
        customer_id: CustomerId,
        address_id: AddressId,
        product_a: ProductId,
        product_b: ProductId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let carts = CartStore::new(store.clone());
        let customer_id = CustomerId::generate();
        carts.get_or_create(customer_id).await.unwrap();
        let address_id = seed_address(&store, customer_id).await;
        let (product_a, _) = seed_product(&store, 2999, 10).await;
        let (product_b, _) = seed_product(&store, 99286, 10).await;
        carts.add_item(customer_id, product_a, 8).await.unwrap();
        carts.add_item(customer_id, product_b, 4).await.unwrap();

        Fixture {
            checkout: CheckoutOrchestrator::new(store.clone()),
            ledger: StockLedger::new(store.clone()),
            store,
            carts,
            customer_id,
            address_id,
            product_a,
            product_b,
        }
    }

    fn request(f: &Fixture) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: f.customer_id,
            address_id: f.address_id,
            payment: PaymentReceipt {
                gateway: "mercado_pago".to_owned(),
                transaction_id: "txn-123".to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn test_checkout_places_order() {
        let f = fixture().await;

        let receipt = f.checkout.checkout(request(&f)).await.unwrap();

        assert_eq!(receipt.order.total_quantity, 12);
        assert_eq!(receipt.order.total_price.minor_units(), 421_136);
        assert_eq!(receipt.order.address_id, f.address_id);
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.payment.order_id, receipt.order.id);
        assert_eq!(receipt.payment.gateway, "mercado_pago");
        assert_eq!(receipt.payment.gateway_transaction_id, "txn-123");

        assert!(f.carts.snapshot(f.customer_id).await.unwrap().items.is_empty());
        assert_eq!(f.ledger.get_available(f.product_a).await.unwrap(), 2);
        assert_eq!(f.ledger.get_available(f.product_b).await.unwrap(), 6);
        assert_eq!(f.store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn test_price_freeze() {
        let f = fixture().await;
        let receipt = f.checkout.checkout(request(&f)).await.unwrap();

        CatalogService::new(f.store.clone())
            .change_price(f.product_a, 1)
            .await
            .unwrap();

        let order = f
            .checkout
            .get_order(f.customer_id, receipt.order.id)
            .await
            .unwrap();
        let item = order
            .items
            .iter()
            .find(|i| i.product_id == f.product_a)
            .unwrap();
        assert_eq!(item.price.minor_units(), 2999);
        assert_eq!(order.order.total_price.minor_units(), 421_136);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let f = fixture().await;
        f.checkout.checkout(request(&f)).await.unwrap();

        assert!(matches!(
            f.checkout.checkout(request(&f)).await,
            Err(CommerceError::EmptyCart)
        ));
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_foreign_address_rejected() {
        let f = fixture().await;
        let other_address = seed_address(&f.store, CustomerId::generate()).await;

        let mut req = request(&f);
        req.address_id = other_address;
        assert!(matches!(
            f.checkout.checkout(req).await,
            Err(CommerceError::AddressNotFound)
        ));
        assert_eq!(f.carts.snapshot(f.customer_id).await.unwrap().total_items, 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let f = fixture().await;
        // Another customer buys most of product B first.
        let rival = CustomerId::generate();
        f.carts.get_or_create(rival).await.unwrap();
        let rival_address = seed_address(&f.store, rival).await;
        f.carts.add_item(rival, f.product_b, 8).await.unwrap();
        f.checkout
            .checkout(CheckoutRequest {
                customer_id: rival,
                address_id: rival_address,
                payment: request(&f).payment,
            })
            .await
            .unwrap();

        let err = f.checkout.checkout(request(&f)).await.unwrap_err();
        assert!(
            matches!(err, CommerceError::InsufficientStock { product_id } if product_id == f.product_b)
        );

        // Product A was decremented first inside the failed transaction.
        assert_eq!(f.ledger.get_available(f.product_a).await.unwrap(), 10);
        assert_eq!(f.ledger.get_available(f.product_b).await.unwrap(), 2);
        assert_eq!(f.carts.snapshot(f.customer_id).await.unwrap().total_quantity, 12);
        assert_eq!(f.store.order_count().await, 1);
    }

    #[rstest]
    #[case(FailPoint::DecrementStock)]
    #[case(FailPoint::InsertOrder)]
    #[case(FailPoint::InsertOrderItem)]
    #[case(FailPoint::InsertPayment)]
    #[case(FailPoint::ClearCart)]
    #[case(FailPoint::Commit)]
    #[tokio::test]
    async fn test_failure_at_any_step_leaves_no_trace(#[case] point: FailPoint) {
        let f = fixture().await;
        f.store.fail_next(point);

        let err = f.checkout.checkout(request(&f)).await.unwrap_err();
        assert!(err.is_retryable());

        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(f.store.order_item_count().await, 0);
        assert_eq!(f.store.payment_count().await, 0);
        assert_eq!(f.ledger.get_available(f.product_a).await.unwrap(), 10);
        assert_eq!(f.ledger.get_available(f.product_b).await.unwrap(), 10);
        let snapshot = f.carts.snapshot(f.customer_id).await.unwrap();
        assert_eq!(snapshot.total_quantity, 12);

        // The same request succeeds on retry.
        assert!(f.checkout.checkout(request(&f)).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_order_is_customer_scoped() {
        let f = fixture().await;
        let receipt = f.checkout.checkout(request(&f)).await.unwrap();

        assert!(matches!(
            f.checkout
                .get_order(CustomerId::generate(), receipt.order.id)
                .await,
            Err(CommerceError::OrderNotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        let carts = CartStore::new(store.clone());
        let checkout = CheckoutOrchestrator::new(store.clone());
        let (product_id, _) = seed_product(&store, 1500, 3).await;

        let mut requests = Vec::new();
        for _ in 0..6 {
            let customer_id = CustomerId::generate();
            carts.get_or_create(customer_id).await.unwrap();
            carts.add_item(customer_id, product_id, 1).await.unwrap();
            requests.push(CheckoutRequest {
                customer_id,
                address_id: seed_address(&store, customer_id).await,
                payment: PaymentReceipt {
                    gateway: "mercado_pago".to_owned(),
                    transaction_id: format!("txn-{customer_id}"),
                },
            });
        }

        let mut set = tokio::task::JoinSet::new();
        for request in requests {
            let checkout = checkout.clone();
            set.spawn(async move { checkout.checkout(request).await });
        }

        let (mut placed, mut rejected) = (0, 0);
        while let Some(result) = set.join_next().await {
            match result.unwrap() {
                Ok(_) => placed += 1,
                Err(CommerceError::InsufficientStock { product_id: p }) if p == product_id => {
                    rejected += 1;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(placed, 3);
        assert_eq!(rejected, 3);
        assert_eq!(store.order_count().await, 3);
        assert_eq!(
            StockLedger::new(store.clone()).get_available(product_id).await.unwrap(),
            0
        );
    }
}
