//! Order, order item and payment models.
//!
//! All three are written once by checkout and never updated. `OrderItem::price`
//! is the unit price at checkout time; historical order pricing is always read
//! from here, never from the live product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwheel_core::{AddressId, CustomerId, OrderId, OrderItemId, PaymentId, Price, ProductId};

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    /// Shipping address chosen at checkout.
    pub address_id: AddressId,
    pub total_quantity: i64,
    pub total_price: Price,
    pub created_at: DateTime<Utc>,
}

/// Totals computed from a cart snapshot, before an order ID exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub address_id: AddressId,
    pub total_quantity: i64,
    pub total_price: Price,
}

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price frozen at checkout.
    pub price: Price,
}

/// The payment record linking an order to the gateway transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub gateway: String,
    pub gateway_transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// What the payment collaborator hands to checkout, recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub gateway: String,
    pub transaction_id: String,
}

/// Everything a successful checkout wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
}
