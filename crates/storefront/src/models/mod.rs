//! Domain models for the commerce core.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. Read-side types serialize to camelCase JSON so the HTTP
//! layer can hand them out unchanged.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;

pub use address::{Address, NewAddress};
pub use cart::{Cart, CartItem, CartLine, CartSnapshot};
pub use order::{CheckoutReceipt, NewOrder, Order, OrderItem, Payment, PaymentReceipt};
pub use product::{Inventory, NewProduct, Product};
