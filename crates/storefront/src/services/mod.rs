//! Business logic for the commerce core.
//!
//! # Services
//!
//! - [`StockLedger`] - Available stock per product, admin restock
//! - [`CartStore`] - Cart lines with stock-aware quantity changes
//! - [`AddressResolver`] - Address validation via a cached ZIP lookup
//! - [`CheckoutOrchestrator`] - Atomic cart-to-order conversion
//! - [`CatalogService`] - Product creation and publishing
//!
//! Every service holds an `Arc<dyn CommerceStore>` and runs each operation
//! in exactly one transaction.

mod address;
mod cart;
mod catalog;
mod checkout;
mod error;
mod stock;

pub use address::{AddressInput, AddressResolver};
pub use cart::CartStore;
pub use catalog::{CatalogService, CreatedProduct};
pub use checkout::{CheckoutOrchestrator, CheckoutRequest};
pub use error::{CommerceError, ErrorKind};
pub use stock::StockLedger;
