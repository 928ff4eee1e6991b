//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::db::CommerceStore;
use crate::services::{AddressResolver, CartStore, CatalogService, CheckoutOrchestrator, StockLedger};
use crate::zipcode::{ZipCodeCache, ZipCodeLookup};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the commerce
/// services, which all share one store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn CommerceStore>,
    stock: StockLedger,
    carts: CartStore,
    addresses: AddressResolver,
    checkout: CheckoutOrchestrator,
    catalog: CatalogService,
    checkout_timeout: Duration,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional storage
    /// * `lookup` - External ZIP code gateway
    /// * `cache` - ZIP code cache in front of `lookup`
    /// * `lookup_timeout` - Bound on a single ZIP lookup
    /// * `checkout_timeout` - Bound on a whole checkout transaction
    #[must_use]
    pub fn new(
        store: Arc<dyn CommerceStore>,
        lookup: Arc<dyn ZipCodeLookup>,
        cache: Arc<dyn ZipCodeCache>,
        lookup_timeout: Duration,
        checkout_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                stock: StockLedger::new(Arc::clone(&store)),
                carts: CartStore::new(Arc::clone(&store)),
                addresses: AddressResolver::new(Arc::clone(&store), lookup, cache, lookup_timeout),
                checkout: CheckoutOrchestrator::new(Arc::clone(&store)),
                catalog: CatalogService::new(Arc::clone(&store)),
                store,
                checkout_timeout,
            }),
        }
    }

    /// Get the underlying store (readiness checks).
    #[must_use]
    pub fn store(&self) -> &dyn CommerceStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn stock(&self) -> &StockLedger {
        &self.inner.stock
    }

    #[must_use]
    pub fn carts(&self) -> &CartStore {
        &self.inner.carts
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressResolver {
        &self.inner.addresses
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// How long a checkout may run before it is abandoned.
    #[must_use]
    pub fn checkout_timeout(&self) -> Duration {
        self.inner.checkout_timeout
    }
}
