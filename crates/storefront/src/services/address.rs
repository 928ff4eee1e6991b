//! Address resolver: validate, geocode through a cached ZIP lookup, persist.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use cartwheel_core::{AddressId, CustomerId, StreetNumber, UsState, ZipCode};

use super::CommerceError;
use crate::db::CommerceStore;
use crate::models::{Address, NewAddress};
use crate::zipcode::{ZipCodeCache, ZipCodeLookup, ZipLocation};

/// Raw address input as typed by the customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// Validates shipping addresses and stores them.
#[derive(Clone)]
pub struct AddressResolver {
    store: Arc<dyn CommerceStore>,
    lookup: Arc<dyn ZipCodeLookup>,
    cache: Arc<dyn ZipCodeCache>,
    lookup_timeout: Duration,
}

impl AddressResolver {
    /// Create a resolver. Gateway calls taking longer than `lookup_timeout`
    /// fail with `UpstreamUnavailable`.
    #[must_use]
    pub fn new(
        store: Arc<dyn CommerceStore>,
        lookup: Arc<dyn ZipCodeLookup>,
        cache: Arc<dyn ZipCodeCache>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            store,
            lookup,
            cache,
            lookup_timeout,
        }
    }

    /// Validate and store a new address for `customer_id`.
    ///
    /// Checks run in order and the first failure wins: state code, ZIP
    /// format, street number, ZIP resolution, then city/state agreement.
    /// The customer's first address becomes their default.
    ///
    /// # Errors
    ///
    /// `InvalidAddress`, `ZipNotResolvable`, `AddressMismatch`, or an
    /// upstream error from the gateway, cache or store.
    #[instrument(skip(self, input), fields(customer_id = %customer_id, zip = %input.zip_code))]
    pub async fn resolve(
        &self,
        customer_id: CustomerId,
        input: AddressInput,
    ) -> Result<Address, CommerceError> {
        let state = UsState::parse(&input.state)?;
        let zip_code = ZipCode::parse(&input.zip_code)?;
        let number = StreetNumber::parse(&input.number)?;

        let location = self.locate(&zip_code).await?;
        if location.city != input.city || location.state != input.state {
            debug!(
                resolved_city = %location.city,
                resolved_state = %location.state,
                "ZIP code location mismatch"
            );
            return Err(CommerceError::AddressMismatch);
        }

        let new_address = NewAddress {
            customer_id,
            street: input.street,
            number,
            city: input.city,
            state,
            zip_code,
        };
        self.persist(new_address).await
    }

    /// Cache-aside ZIP lookup.
    async fn locate(&self, zip: &ZipCode) -> Result<ZipLocation, CommerceError> {
        if let Some(location) = self.cache.get(zip).await? {
            return Ok(location);
        }

        let location = tokio::time::timeout(self.lookup_timeout, self.lookup.lookup(zip))
            .await
            .map_err(|_| CommerceError::UpstreamUnavailable("ZIP code lookup"))??
            .ok_or(CommerceError::ZipNotResolvable)?;

        // A failed write only costs a future gateway call.
        if let Err(e) = self.cache.set(zip, &location).await {
            warn!(error = %e, "Failed to cache ZIP code location");
        }
        Ok(location)
    }

    async fn persist(&self, new_address: NewAddress) -> Result<Address, CommerceError> {
        let customer_id = new_address.customer_id;
        let mut address = Address {
            id: AddressId::generate(),
            customer_id,
            is_default: false,
            address_line: new_address.address_line(),
            street: new_address.street,
            number: new_address.number.into(),
            city: new_address.city,
            state: new_address.state.into(),
            zip_code: new_address.zip_code.into(),
            created_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        tx.lock_customer_addresses(customer_id).await?;
        let promote = !tx.has_default_address(customer_id).await?;
        tx.insert_address(&address).await?;
        if promote {
            tx.promote_to_default(address.id).await?;
            address.is_default = true;
        }
        tx.commit().await?;

        info!(address_id = %address.id, is_default = address.is_default, "Address created");
        Ok(address)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mockall::predicate::always;

    use super::*;
    use crate::db::MemoryStore;
    use crate::zipcode::{MockZipCodeCache, MockZipCodeLookup, MokaZipCache, ZipCodeError};
    use cartwheel_core::AddressPartError;

    fn austin() -> ZipLocation {
        ZipLocation {
            city: "Austin".to_owned(),
            state: "TX".to_owned(),
        }
    }

    fn input(state: &str, zip: &str, number: &str) -> AddressInput {
        AddressInput {
            street: "Congress Ave".to_owned(),
            number: number.to_owned(),
            city: "Austin".to_owned(),
            state: state.to_owned(),
            zip_code: zip.to_owned(),
        }
    }

    fn resolver(lookup: MockZipCodeLookup) -> AddressResolver {
        AddressResolver::new(
            Arc::new(MemoryStore::new()),
            Arc::new(lookup),
            Arc::new(MokaZipCache::new(100)),
            Duration::from_secs(5),
        )
    }

    fn never_called() -> MockZipCodeLookup {
        let mut lookup = MockZipCodeLookup::new();
        lookup.expect_lookup().never();
        lookup
    }

    #[tokio::test]
    async fn test_first_address_is_default_second_is_not() {
        let mut lookup = MockZipCodeLookup::new();
        lookup
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(Some(austin())));
        let resolver = resolver(lookup);
        let customer_id = CustomerId::generate();

        let first = resolver
            .resolve(customer_id, input("TX", "73301", "1100"))
            .await
            .unwrap();
        assert!(first.is_default);
        assert_eq!(first.address_line, "1100 Congress Ave, Austin, TX 73301");

        // Served from cache: the mock allows a single gateway call.
        let second = resolver
            .resolve(customer_id, input("TX", "73301", "1200"))
            .await
            .unwrap();
        assert!(!second.is_default);
    }

    #[tokio::test]
    async fn test_default_is_per_customer() {
        let mut lookup = MockZipCodeLookup::new();
        lookup.expect_lookup().returning(|_| Ok(Some(austin())));
        let resolver = resolver(lookup);

        let a = resolver
            .resolve(CustomerId::generate(), input("TX", "73301", "1"))
            .await
            .unwrap();
        let b = resolver
            .resolve(CustomerId::generate(), input("TX", "73301", "2"))
            .await
            .unwrap();
        assert!(a.is_default);
        assert!(b.is_default);
    }

    #[tokio::test]
    async fn test_validation_order() {
        let resolver = resolver(never_called());
        let customer_id = CustomerId::generate();

        // Everything is wrong; state is reported first.
        let err = resolver
            .resolve(customer_id, input("XX", "abc", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidAddress(AddressPartError::InvalidState)
        ));

        let err = resolver
            .resolve(customer_id, input("tx", "7330", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidAddress(AddressPartError::InvalidZip)
        ));

        let err = resolver
            .resolve(customer_id, input("TX", "73301", "12B"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InvalidAddress(AddressPartError::InvalidStreetNumber)
        ));
    }

    #[tokio::test]
    async fn test_unknown_zip_is_not_cached() {
        let mut lookup = MockZipCodeLookup::new();
        lookup.expect_lookup().times(2).returning(|_| Ok(None));
        let resolver = resolver(lookup);
        let customer_id = CustomerId::generate();

        for _ in 0..2 {
            assert!(matches!(
                resolver
                    .resolve(customer_id, input("TX", "99999", "1"))
                    .await,
                Err(CommerceError::ZipNotResolvable)
            ));
        }
    }

    #[tokio::test]
    async fn test_city_state_mismatch() {
        let mut lookup = MockZipCodeLookup::new();
        lookup.expect_lookup().returning(|_| Ok(Some(austin())));
        let resolver = resolver(lookup);
        let customer_id = CustomerId::generate();

        let mut wrong_city = input("TX", "73301", "1");
        wrong_city.city = "Dallas".to_owned();
        assert!(matches!(
            resolver.resolve(customer_id, wrong_city).await,
            Err(CommerceError::AddressMismatch)
        ));

        // State parsing is case-insensitive but the comparison is exact.
        assert!(matches!(
            resolver.resolve(customer_id, input("tx", "73301", "1")).await,
            Err(CommerceError::AddressMismatch)
        ));
    }

    #[tokio::test]
    async fn test_gateway_error_is_upstream() {
        let mut lookup = MockZipCodeLookup::new();
        lookup.expect_lookup().returning(|_| {
            Err(ZipCodeError::UnexpectedStatus {
                status: 500,
                body: String::new(),
            })
        });
        let err = resolver(lookup)
            .resolve(CustomerId::generate(), input("TX", "73301", "1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    /// Gateway that never answers in time.
    struct StalledLookup;

    #[async_trait::async_trait]
    impl ZipCodeLookup for StalledLookup {
        async fn lookup(&self, _zip: &ZipCode) -> Result<Option<ZipLocation>, ZipCodeError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(austin()))
        }
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let resolver = AddressResolver::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StalledLookup),
            Arc::new(MokaZipCache::new(100)),
            Duration::from_millis(20),
        );

        let err = resolver
            .resolve(CustomerId::generate(), input("TX", "73301", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::UpstreamUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_gateway() {
        let mut cache = MockZipCodeCache::new();
        cache.expect_get().returning(|_| Ok(Some(austin())));
        cache.expect_set().never();

        let resolver = AddressResolver::new(
            Arc::new(MemoryStore::new()),
            Arc::new(never_called()),
            Arc::new(cache),
            Duration::from_secs(5),
        );

        let address = resolver
            .resolve(CustomerId::generate(), input("TX", "73301", "1"))
            .await
            .unwrap();
        assert_eq!(address.city, "Austin");
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_not_fatal() {
        let mut cache = MockZipCodeCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_set()
            .with(always(), always())
            .times(1)
            .returning(|_, _| Err(crate::zipcode::ZipCacheError::Unavailable("down".to_owned())));
        let mut lookup = MockZipCodeLookup::new();
        lookup.expect_lookup().returning(|_| Ok(Some(austin())));

        let resolver = AddressResolver::new(
            Arc::new(MemoryStore::new()),
            Arc::new(lookup),
            Arc::new(cache),
            Duration::from_secs(5),
        );

        assert!(
            resolver
                .resolve(CustomerId::generate(), input("TX", "73301", "1"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_cache_read_failure_is_upstream() {
        let mut cache = MockZipCodeCache::new();
        cache
            .expect_get()
            .returning(|_| Err(crate::zipcode::ZipCacheError::Unavailable("down".to_owned())));

        let resolver = AddressResolver::new(
            Arc::new(MemoryStore::new()),
            Arc::new(never_called()),
            Arc::new(cache),
            Duration::from_secs(5),
        );

        let err = resolver
            .resolve(CustomerId::generate(), input("TX", "73301", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Cache(_)));
        assert!(err.is_retryable());
    }
}
