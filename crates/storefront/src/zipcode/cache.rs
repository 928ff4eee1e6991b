//! ZIP code cache.

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;
use tracing::debug;

use cartwheel_core::ZipCode;

use super::ZipLocation;

/// Errors raised by a ZIP code cache.
#[derive(Debug, Error)]
pub enum ZipCacheError {
    /// A stored value could not be encoded or decoded.
    #[error("cache value encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The cache backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Key-value cache for resolved ZIP codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZipCodeCache: Send + Sync {
    /// Read a cached location.
    async fn get(&self, zip: &ZipCode) -> Result<Option<ZipLocation>, ZipCacheError>;

    /// Store a location. Entries never expire.
    async fn set(&self, zip: &ZipCode, location: &ZipLocation) -> Result<(), ZipCacheError>;
}

/// In-process cache backed by `moka`.
///
/// Values are stored as JSON under `zip_codes:{zip}`, the same layout a
/// shared key-value store would use.
#[derive(Clone)]
pub struct MokaZipCache {
    cache: Cache<String, String>,
}

impl MokaZipCache {
    /// Create a cache holding at most `max_capacity` ZIP codes.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    fn key(zip: &ZipCode) -> String {
        format!("zip_codes:{zip}")
    }
}

#[async_trait]
impl ZipCodeCache for MokaZipCache {
    async fn get(&self, zip: &ZipCode) -> Result<Option<ZipLocation>, ZipCacheError> {
        let Some(raw) = self.cache.get(&Self::key(zip)).await else {
            debug!(zip = %zip, "ZIP cache miss");
            return Ok(None);
        };
        debug!(zip = %zip, "ZIP cache hit");
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn set(&self, zip: &ZipCode, location: &ZipLocation) -> Result<(), ZipCacheError> {
        let raw = serde_json::to_string(location)?;
        self.cache.insert(Self::key(zip), raw).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn austin() -> ZipLocation {
        ZipLocation {
            city: "Austin".to_owned(),
            state: "TX".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_get_after_set() {
        let cache = MokaZipCache::new(16);
        let zip = ZipCode::parse("73301").unwrap();

        assert_eq!(cache.get(&zip).await.unwrap(), None);
        cache.set(&zip, &austin()).await.unwrap();
        assert_eq!(cache.get(&zip).await.unwrap(), Some(austin()));
    }

    #[tokio::test]
    async fn test_keys_are_namespaced() {
        let cache = MokaZipCache::new(16);
        let zip = ZipCode::parse("73301").unwrap();
        cache.set(&zip, &austin()).await.unwrap();

        let raw = cache.cache.get("zip_codes:73301").await.unwrap();
        assert_eq!(raw, r#"{"city":"Austin","state":"TX"}"#);
    }
}
