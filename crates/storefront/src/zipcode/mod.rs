//! ZIP code resolution.
//!
//! - [`ZipCodeLookup`] is the external gateway that maps a ZIP code to a
//!   city and state. [`HttpZipCodeClient`] talks to the hosted service.
//! - [`ZipCodeCache`] sits in front of it (cache-aside). [`MokaZipCache`]
//!   keeps entries in process memory with no expiry.

mod cache;
mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cartwheel_core::ZipCode;

pub use cache::{MokaZipCache, ZipCacheError, ZipCodeCache};
pub use client::{HttpZipCodeClient, ZipCodeError};

#[cfg(test)]
pub use cache::MockZipCodeCache;

/// Where a ZIP code is, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipLocation {
    pub city: String,
    pub state: String,
}

/// Port for the external ZIP code gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZipCodeLookup: Send + Sync {
    /// Resolve a ZIP code.
    ///
    /// Returns `Ok(None)` when the gateway says the ZIP code does not exist.
    async fn lookup(&self, zip: &ZipCode) -> Result<Option<ZipLocation>, ZipCodeError>;
}
