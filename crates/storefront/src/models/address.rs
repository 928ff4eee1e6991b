//! Shipping address models.
//!
//! Addresses are append-only. Each customer has at most one default, which
//! is assigned when the first address is created.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{AddressId, CustomerId, StreetNumber, UsState, ZipCode};

/// A stored shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub is_default: bool,
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    /// `"{number} {street}, {city}, {state} {zip}"`.
    pub address_line: String,
    pub created_at: DateTime<Utc>,
}

/// A validated, resolved address ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub customer_id: CustomerId,
    pub street: String,
    pub number: StreetNumber,
    pub city: String,
    pub state: UsState,
    pub zip_code: ZipCode,
}

impl NewAddress {
    /// Compose the single-line display form.
    #[must_use]
    pub fn address_line(&self) -> String {
        format!(
            "{} {}, {}, {} {}",
            self.number, self.street, self.city, self.state, self.zip_code
        )
    }
}
