//! Type-safe price representation in integer minor currency units.
//!
//! Prices never touch floating point. A `Price` of `2999` is $29.99; line
//! and order totals are computed with checked arithmetic so a corrupt row
//! cannot silently wrap.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices must be strictly positive.
    #[error("the product price cannot be zero")]
    Zero,
    /// Negative amounts are never valid prices.
    #[error("the product price cannot be negative")]
    Negative,
}

/// A price in minor currency units (e.g., cents for USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// The zero amount, used as the identity when summing totals.
    pub const ZERO: Self = Self(0);

    /// Create a catalog price, rejecting zero and negative amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if `minor_units` is not strictly positive.
    pub const fn new(minor_units: i64) -> Result<Self, PriceError> {
        if minor_units == 0 {
            return Err(PriceError::Zero);
        }
        if minor_units < 0 {
            return Err(PriceError::Negative);
        }
        Ok(Self(minor_units))
    }

    /// Wrap a stored amount without validation (totals, database rows).
    #[must_use]
    pub const fn from_minor_units(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Get the amount in minor currency units.
    #[must_use]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Multiply a unit price by a line quantity.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn times(self, quantity: i32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Add two amounts.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl ::sqlx::Type<::sqlx::Postgres> for Price {
    fn type_info() -> ::sqlx::postgres::PgTypeInfo {
        <i64 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for Price {
    fn decode(
        value: ::sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, ::sqlx::error::BoxDynError> {
        Ok(Self(<i64 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl ::sqlx::Encode<'_, ::sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut ::sqlx::postgres::PgArgumentBuffer,
    ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
        <i64 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_and_negative() {
        assert_eq!(Price::new(0), Err(PriceError::Zero));
        assert_eq!(Price::new(-1), Err(PriceError::Negative));
        assert_eq!(Price::new(2999).unwrap().minor_units(), 2999);
    }

    #[test]
    fn test_line_totals() {
        let a = Price::new(2999).unwrap().times(8).unwrap();
        let b = Price::new(99286).unwrap().times(4).unwrap();
        assert_eq!(a.checked_add(b).unwrap().minor_units(), 421_136);
    }

    #[test]
    fn test_times_overflow() {
        assert!(Price::from_minor_units(i64::MAX).times(2).is_none());
    }
}
