//! Commerce error taxonomy.

use thiserror::Error;

use cartwheel_core::{AddressPartError, PriceError, ProductId};

use crate::db::RepositoryError;
use crate::zipcode::{ZipCacheError, ZipCodeError};

/// Broad category of a [`CommerceError`], used by callers to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-supplied data is malformed.
    Validation,
    /// A domain rule was violated against current state.
    Conflict,
    /// An external collaborator failed or timed out. Retrying may help.
    Upstream,
    /// Stored data broke an invariant. Signals a bug or corruption.
    Invariant,
}

/// Errors returned by the commerce services.
#[derive(Debug, Error)]
pub enum CommerceError {
    // Validation
    #[error("product quantity cannot be zero")]
    InvalidQuantity,

    #[error("stock quantity must be higher than zero")]
    InvalidAmount,

    #[error("{0}")]
    InvalidPrice(#[from] PriceError),

    #[error("{0}")]
    InvalidAddress(#[from] AddressPartError),

    // Conflict
    #[error("product not found")]
    ProductNotFound,

    #[error("cart not found")]
    CartNotFound,

    #[error("product not found in cart")]
    ItemNotFound,

    #[error("inventory not found")]
    InventoryNotFound,

    #[error("address not found")]
    AddressNotFound,

    #[error("order not found")]
    OrderNotFound,

    #[error("product quantity exceeds the stock available")]
    StockExceeded,

    #[error("stock quantity would exceed the maximum an inventory can hold")]
    StockOverflow,

    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    #[error("ZIP code location does not match with provided city and state")]
    AddressMismatch,

    #[error("ZIP code does not match any location")]
    ZipNotResolvable,

    #[error("cart is empty")]
    EmptyCart,

    // Upstream
    #[error("{0} timed out")]
    UpstreamUnavailable(&'static str),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("ZIP code gateway error: {0}")]
    ZipGateway(#[from] ZipCodeError),

    #[error("ZIP code cache error: {0}")]
    Cache(#[from] ZipCacheError),

    // Invariant
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl CommerceError {
    /// The category this error falls in.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidQuantity
            | Self::InvalidAmount
            | Self::InvalidPrice(_)
            | Self::InvalidAddress(_) => ErrorKind::Validation,

            Self::ProductNotFound
            | Self::CartNotFound
            | Self::ItemNotFound
            | Self::InventoryNotFound
            | Self::AddressNotFound
            | Self::OrderNotFound
            | Self::StockExceeded
            | Self::StockOverflow
            | Self::InsufficientStock { .. }
            | Self::AddressMismatch
            | Self::ZipNotResolvable
            | Self::EmptyCart => ErrorKind::Conflict,

            Self::Repository(RepositoryError::DataCorruption(_)) | Self::InvariantViolation(_) => {
                ErrorKind::Invariant
            }

            Self::UpstreamUnavailable(_)
            | Self::Repository(_)
            | Self::ZipGateway(_)
            | Self::Cache(_) => ErrorKind::Upstream,
        }
    }

    /// Whether retrying the whole operation unchanged may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upstream)
    }

    /// Whether this is one of the "X not found" conflicts.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound
                | Self::CartNotFound
                | Self::ItemNotFound
                | Self::InventoryNotFound
                | Self::AddressNotFound
                | Self::OrderNotFound
        )
    }
}

/// Convert a quantity from the API into a stored line quantity.
pub(crate) fn line_quantity(quantity: u32) -> Result<i32, CommerceError> {
    if quantity == 0 {
        return Err(CommerceError::InvalidQuantity);
    }
    i32::try_from(quantity).map_err(|_| CommerceError::StockExceeded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(CommerceError::InvalidQuantity.kind(), ErrorKind::Validation);
        assert_eq!(
            CommerceError::from(AddressPartError::InvalidZip).kind(),
            ErrorKind::Validation
        );
        assert_eq!(CommerceError::EmptyCart.kind(), ErrorKind::Conflict);
        assert_eq!(
            CommerceError::InsufficientStock {
                product_id: ProductId::generate()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CommerceError::Repository(RepositoryError::Unavailable("pool".to_owned())).kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            CommerceError::Repository(RepositoryError::DataCorruption("bad".to_owned())).kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(CommerceError::UpstreamUnavailable("checkout").is_retryable());
        assert!(!CommerceError::StockExceeded.is_retryable());
        assert!(!CommerceError::InvariantViolation("x".to_owned()).is_retryable());
    }

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(
            CommerceError::StockExceeded.to_string(),
            "product quantity exceeds the stock available"
        );
        assert_eq!(
            CommerceError::ZipNotResolvable.to_string(),
            "ZIP code does not match any location"
        );
        assert_eq!(
            CommerceError::from(PriceError::Zero).to_string(),
            "the product price cannot be zero"
        );
    }

    #[test]
    fn test_line_quantity() {
        assert!(matches!(line_quantity(0), Err(CommerceError::InvalidQuantity)));
        assert_eq!(line_quantity(8).ok(), Some(8));
        assert!(matches!(
            line_quantity(u32::MAX),
            Err(CommerceError::StockExceeded)
        ));
    }
}
