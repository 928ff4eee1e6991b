//! Status enums for catalog entities.

use serde::{Deserialize, Serialize};

/// Catalog visibility of a product.
///
/// Products are created `Unpublished` and flipped to `Published` by an admin.
/// Stored as `text` with a CHECK constraint; see [`ProductStatus::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Unpublished,
    Published,
}

impl ProductStatus {
    /// The stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unpublished => "unpublished",
            Self::Published => "published",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpublished" => Ok(Self::Unpublished),
            "published" => Ok(Self::Published),
            _ => Err(format!("invalid product status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [ProductStatus::Unpublished, ProductStatus::Published] {
            assert_eq!(status.as_str().parse::<ProductStatus>(), Ok(status));
        }
        assert!("archived".parse::<ProductStatus>().is_err());
    }
}
