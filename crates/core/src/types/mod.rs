//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod id;
pub mod price;
pub mod status;

pub use address::{AddressPartError, StreetNumber, UsState, ZipCode};
pub use id::*;
pub use price::{Price, PriceError};
pub use status::ProductStatus;
