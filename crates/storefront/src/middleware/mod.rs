//! HTTP middleware and extractors for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Customer identity is read per-handler with the [`Customer`] extractor.

pub mod customer;
pub mod request_id;

pub use customer::{CUSTOMER_ID_HEADER, Customer};
pub use request_id::request_id_middleware;
