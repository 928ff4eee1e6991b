//! Customer identity extractor.
//!
//! Authentication happens at the edge; by the time a request reaches the
//! storefront the authenticated customer's ID is in `x-customer-id`.

use axum::{extract::FromRequestParts, http::request::Parts};

use cartwheel_core::CustomerId;

use crate::error::{AppError, set_sentry_user};

/// The HTTP header carrying the authenticated customer's ID.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// Extractor that requires a customer identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_cart(Customer(customer_id): Customer) -> impl IntoResponse {
///     format!("cart for {customer_id}")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Customer(pub CustomerId);

impl<S> FromRequestParts<S> for Customer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing customer identity".to_string()))?;

        let customer_id = raw
            .to_str()
            .ok()
            .and_then(|s| s.parse::<CustomerId>().ok())
            .ok_or_else(|| AppError::Unauthorized("malformed customer identity".to_string()))?;

        set_sentry_user(&customer_id);
        Ok(Self(customer_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<Customer, AppError> {
        let mut builder = Request::builder().uri("/cart");
        if let Some(value) = header {
            builder = builder.header(CUSTOMER_ID_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Customer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header() {
        let id = CustomerId::generate();
        let Customer(extracted) = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(extracted, id);
    }

    #[tokio::test]
    async fn test_missing_header() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        assert!(matches!(
            extract(Some("customer-42")).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
