//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Bodies are always `{"message": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{CommerceError, ErrorKind};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A commerce operation failed.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// Caller identity missing or malformed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            Self::Commerce(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Upstream => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Invariant => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Commerce(err) => match err.kind() {
                ErrorKind::Validation | ErrorKind::Conflict => err.to_string(),
                ErrorKind::Upstream => "Service temporarily unavailable, please retry".to_string(),
                ErrorKind::Invariant => "Internal server error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
pub fn set_sentry_user(customer_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use cartwheel_core::AddressPartError;

    use super::*;
    use crate::db::RepositoryError;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::Unauthorized("missing customer identity".to_string());
        assert_eq!(err.to_string(), "Unauthorized: missing customer identity");

        let err = AppError::from(CommerceError::StockExceeded);
        assert_eq!(err.to_string(), "product quantity exceeds the stock available");
    }

    #[test]
    fn test_commerce_status_codes() {
        assert_eq!(
            get_status(CommerceError::InvalidQuantity),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::from(AddressPartError::InvalidState)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(CommerceError::StockExceeded), StatusCode::CONFLICT);
        assert_eq!(get_status(CommerceError::EmptyCart), StatusCode::CONFLICT);
        assert_eq!(get_status(CommerceError::ItemNotFound), StatusCode::NOT_FOUND);
        assert_eq!(get_status(CommerceError::StockOverflow), StatusCode::CONFLICT);
        assert_eq!(
            get_status(CommerceError::Repository(RepositoryError::Unavailable(
                "pool".to_string()
            ))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(CommerceError::InvariantViolation("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Unauthorized("missing".to_string())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = AppError::from(CommerceError::Repository(RepositoryError::Unavailable(
            "connection refused at 10.0.0.5".to_string(),
        )))
        .into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["message"],
            "Service temporarily unavailable, please retry"
        );
    }

    #[tokio::test]
    async fn test_conflict_message_is_passed_through() {
        let response = AppError::from(CommerceError::ZipNotResolvable).into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "ZIP code does not match any location");
    }
}
