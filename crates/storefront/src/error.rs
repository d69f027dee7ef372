//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`. Error bodies are always
//! `{"success": false, "message": "..."}`.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use qmart_core::{OrderError, PaymentId};

use crate::db::RepositoryError;
use crate::services::checkout::CheckoutError;
use crate::services::gateway::GatewayError;
use crate::services::orders::OrderServiceError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing request fields.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A state-machine precondition does not hold.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Payment signature did not verify.
    #[error("Invalid signature")]
    Authenticity,

    /// Optimistic retries were exhausted.
    #[error("Conflict: {0}")]
    Contention(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment was recorded but the order was not.
    #[error("Payment {payment_id} recorded but order creation failed: {source}")]
    OrderAfterPayment {
        payment_id: PaymentId,
        source: RepositoryError,
    },

    /// Required configuration is absent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payment gateway call failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(rename = "paymentId", skip_serializing_if = "Option::is_none")]
    payment_id: Option<&'a PaymentId>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_)
                | Self::OrderAfterPayment { .. }
                | Self::Configuration(_)
                | Self::Gateway(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::BadRequest(_) | Self::InvalidState(_) | Self::Authenticity => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Contention(_) => StatusCode::CONFLICT,
            Self::Database(_)
            | Self::OrderAfterPayment { .. }
            | Self::Configuration(_)
            | Self::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::BadRequest(msg)
            | Self::NotFound(msg)
            | Self::InvalidState(msg)
            | Self::Contention(msg) => msg.clone(),
            Self::Authenticity => "invalid signature".to_string(),
            Self::Database(_) => "Internal server error".to_string(),
            Self::OrderAfterPayment { .. } => {
                "payment recorded but order creation failed".to_string()
            }
            Self::Configuration(_) => "Payment service unavailable".to_string(),
            Self::Gateway(_) => "Payment gateway error".to_string(),
        };

        let payment_id = match &self {
            Self::OrderAfterPayment { payment_id, .. } => Some(payment_id),
            _ => None,
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                message: &message,
                payment_id,
            }),
        )
            .into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::ItemNotFound(_) => Self::NotFound("Item not found".to_string()),
            OrderError::InvalidState(msg) => Self::InvalidState(msg.to_string()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<OrderServiceError> for AppError {
    fn from(err: OrderServiceError) -> Self {
        match err {
            OrderServiceError::NotFound => Self::NotFound("Order not found".to_string()),
            OrderServiceError::Order(e) => e.into(),
            OrderServiceError::Contention(id) => Self::Contention(format!(
                "Order {id} was modified concurrently, please retry"
            )),
            OrderServiceError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::MissingFields => Self::BadRequest("missing payment fields".to_string()),
            CheckoutError::InvalidSignature => Self::Authenticity,
            CheckoutError::GatewayNotConfigured => {
                Self::Configuration("payment gateway is not configured".to_string())
            }
            CheckoutError::Validation(e) => e.into(),
            CheckoutError::PaymentPersistence(e) | CheckoutError::OrderPersistence(e) => {
                Self::Database(e)
            }
            CheckoutError::OrderPersistenceAfterPayment { payment_id, source } => {
                Self::OrderAfterPayment { payment_id, source }
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON extractor that reports malformed bodies as `AppError::BadRequest`.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ValidatedJson<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
