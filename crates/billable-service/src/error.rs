//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use billable_core::{BillingError, IdError};
use billable_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The customer must authenticate the payment.
    #[error("payment requires customer action: {payment_intent_id}")]
    ActionRequired {
        /// Payment or setup intent to confirm.
        payment_intent_id: String,
        /// Secret for confirming in the browser.
        client_secret: Option<String>,
        /// Subscription the payment belongs to.
        subscription_id: Option<String>,
    },

    /// The payment method was declined.
    #[error("payment method declined: {0}")]
    PaymentMethodDeclined(String),

    /// The payment has not settled yet.
    #[error("payment pending: {0}")]
    PaymentPending(String),

    /// A required integration is not configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The payment processor returned an error.
    #[error("processor error: {message}")]
    Processor {
        /// Processor message.
        message: String,
        /// Processor error type.
        error_type: String,
        /// Processor error code.
        code: Option<String>,
    },
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::ActionRequired {
                payment_intent_id,
                client_secret,
                subscription_id,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "action_required",
                "Payment requires customer authentication".to_string(),
                Some(serde_json::json!({
                    "payment_intent_id": payment_intent_id,
                    "client_secret": client_secret,
                    "subscription_id": subscription_id,
                })),
            ),
            Self::PaymentMethodDeclined(payment_intent_id) => (
                StatusCode::PAYMENT_REQUIRED,
                "payment_method_declined",
                "The payment method was declined".to_string(),
                Some(serde_json::json!({ "payment_intent_id": payment_intent_id })),
            ),
            Self::PaymentPending(payment_intent_id) => (
                StatusCode::CONFLICT,
                "payment_pending",
                "The payment is still processing".to_string(),
                Some(serde_json::json!({ "payment_intent_id": payment_intent_id })),
            ),
            Self::NotConfigured(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::Processor {
                message,
                error_type,
                code,
            } => (
                StatusCode::BAD_GATEWAY,
                "processor_error",
                message.clone(),
                Some(serde_json::json!({ "type": error_type, "code": code })),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(msg) => Self::BadRequest(msg),
            BillingError::InvalidId(e) => Self::from(e),
            BillingError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            BillingError::ActionRequired {
                payment_intent_id,
                client_secret,
                subscription_id,
            } => Self::ActionRequired {
                payment_intent_id,
                client_secret,
                subscription_id,
            },
            BillingError::InvalidPaymentMethod { payment_intent_id } => {
                Self::PaymentMethodDeclined(payment_intent_id)
            }
            BillingError::Pending { payment_intent_id } => Self::PaymentPending(payment_intent_id),
            BillingError::Processor(e) => {
                tracing::warn!(error_type = %e.error_type, code = ?e.code, message = %e.message, "Processor error");
                Self::Processor {
                    message: e.message,
                    error_type: e.error_type,
                    code: e.code,
                }
            }
            BillingError::Configuration(msg) => Self::NotConfigured(msg),
            BillingError::Storage(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::DuplicateEvent { event_id } => {
                Self::BadRequest(format!("Event {event_id} already processed"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
