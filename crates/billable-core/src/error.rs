//! Error types for billable.

use crate::ids::IdError;

/// Result type for billable operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// A failure reported by the remote payment processor, normalized.
#[derive(Debug, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct ProcessorError {
    /// Processor error code (`card_declined`, `resource_missing`, ...).
    pub code: Option<String>,
    /// Human readable message from the processor.
    pub message: String,
    /// Processor error category (`card_error`, `invalid_request_error`, ...).
    pub error_type: String,
    /// HTTP status of the failed call, if one was received.
    pub status: Option<u16>,
    /// The underlying client error.
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ProcessorError {
    /// Create an error without an underlying cause.
    #[must_use]
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            error_type: error_type.into(),
            status: None,
            cause: None,
        }
    }

    /// Whether the processor rejected the card itself.
    #[must_use]
    pub fn is_card_error(&self) -> bool {
        self.error_type == "card_error"
    }
}

/// Errors that can occur in billable operations.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Input rejected before calling the processor.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A local record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The processor returned an error.
    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// The customer must complete authentication (SCA / 3-D Secure).
    #[error("payment requires customer action: {payment_intent_id}")]
    ActionRequired {
        /// Payment intent (or setup intent) awaiting confirmation.
        payment_intent_id: String,
        /// Client secret for confirming in the browser.
        client_secret: Option<String>,
        /// Subscription the payment belongs to, if any.
        subscription_id: Option<String>,
    },

    /// The payment method was declined; a new one is needed.
    #[error("payment method was declined: {payment_intent_id}")]
    InvalidPaymentMethod {
        /// Payment intent that failed.
        payment_intent_id: String,
    },

    /// The payment has not settled yet.
    #[error("payment is still processing: {payment_intent_id}")]
    Pending {
        /// Payment intent that is processing.
        payment_intent_id: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl BillingError {
    /// Shorthand for a missing record.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn processor_error_exposes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = ProcessorError {
            cause: Some(Box::new(io)),
            ..ProcessorError::new("api_connection_error", "request failed")
        };
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "api_connection_error: request failed");
    }

    #[test]
    fn billing_error_wraps_processor_error() {
        let err: BillingError = ProcessorError::new("card_error", "declined").into();
        assert!(matches!(err, BillingError::Processor(ref e) if e.is_card_error()));
    }

    #[test]
    fn not_found_formats_entity() {
        let err = BillingError::not_found("customer", "abc");
        assert_eq!(err.to_string(), "customer not found: abc");
    }
}
