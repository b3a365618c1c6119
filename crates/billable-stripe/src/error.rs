//! Stripe client errors and their translation into billing errors.

use billable_core::{BillingError, ProcessorError};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
        /// Card decline code.
        decline_code: Option<String>,
        /// Offending parameter.
        param: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook timestamp outside the tolerance window.
    #[error("Webhook timestamp outside tolerance ({age_seconds}s)")]
    StaleSignature {
        /// Age of the signed timestamp.
        age_seconds: i64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<StripeError> for ProcessorError {
    fn from(err: StripeError) -> Self {
        let (error_type, message, code, status) = match &err {
            StripeError::Api {
                status,
                error_type,
                message,
                code,
                decline_code,
                ..
            } => (
                error_type.clone(),
                message.clone(),
                decline_code.clone().or_else(|| code.clone()),
                Some(*status),
            ),
            StripeError::Http(e) => (
                "api_connection_error".to_string(),
                e.to_string(),
                None,
                e.status().map(|s| s.as_u16()),
            ),
            StripeError::Serialization(e) => ("api_error".to_string(), e.to_string(), None, None),
            StripeError::InvalidSignature | StripeError::StaleSignature { .. } => (
                "signature_verification_error".to_string(),
                err.to_string(),
                None,
                None,
            ),
            StripeError::Configuration(msg) => {
                ("configuration_error".to_string(), msg.clone(), None, None)
            }
        };

        Self {
            code,
            message,
            error_type,
            status,
            cause: Some(Box::new(err)),
        }
    }
}

impl From<StripeError> for BillingError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Configuration(msg) => Self::Configuration(msg),
            other => Self::Processor(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_maps_decline_code_first() {
        let err = StripeError::Api {
            status: 402,
            error_type: "card_error".into(),
            message: "Your card was declined.".into(),
            code: Some("card_declined".into()),
            decline_code: Some("insufficient_funds".into()),
            param: None,
        };

        let processor: ProcessorError = err.into();
        assert_eq!(processor.code.as_deref(), Some("insufficient_funds"));
        assert_eq!(processor.status, Some(402));
        assert!(processor.is_card_error());
        assert!(processor.cause.is_some());
    }

    #[test]
    fn configuration_error_stays_configuration() {
        let err: BillingError = StripeError::Configuration("missing key".into()).into();
        assert!(matches!(err, BillingError::Configuration(_)));
    }
}
