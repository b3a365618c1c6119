//! URL generation for redirects and links in notices.

use serde::{Deserialize, Serialize};

/// Placeholder Stripe substitutes with the checkout session id on redirect.
pub const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Builds absolute URLs into the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlBuilder {
    /// Absolute application root, e.g. `https://app.example.com`.
    pub root_url: String,
    /// Path the billing routes are mounted under.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
}

fn default_mount_path() -> String {
    "/pay".to_string()
}

impl UrlBuilder {
    /// Create a builder mounted at `/pay`.
    #[must_use]
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into().trim_end_matches('/').to_string(),
            mount_path: default_mount_path(),
        }
    }

    /// The application root.
    #[must_use]
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Page where the customer confirms a payment that needs authentication.
    #[must_use]
    pub fn payment_url(&self, payment_intent_id: &str) -> String {
        format!(
            "{}/{}/payments/{payment_intent_id}",
            self.root_url,
            self.mount_path.trim_matches('/')
        )
    }

    /// Default Checkout success URL; the placeholder is left for Stripe to fill.
    #[must_use]
    pub fn checkout_success_url(&self) -> String {
        with_query(
            &self.root_url,
            "stripe_checkout_session_id",
            CHECKOUT_SESSION_PLACEHOLDER,
        )
    }
}

/// Append `key=value` to a URL without encoding `value`.
#[must_use]
pub fn with_query(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{key}={value}")
}
