//! Mailer configuration.

use serde::Deserialize;

use crate::error::{MailerError, Result};
use crate::notice::NoticeKind;

/// Sender and business details used by every notice.
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    /// From email address.
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// From name.
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Reply-To address.
    #[serde(default)]
    pub reply_to: Option<String>,

    /// Business name shown in subjects and footers.
    #[serde(default = "default_business_name")]
    pub business_name: String,

    /// Postal address shown in footers and receipts.
    #[serde(default)]
    pub business_address: Option<String>,

    /// Support contact shown in footers.
    #[serde(default)]
    pub support_email: Option<String>,

    /// Locale used when the recipient has none.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Which notices are sent.
    #[serde(default)]
    pub toggles: EmailToggles,
}

impl MailerConfig {
    /// Get formatted "From" header value.
    #[must_use]
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Validate the sender.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Configuration` if the from address is not an
    /// email address or the business name is blank.
    pub fn validate(&self) -> Result<()> {
        if !self.from_email.contains('@') {
            return Err(MailerError::Configuration(format!(
                "invalid from email: {}",
                self.from_email
            )));
        }
        if self.business_name.trim().is_empty() {
            return Err(MailerError::Configuration(
                "business name is required".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            from_email: default_from_email(),
            from_name: default_from_name(),
            reply_to: None,
            business_name: default_business_name(),
            business_address: None,
            support_email: None,
            default_locale: default_locale(),
            toggles: EmailToggles::default(),
        }
    }
}

fn default_from_email() -> String {
    "billing@example.com".to_string()
}

fn default_from_name() -> String {
    "Billing".to_string()
}

fn default_business_name() -> String {
    "Billable".to_string()
}

fn default_locale() -> String {
    billable_core::DEFAULT_LOCALE.to_string()
}

fn enabled() -> bool {
    true
}

/// Per-notice switches. Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct EmailToggles {
    /// Receipt after a successful charge.
    #[serde(default = "enabled")]
    pub receipt: bool,
    /// Refund confirmation.
    #[serde(default = "enabled")]
    pub refund: bool,
    /// Upcoming renewal reminder.
    #[serde(default = "enabled")]
    pub subscription_renewing: bool,
    /// Payment needs customer authentication.
    #[serde(default = "enabled")]
    pub payment_action_required: bool,
    /// Payment failed.
    #[serde(default = "enabled")]
    pub payment_failed: bool,
    /// Trial is about to end.
    #[serde(default = "enabled")]
    pub subscription_trial_will_end: bool,
}

impl EmailToggles {
    /// Whether a notice kind is switched on.
    #[must_use]
    pub const fn enabled(&self, kind: NoticeKind) -> bool {
        match kind {
            NoticeKind::Receipt => self.receipt,
            NoticeKind::Refund => self.refund,
            NoticeKind::SubscriptionRenewing => self.subscription_renewing,
            NoticeKind::PaymentActionRequired => self.payment_action_required,
            NoticeKind::PaymentFailed => self.payment_failed,
            NoticeKind::SubscriptionTrialWillEnd => self.subscription_trial_will_end,
        }
    }
}

impl Default for EmailToggles {
    fn default() -> Self {
        Self {
            receipt: true,
            refund: true,
            subscription_renewing: true,
            payment_action_required: true,
            payment_failed: true,
            subscription_trial_will_end: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_notice() {
        let config = MailerConfig::default();
        assert!(config.validate().is_ok());
        for kind in NoticeKind::ALL {
            assert!(config.toggles.enabled(kind));
        }
    }

    #[test]
    fn from_header_combines_name_and_address() {
        let config = MailerConfig {
            from_email: "billing@acme.test".into(),
            from_name: "Acme Billing".into(),
            ..MailerConfig::default()
        };
        assert_eq!(config.from_header(), "Acme Billing <billing@acme.test>");
    }

    #[test]
    fn invalid_from_email_fails_validation() {
        let config = MailerConfig {
            from_email: "billing".into(),
            ..MailerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MailerError::Configuration(_))
        ));
    }

    #[test]
    fn partial_toggles_keep_other_defaults() {
        let toggles: EmailToggles =
            serde_json::from_str(r#"{ "subscription_renewing": false }"#).unwrap();
        assert!(!toggles.enabled(NoticeKind::SubscriptionRenewing));
        assert!(toggles.enabled(NoticeKind::Receipt));
    }
}
