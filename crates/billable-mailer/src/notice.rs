//! Notice payloads: the minimum needed to render each email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use billable_core::{Charge, Customer, Money};

/// Kinds of billing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Receipt after a successful charge.
    Receipt,
    /// Refund confirmation.
    Refund,
    /// Upcoming renewal reminder.
    SubscriptionRenewing,
    /// Payment needs customer authentication.
    PaymentActionRequired,
    /// Payment failed.
    PaymentFailed,
    /// Trial is about to end.
    SubscriptionTrialWillEnd,
}

impl NoticeKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Receipt,
        Self::Refund,
        Self::SubscriptionRenewing,
        Self::PaymentActionRequired,
        Self::PaymentFailed,
        Self::SubscriptionTrialWillEnd,
    ];

    /// Template and locale key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Refund => "refund",
            Self::SubscriptionRenewing => "subscription_renewing",
            Self::PaymentActionRequired => "payment_action_required",
            Self::PaymentFailed => "payment_failed",
            Self::SubscriptionTrialWillEnd => "subscription_trial_will_end",
        }
    }
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a notice is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Preferred locale.
    pub locale: Option<String>,
}

impl Recipient {
    /// A recipient with only an address.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            locale: None,
        }
    }

    /// `"Name <email>"` when a name is known.
    #[must_use]
    pub fn address(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => format!("{name} <{}>", self.email),
            _ => self.email.clone(),
        }
    }
}

impl From<&Customer> for Recipient {
    fn from(customer: &Customer) -> Self {
        Self {
            email: customer.email.clone(),
            name: customer.name.clone(),
            locale: customer.locale.clone(),
        }
    }
}

/// A successful charge.
#[derive(Debug, Clone)]
pub struct ReceiptNotice {
    /// Recipient.
    pub recipient: Recipient,
    /// The charge.
    pub charge: Charge,
}

/// A refunded charge.
#[derive(Debug, Clone)]
pub struct RefundNotice {
    /// Recipient.
    pub recipient: Recipient,
    /// The charge, with `amount_refunded` updated.
    pub charge: Charge,
}

/// A subscription about to renew.
#[derive(Debug, Clone)]
pub struct RenewalNotice {
    /// Recipient.
    pub recipient: Recipient,
    /// Processor subscription ID.
    pub subscription_id: String,
    /// Plan being renewed.
    pub plan: String,
    /// When the renewal is charged.
    pub renews_at: DateTime<Utc>,
    /// Amount of the upcoming invoice.
    pub amount: Option<Money>,
}

/// A payment waiting for customer authentication.
#[derive(Debug, Clone)]
pub struct ActionRequiredNotice {
    /// Recipient.
    pub recipient: Recipient,
    /// Payment intent to confirm.
    pub payment_intent_id: String,
    /// Page where the customer confirms the payment.
    pub payment_url: String,
    /// Amount due.
    pub amount: Option<Money>,
    /// Processor subscription ID, for subscription payments.
    pub subscription_id: Option<String>,
}

/// A failed payment.
#[derive(Debug, Clone)]
pub struct PaymentFailedNotice {
    /// Recipient.
    pub recipient: Recipient,
    /// Amount due.
    pub amount: Option<Money>,
    /// Hosted invoice page.
    pub invoice_url: Option<String>,
    /// Next automatic retry.
    pub next_attempt_at: Option<DateTime<Utc>>,
}

/// A trial about to end.
#[derive(Debug, Clone)]
pub struct TrialEndingNotice {
    /// Recipient.
    pub recipient: Recipient,
    /// Processor subscription ID.
    pub subscription_id: String,
    /// End of the trial.
    pub trial_ends_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_includes_name_when_present() {
        let mut recipient = Recipient::new("jane@example.com");
        assert_eq!(recipient.address(), "jane@example.com");
        recipient.name = Some("Jane Doe".into());
        assert_eq!(recipient.address(), "Jane Doe <jane@example.com>");
    }

    #[test]
    fn kind_keys_are_snake_case() {
        assert_eq!(NoticeKind::SubscriptionTrialWillEnd.to_string(), "subscription_trial_will_end");
        assert_eq!(
            serde_json::to_value(NoticeKind::PaymentActionRequired).unwrap(),
            "payment_action_required"
        );
    }
}
