//! Subscription records.
//!
//! The status is whatever the processor last reported; the helpers below only
//! interpret it together with the trial and cancellation timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CustomerId, SubscriptionId};

/// Name given to a subscription when the caller does not pick one.
pub const DEFAULT_SUBSCRIPTION_NAME: &str = "default";

/// Subscription status as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// First invoice not yet paid.
    Incomplete,
    /// First invoice was never paid and the subscription expired.
    IncompleteExpired,
    /// In a trial period.
    Trialing,
    /// Paid and current.
    Active,
    /// Latest invoice failed; processor is retrying.
    PastDue,
    /// Canceled.
    Canceled,
    /// Retries exhausted without payment.
    Unpaid,
    /// Paused (trial ended without a payment method).
    Paused,
}

impl SubscriptionStatus {
    /// Parse the processor's status string.
    #[must_use]
    pub fn from_processor(status: &str) -> Option<Self> {
        Some(match status {
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => return None,
        })
    }

    /// The processor's spelling of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        }
    }
}

/// A subscription mirrored from the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Local record id.
    pub id: SubscriptionId,

    /// Owning customer record.
    pub customer_id: CustomerId,

    /// Application-level name ("default", "team-seats", ...).
    pub name: String,

    /// Remote subscription id (`sub_...`).
    pub processor_id: String,

    /// Remote price id of the first item.
    pub processor_plan: String,

    /// Quantity of the first item.
    pub quantity: u64,

    /// Last reported status.
    pub status: SubscriptionStatus,

    /// End of the trial, if any.
    pub trial_ends_at: Option<DateTime<Utc>>,

    /// When access ends (set once canceled).
    pub ends_at: Option<DateTime<Utc>>,

    /// Start of the current billing period.
    pub current_period_start: Option<DateTime<Utc>>,

    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,

    /// Whether the processor will cancel at period end.
    pub cancel_at_period_end: bool,

    /// Free-form metadata copied from the processor.
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the trial is still running at `now`.
    #[must_use]
    pub fn on_trial_at(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at.is_some_and(|t| t > now)
    }

    /// Whether the subscription was canceled but access continues at `now`.
    #[must_use]
    pub fn on_grace_period_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|t| t > now)
    }

    /// Whether a cancellation has been recorded.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.ends_at.is_some() || self.status == SubscriptionStatus::Canceled
    }

    /// Whether the owner should have access at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        ) && (self.ends_at.is_none() || self.on_grace_period_at(now) || self.on_trial_at(now))
    }

    /// Whether the owner should have access now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Whether the latest payment still needs attention.
    #[must_use]
    pub fn has_incomplete_payment(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Incomplete | SubscriptionStatus::PastDue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(status: SubscriptionStatus) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: SubscriptionId::generate(),
            customer_id: CustomerId::generate(),
            name: DEFAULT_SUBSCRIPTION_NAME.into(),
            processor_id: "sub_1".into(),
            processor_plan: "price_1".into(),
            quantity: 1,
            status,
            trial_ends_at: None,
            ends_at: None,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parses_processor_strings() {
        for status in [
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::IncompleteExpired,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Unpaid,
            SubscriptionStatus::Paused,
        ] {
            assert_eq!(SubscriptionStatus::from_processor(status.as_str()), Some(status));
        }
        assert_eq!(SubscriptionStatus::from_processor("bogus"), None);
    }

    #[test]
    fn active_until_grace_period_ends() {
        let now = Utc::now();
        let mut sub = subscription(SubscriptionStatus::Active);
        assert!(sub.is_active_at(now));

        sub.ends_at = Some(now + Duration::days(3));
        assert!(sub.on_grace_period_at(now));
        assert!(sub.is_active_at(now));

        sub.ends_at = Some(now - Duration::days(1));
        assert!(!sub.is_active_at(now));
        assert!(sub.is_canceled());
    }

    #[test]
    fn incomplete_is_not_active() {
        let sub = subscription(SubscriptionStatus::Incomplete);
        assert!(!sub.is_active());
        assert!(sub.has_incomplete_payment());
    }

    #[test]
    fn trialing_counts_as_active() {
        let now = Utc::now();
        let mut sub = subscription(SubscriptionStatus::Trialing);
        sub.trial_ends_at = Some(now + Duration::days(14));
        assert!(sub.on_trial_at(now));
        assert!(sub.is_active_at(now));
    }
}
