//! Charge records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChargeId, CustomerId, Money, SubscriptionId};

/// A successful (possibly later refunded) payment mirrored from the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Local record id.
    pub id: ChargeId,

    /// Owning customer record.
    pub customer_id: CustomerId,

    /// Subscription this charge paid for, when it came from an invoice.
    pub subscription_id: Option<SubscriptionId>,

    /// Remote charge id (`ch_...` / `py_...`).
    pub processor_id: String,

    /// Remote payment intent id, when the charge came from one.
    pub payment_intent_id: Option<String>,

    /// Amount charged, in the minor unit.
    pub amount: i64,

    /// Amount refunded so far, in the minor unit.
    pub amount_refunded: i64,

    /// Lowercase ISO currency code.
    pub currency: String,

    /// Payment method type used ("card", ...).
    pub payment_method_type: Option<String>,

    /// Card brand used.
    pub brand: Option<String>,

    /// Last four digits used.
    pub last4: Option<String>,

    /// Hosted receipt page at the processor.
    pub receipt_url: Option<String>,

    /// Statement description.
    pub description: Option<String>,

    /// When the processor created the charge.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Charge {
    /// The charged amount with its currency.
    #[must_use]
    pub fn money(&self) -> Money {
        Money::new(self.amount, &self.currency)
    }

    /// The refunded amount with its currency.
    #[must_use]
    pub fn refunded_money(&self) -> Money {
        Money::new(self.amount_refunded, &self.currency)
    }

    /// Whether any amount was refunded.
    #[must_use]
    pub fn is_refunded(&self) -> bool {
        self.amount_refunded > 0
    }

    /// Whether the whole amount was refunded.
    #[must_use]
    pub fn is_fully_refunded(&self) -> bool {
        self.amount_refunded >= self.amount
    }

    /// Amount still refundable.
    #[must_use]
    pub fn refundable_amount(&self) -> i64 {
        (self.amount - self.amount_refunded).max(0)
    }

    /// Short description of the payment method used, e.g. "Visa ending in 4242".
    #[must_use]
    pub fn payment_method_description(&self) -> Option<String> {
        let mut pm = crate::PaymentMethod::new(self.customer_id, "");
        pm.method_type.clone_from(&self.payment_method_type);
        pm.brand.clone_from(&self.brand);
        pm.last4.clone_from(&self.last4);
        (self.brand.is_some() || self.payment_method_type.is_some()).then(|| pm.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge(amount: i64, refunded: i64) -> Charge {
        let now = Utc::now();
        Charge {
            id: ChargeId::generate(),
            customer_id: CustomerId::generate(),
            subscription_id: None,
            processor_id: "ch_1".into(),
            payment_intent_id: Some("pi_1".into()),
            amount,
            amount_refunded: refunded,
            currency: "usd".into(),
            payment_method_type: Some("card".into()),
            brand: Some("visa".into()),
            last4: Some("4242".into()),
            receipt_url: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn refund_accounting() {
        let partial = charge(1000, 250);
        assert!(partial.is_refunded());
        assert!(!partial.is_fully_refunded());
        assert_eq!(partial.refundable_amount(), 750);
        assert_eq!(partial.refunded_money().to_string(), "$2.50");

        let full = charge(1000, 1000);
        assert!(full.is_fully_refunded());
        assert_eq!(full.refundable_amount(), 0);
    }

    #[test]
    fn describes_payment_method() {
        assert_eq!(
            charge(100, 0).payment_method_description().as_deref(),
            Some("Visa ending in 4242")
        );
    }
}
