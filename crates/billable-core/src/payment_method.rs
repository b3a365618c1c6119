//! Stored payment methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CustomerId, PaymentMethodId};

/// A payment method attached to a processor customer.
///
/// Only display details are kept; card numbers never leave the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Local record id.
    pub id: PaymentMethodId,

    /// Owning customer record.
    pub customer_id: CustomerId,

    /// Remote payment method id (`pm_...`).
    pub processor_id: String,

    /// Whether this is the customer's default method.
    pub default: bool,

    /// Method type as reported by the processor ("card", "`us_bank_account`", ...).
    pub method_type: Option<String>,

    /// Card brand.
    pub brand: Option<String>,

    /// Last four digits of the card or account.
    pub last4: Option<String>,

    /// Card expiry month (1-12).
    pub exp_month: Option<u32>,

    /// Card expiry year.
    pub exp_year: Option<u32>,

    /// Bank name for bank debits.
    pub bank: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Create an empty record for a remote payment method.
    #[must_use]
    pub fn new(customer_id: CustomerId, processor_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentMethodId::generate(),
            customer_id,
            processor_id: processor_id.into(),
            default: false,
            method_type: None,
            brand: None,
            last4: None,
            exp_month: None,
            exp_year: None,
            bank: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Short human description, e.g. "Visa ending in 4242".
    #[must_use]
    pub fn description(&self) -> String {
        let label = self
            .brand
            .as_deref()
            .or(self.bank.as_deref())
            .or(self.method_type.as_deref())
            .map_or_else(|| "Payment method".to_string(), capitalize);

        match &self.last4 {
            Some(last4) => format!("{label} ending in {last4}"),
            None => label,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_uses_brand_and_last4() {
        let mut pm = PaymentMethod::new(CustomerId::generate(), "pm_1");
        pm.brand = Some("visa".into());
        pm.last4 = Some("4242".into());
        assert_eq!(pm.description(), "Visa ending in 4242");
    }

    #[test]
    fn description_falls_back_without_details() {
        let pm = PaymentMethod::new(CustomerId::generate(), "pm_1");
        assert_eq!(pm.description(), "Payment method");
    }
}
