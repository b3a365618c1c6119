//! Form-encoded request parameters.
//!
//! Stripe takes `application/x-www-form-urlencoded` bodies with bracketed
//! keys for nested values (`metadata[owner_id]`, `items[0][price]`) and
//! repeated keys for arrays (`expand[]`).

use std::collections::BTreeMap;

/// An ordered list of form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams(Vec<(String, String)>);

impl FormParams {
    /// Create an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    /// Add a field when the value is present.
    pub fn push_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    /// Add `metadata[key]` fields.
    pub fn metadata<'a>(
        &mut self,
        prefix: &str,
        entries: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> &mut Self {
        for (key, value) in entries {
            self.push(format!("{prefix}[{key}]"), value);
        }
        self
    }

    /// Request expansion of a response field.
    pub fn expand(&mut self, field: &str) -> &mut Self {
        self.push("expand[]", field)
    }

    /// Look up the first value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The encoded pairs, in insertion order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Whether no field was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parameters for creating a customer.
#[derive(Debug, Clone, Default)]
pub struct CreateCustomer {
    /// Email.
    pub email: String,
    /// Name.
    pub name: Option<String>,
    /// Metadata (owner id and type).
    pub metadata: BTreeMap<String, String>,
}

impl CreateCustomer {
    pub(crate) fn to_form(&self) -> FormParams {
        let mut params = FormParams::new();
        params
            .push("email", &self.email)
            .push_opt("name", self.name.as_ref())
            .metadata("metadata", &self.metadata);
        params
    }
}

/// Parameters for updating a customer.
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    /// New email.
    pub email: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New default payment method for invoices.
    pub default_payment_method: Option<String>,
}

impl UpdateCustomer {
    pub(crate) fn to_form(&self) -> FormParams {
        let mut params = FormParams::new();
        params
            .push_opt("email", self.email.as_ref())
            .push_opt("name", self.name.as_ref())
            .push_opt(
                "invoice_settings[default_payment_method]",
                self.default_payment_method.as_ref(),
            );
        params
    }
}

/// Parameters for an off-session, immediately confirmed payment intent.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    /// Customer to charge.
    pub customer: String,
    /// Payment method to charge.
    pub payment_method: String,
    /// Amount in the minor unit.
    pub amount: i64,
    /// Currency.
    pub currency: String,
    /// Description.
    pub description: Option<String>,
    /// Metadata.
    pub metadata: BTreeMap<String, String>,
}

impl CreatePaymentIntent {
    pub(crate) fn to_form(&self) -> FormParams {
        let mut params = FormParams::new();
        params
            .push("customer", &self.customer)
            .push("payment_method", &self.payment_method)
            .push("amount", self.amount)
            .push("currency", &self.currency)
            .push("confirm", true)
            .push("off_session", true)
            .push_opt("description", self.description.as_ref())
            .metadata("metadata", &self.metadata)
            .expand("latest_charge");
        params
    }
}

/// Parameters for creating a single-item subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    /// Customer to subscribe.
    pub customer: String,
    /// Price to bill.
    pub price: String,
    /// Quantity of the price.
    pub quantity: u64,
    /// Trial length.
    pub trial_period_days: Option<u32>,
    /// Stripe payment behaviour (`allow_incomplete`, `default_incomplete`, ...).
    pub payment_behavior: Option<String>,
    /// Metadata.
    pub metadata: BTreeMap<String, String>,
}

impl CreateSubscription {
    pub(crate) fn to_form(&self) -> FormParams {
        let mut params = FormParams::new();
        params
            .push("customer", &self.customer)
            .push("items[0][price]", &self.price)
            .push("items[0][quantity]", self.quantity)
            .push_opt("trial_period_days", self.trial_period_days)
            .push_opt("payment_behavior", self.payment_behavior.as_ref())
            .metadata("metadata", &self.metadata)
            .expand("pending_setup_intent")
            .expand("latest_invoice.payment_intent");
        params
    }
}

/// A Checkout line item referencing an existing price.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CheckoutLineItem {
    /// Price ID.
    pub price: String,
    /// Quantity.
    #[serde(default = "default_quantity")]
    pub quantity: u64,
}

fn default_quantity() -> u64 {
    1
}

/// Parameters for creating a Checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSession {
    /// Customer paying.
    pub customer: String,
    /// `payment`, `subscription` or `setup`.
    pub mode: String,
    /// Items to buy.
    pub line_items: Vec<CheckoutLineItem>,
    /// Redirect after success.
    pub success_url: String,
    /// Redirect after cancel.
    pub cancel_url: String,
    /// Our owner id.
    pub client_reference_id: String,
    /// Whether promotion codes can be entered.
    pub allow_promotion_codes: bool,
    /// Metadata.
    pub metadata: BTreeMap<String, String>,
}

impl CreateCheckoutSession {
    pub(crate) fn to_form(&self) -> FormParams {
        let mut params = FormParams::new();
        params
            .push("customer", &self.customer)
            .push("mode", &self.mode)
            .push("success_url", &self.success_url)
            .push("cancel_url", &self.cancel_url)
            .push("client_reference_id", &self.client_reference_id);

        for (index, item) in self.line_items.iter().enumerate() {
            params
                .push(format!("line_items[{index}][price]"), &item.price)
                .push(format!("line_items[{index}][quantity]"), item.quantity);
        }

        if self.allow_promotion_codes {
            params.push("allow_promotion_codes", true);
        }
        params.metadata("metadata", &self.metadata);
        params
    }
}
