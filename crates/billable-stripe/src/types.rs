//! Stripe API types.
//!
//! Only the fields this crate reads are modelled; everything else in the
//! response is ignored. Pinned to the API version sent by `StripeClient`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A field Stripe returns either as an id or, when expanded, as the object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    /// Not expanded: just the id.
    Id(String),
    /// Expanded object.
    Object(Box<T>),
}

impl<T: HasId> Expandable<T> {
    /// The id, whether or not the field was expanded.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(object) => object.id(),
        }
    }

    /// The expanded object, if present.
    #[must_use]
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Object(object) => Some(object),
        }
    }
}

/// Stripe objects with an id.
pub trait HasId {
    /// The object id.
    fn id(&self) -> &str;
}

macro_rules! impl_has_id {
    ($($ty:ty),*) => {
        $(impl HasId for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub name: Option<String>,
    /// Set on customers that were deleted.
    #[serde(default)]
    pub deleted: bool,
    /// Invoice settings (default payment method).
    #[serde(default)]
    pub invoice_settings: Option<InvoiceSettings>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Customer invoice settings.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceSettings {
    /// Payment method used for invoices and off-session charges.
    #[serde(default)]
    pub default_payment_method: Option<Expandable<PaymentMethod>>,
}

/// Stripe payment method object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    /// Payment method ID.
    pub id: String,
    /// Method type ("card", "`us_bank_account`", ...).
    #[serde(rename = "type")]
    pub method_type: String,
    /// Customer the method is attached to.
    #[serde(default)]
    pub customer: Option<String>,
    /// Card details.
    #[serde(default)]
    pub card: Option<Card>,
    /// US bank account details.
    #[serde(default)]
    pub us_bank_account: Option<BankAccount>,
    /// SEPA debit details.
    #[serde(default)]
    pub sepa_debit: Option<BankAccount>,
}

/// Card details.
#[derive(Debug, Clone, Deserialize)]
pub struct Card {
    /// Brand ("visa", "mastercard", ...).
    #[serde(default)]
    pub brand: Option<String>,
    /// Last four digits.
    #[serde(default)]
    pub last4: Option<String>,
    /// Expiry month.
    #[serde(default)]
    pub exp_month: Option<u32>,
    /// Expiry year.
    #[serde(default)]
    pub exp_year: Option<u32>,
}

/// Bank account details.
#[derive(Debug, Clone, Deserialize)]
pub struct BankAccount {
    /// Bank name.
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Last four digits.
    #[serde(default)]
    pub last4: Option<String>,
}

/// Stripe `PaymentIntent` object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Payment intent ID.
    pub id: String,
    /// Amount in the minor unit.
    #[serde(default)]
    pub amount: i64,
    /// Currency (e.g., "usd").
    #[serde(default)]
    pub currency: String,
    /// Status (`succeeded`, `requires_action`, ...).
    #[serde(default)]
    pub status: String,
    /// Secret for confirming in the browser.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// The charge created by the latest confirmation attempt.
    #[serde(default)]
    pub latest_charge: Option<Expandable<Charge>>,
    /// Invoice this intent pays, if any.
    #[serde(default)]
    pub invoice: Option<String>,
    /// Error from the last failed attempt.
    #[serde(default)]
    pub last_payment_error: Option<StripeErrorDetail>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Stripe charge object.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    /// Charge ID.
    pub id: String,
    /// Amount in the minor unit.
    #[serde(default)]
    pub amount: i64,
    /// Amount refunded so far.
    #[serde(default)]
    pub amount_refunded: i64,
    /// Currency.
    #[serde(default)]
    pub currency: String,
    /// Status (`succeeded`, `pending`, `failed`).
    #[serde(default)]
    pub status: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Payment intent ID.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Invoice ID, for subscription payments.
    #[serde(default)]
    pub invoice: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Hosted receipt URL.
    #[serde(default)]
    pub receipt_url: Option<String>,
    /// Whether the charge was fully refunded.
    #[serde(default)]
    pub refunded: bool,
    /// Details of the payment method used.
    #[serde(default)]
    pub payment_method_details: Option<PaymentMethodDetails>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Payment method details snapshotted on a charge.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodDetails {
    /// Method type.
    #[serde(rename = "type")]
    pub method_type: String,
    /// Card details, for card payments.
    #[serde(default)]
    pub card: Option<Card>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Customer ID.
    pub customer: String,
    /// Status string.
    pub status: String,
    /// Subscription items.
    pub items: StripeList<SubscriptionItem>,
    /// Start of the current period (Unix).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// End of the current period (Unix).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// End of the trial (Unix).
    #[serde(default)]
    pub trial_end: Option<i64>,
    /// Scheduled cancellation time (Unix).
    #[serde(default)]
    pub cancel_at: Option<i64>,
    /// Whether it cancels at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// When the subscription ended (Unix).
    #[serde(default)]
    pub ended_at: Option<i64>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Latest invoice.
    #[serde(default)]
    pub latest_invoice: Option<Expandable<Invoice>>,
    /// Setup intent for collecting a payment method (trials, zero amount invoices).
    #[serde(default)]
    pub pending_setup_intent: Option<Expandable<SetupIntent>>,
}

/// A subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    pub id: String,
    /// Price being billed.
    pub price: Price,
    /// Quantity.
    #[serde(default)]
    pub quantity: Option<u64>,
}

/// A price.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice ID (absent on upcoming invoices).
    #[serde(default)]
    pub id: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Subscription ID.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Amount due.
    #[serde(default)]
    pub amount_due: i64,
    /// Currency.
    #[serde(default)]
    pub currency: String,
    /// Payment intent for this invoice.
    #[serde(default)]
    pub payment_intent: Option<Expandable<PaymentIntent>>,
    /// When payment will next be attempted (Unix).
    #[serde(default)]
    pub next_payment_attempt: Option<i64>,
    /// Hosted invoice page.
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    /// End of the billed period (Unix).
    #[serde(default)]
    pub period_end: Option<i64>,
}

impl HasId for Invoice {
    fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Stripe setup intent object.
#[derive(Debug, Clone, Deserialize)]
pub struct SetupIntent {
    /// Setup intent ID.
    pub id: String,
    /// Status.
    #[serde(default)]
    pub status: String,
    /// Secret for confirming in the browser.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Payment method collected.
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Session mode.
    #[serde(default)]
    pub mode: Option<String>,
    /// Payment status.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Client reference ID (our owner id).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Session status.
    #[serde(default)]
    pub status: Option<String>,
}

/// Stripe billing portal session.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingPortalSession {
    /// Session ID.
    pub id: String,
    /// Portal URL.
    pub url: String,
    /// Where the portal sends the customer back to.
    #[serde(default)]
    pub return_url: Option<String>,
}

/// Stripe refund object.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    /// Refund ID.
    pub id: String,
    /// Amount refunded.
    pub amount: i64,
    /// Status.
    #[serde(default)]
    pub status: Option<String>,
    /// Charge refunded.
    #[serde(default)]
    pub charge: Option<String>,
}

impl_has_id!(
    Customer,
    PaymentMethod,
    PaymentIntent,
    Charge,
    Subscription,
    SetupIntent,
    CheckoutSession,
    BillingPortalSession,
    Refund
);

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
    /// URL for the list endpoint.
    #[serde(default)]
    pub url: Option<String>,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "charge.succeeded").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Live or test mode.
    #[serde(default)]
    pub livemode: bool,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
    /// Attributes that changed, on `*.updated` events.
    #[serde(default)]
    pub previous_attributes: Option<serde_json::Value>,
}

impl WebhookEvent {
    /// Decode the event object as a concrete Stripe type.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not match `T`.
    pub fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Card decline code.
    #[serde(default)]
    pub decline_code: Option<String>,
    /// Parameter that caused the error.
    #[serde(default)]
    pub param: Option<String>,
}
