//! The `Billable` adapter: owner-level billing operations backed by Stripe
//! and mirrored into the local store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use billable_core::{
    BillingError, Charge, Customer, Owner, PaymentMethod, Processor, ProcessorError, Result,
    Subscription, SubscriptionId, UrlBuilder, DEFAULT_CURRENCY, DEFAULT_SUBSCRIPTION_NAME,
};
use billable_store::Store;

use crate::client::StripeClient;
use crate::params::{
    CheckoutLineItem, CreateCheckoutSession, CreateCustomer, CreatePaymentIntent,
    CreateSubscription, UpdateCustomer,
};
use crate::sync::{self, SUBSCRIPTION_NAME_KEY};
use crate::types::{self, Expandable, WebhookEvent};

/// A one-off charge against a saved payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// Currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Payment method to charge; the customer's default when absent.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Statement description.
    #[serde(default)]
    pub description: Option<String>,
    /// Metadata passed to the processor.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Idempotency key for the processor request.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl ChargeRequest {
    /// A charge in the default currency.
    #[must_use]
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            currency: default_currency(),
            payment_method: None,
            description: None,
            metadata: BTreeMap::new(),
            idempotency_key: None,
        }
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// A subscription to a single price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Local subscription name.
    #[serde(default = "default_subscription_name")]
    pub name: String,
    /// Processor price ID.
    pub price: String,
    /// Quantity.
    #[serde(default = "default_quantity")]
    pub quantity: u64,
    /// Trial length in days.
    #[serde(default)]
    pub trial_period_days: Option<u32>,
    /// Metadata passed to the processor.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Processor payment behaviour override.
    #[serde(default)]
    pub payment_behavior: Option<String>,
    /// Idempotency key for the processor request.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl SubscribeRequest {
    /// Subscribe to `price` under the default name.
    #[must_use]
    pub fn new(price: impl Into<String>) -> Self {
        Self {
            name: default_subscription_name(),
            price: price.into(),
            quantity: 1,
            trial_period_days: None,
            metadata: BTreeMap::new(),
            payment_behavior: None,
            idempotency_key: None,
        }
    }
}

fn default_subscription_name() -> String {
    DEFAULT_SUBSCRIPTION_NAME.to_string()
}

fn default_quantity() -> u64 {
    1
}

/// Attach a payment method collected client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachPaymentMethodRequest {
    /// Processor payment method ID (`pm_...`).
    pub payment_method_id: String,
    /// Make it the customer's default.
    #[serde(default)]
    pub default: bool,
}

/// Checkout session mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// One-time payment.
    #[default]
    Payment,
    /// Recurring subscription.
    Subscription,
    /// Save a payment method without paying.
    Setup,
}

impl CheckoutMode {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Subscription => "subscription",
            Self::Setup => "setup",
        }
    }
}

/// A hosted Checkout page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Session mode.
    #[serde(default)]
    pub mode: CheckoutMode,
    /// Items to buy.
    #[serde(default)]
    pub line_items: Vec<CheckoutLineItem>,
    /// Redirect after success; defaults to the app root with the session id.
    #[serde(default)]
    pub success_url: Option<String>,
    /// Redirect after cancel; defaults to the app root.
    #[serde(default)]
    pub cancel_url: Option<String>,
    /// Whether promotion codes can be entered.
    #[serde(default)]
    pub allow_promotion_codes: bool,
    /// Metadata passed to the processor.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A billing portal page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalRequest {
    /// Where the portal returns to; defaults to the app root.
    #[serde(default)]
    pub return_url: Option<String>,
}

/// How to cancel a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Keep access until the end of the paid period.
    #[default]
    AtPeriodEnd,
    /// End immediately.
    Now,
}

/// A hosted page to redirect the customer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLink {
    /// Processor session ID.
    pub id: String,
    /// Redirect URL.
    pub url: String,
}

/// A setup intent for the browser to confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupIntentResult {
    /// Setup intent ID.
    pub id: String,
    /// Secret for confirming in the browser.
    pub client_secret: Option<String>,
    /// Status.
    pub status: String,
}

/// A payment as shown on the payment confirmation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment intent ID.
    pub id: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Payment intent status.
    pub status: String,
    /// Secret for confirming in the browser.
    pub client_secret: Option<String>,
}

impl Payment {
    /// Whether the customer still has to authenticate.
    #[must_use]
    pub fn requires_action(&self) -> bool {
        matches!(self.status.as_str(), "requires_action" | "requires_confirmation")
    }

    /// Whether a new payment method is needed.
    #[must_use]
    pub fn requires_payment_method(&self) -> bool {
        self.status == "requires_payment_method"
    }

    /// Whether the payment went through.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    /// Whether the payment was canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.status == "canceled"
    }
}

/// Owner-level billing operations.
pub struct Billable<S> {
    client: StripeClient,
    store: Arc<S>,
    urls: UrlBuilder,
}

impl<S: Store> Billable<S> {
    /// Create the adapter.
    pub fn new(client: StripeClient, store: Arc<S>, urls: UrlBuilder) -> Self {
        Self {
            client,
            store,
            urls,
        }
    }

    /// The underlying Stripe client.
    pub fn client(&self) -> &StripeClient {
        &self.client
    }

    /// The local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The URL builder.
    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Return the owner's Stripe customer, creating it remotely when missing.
    ///
    /// A local record whose remote customer was deleted gets a new one.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad email, `Processor` if Stripe rejects a call.
    pub async fn create_or_fetch_customer(&self, owner: &Owner) -> Result<Customer> {
        owner.validate()?;

        let existing = self
            .store
            .find_customer_by_owner(&owner.id, Processor::Stripe)?;

        if let Some(customer) = &existing {
            if let Some(processor_id) = customer.processor_id.as_deref().filter(|id| !id.is_empty()) {
                match self.client.retrieve_customer(processor_id).await? {
                    Some(remote) if !remote.deleted => return Ok(customer.clone()),
                    _ => tracing::info!(
                        owner_id = %owner.id,
                        stripe_customer = %processor_id,
                        "Stripe customer missing, creating a new one"
                    ),
                }
            }
        }

        let params = CreateCustomer {
            email: owner.email.trim().to_string(),
            name: owner.name.clone(),
            metadata: BTreeMap::from([
                ("owner_id".to_string(), owner.id.to_string()),
                ("owner_type".to_string(), owner.owner_type.clone()),
            ]),
        };
        let remote = self.client.create_customer(&params).await?;

        let mut customer = existing.unwrap_or_else(|| Customer::new(owner, Processor::Stripe));
        customer.processor_id = Some(remote.id);
        copy_owner(&mut customer, owner);
        self.store.put_customer(&customer)?;

        tracing::info!(
            owner_id = %owner.id,
            customer_id = %customer.id,
            stripe_customer = ?customer.processor_id,
            "Created Stripe customer"
        );

        Ok(customer)
    }

    /// Push the owner's email and name to Stripe and the local record.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad email, `Processor` if Stripe rejects a call.
    pub async fn update_customer(&self, owner: &Owner) -> Result<Customer> {
        let mut customer = self.create_or_fetch_customer(owner).await?;
        let processor_id = remote_customer_id(&customer)?;

        let params = UpdateCustomer {
            email: Some(owner.email.trim().to_string()),
            name: owner.name.clone(),
            default_payment_method: None,
        };
        self.client.update_customer(&processor_id, &params).await?;

        copy_owner(&mut customer, owner);
        self.store.put_customer(&customer)?;
        Ok(customer)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Charge a saved payment method off-session.
    ///
    /// # Errors
    ///
    /// - `Validation` if the amount is not positive or no payment method exists.
    /// - `ActionRequired` if the customer must authenticate.
    /// - `InvalidPaymentMethod` if the method was declined.
    /// - `Pending` if the payment is still processing.
    /// - `Processor` for any other Stripe failure.
    pub async fn charge(&self, owner: &Owner, request: &ChargeRequest) -> Result<Charge> {
        if request.amount <= 0 {
            return Err(BillingError::Validation(
                "amount must be greater than zero".into(),
            ));
        }

        let customer = self.create_or_fetch_customer(owner).await?;
        let processor_id = remote_customer_id(&customer)?;

        let payment_method = match &request.payment_method {
            Some(pm) => pm.clone(),
            None => self
                .store
                .default_payment_method(&customer.id)?
                .map(|pm| pm.processor_id)
                .ok_or_else(|| BillingError::Validation("no payment method".into()))?,
        };

        let params = CreatePaymentIntent {
            customer: processor_id,
            payment_method,
            amount: request.amount,
            currency: request.currency.to_lowercase(),
            description: request.description.clone(),
            metadata: request.metadata.clone(),
        };
        let intent = self
            .client
            .create_payment_intent(&params, request.idempotency_key.as_deref())
            .await?;

        match intent.status.as_str() {
            "succeeded" => {
                let remote = match intent.latest_charge {
                    Some(Expandable::Object(charge)) => *charge,
                    Some(Expandable::Id(charge_id)) => self
                        .client
                        .retrieve_charge(&charge_id)
                        .await?
                        .ok_or_else(|| BillingError::not_found("charge", &charge_id))?,
                    None => {
                        return Err(ProcessorError::new(
                            "api_error",
                            format!("payment intent {} has no charge", intent.id),
                        )
                        .into())
                    }
                };

                let charge = self
                    .store
                    .upsert_charge(&sync::charge_record(customer.id, None, &remote))?;
                tracing::info!(
                    customer_id = %customer.id,
                    charge = %charge.processor_id,
                    amount = charge.amount,
                    "Charge succeeded"
                );
                Ok(charge)
            }
            "requires_action" | "requires_confirmation" => Err(BillingError::ActionRequired {
                payment_intent_id: intent.id,
                client_secret: intent.client_secret,
                subscription_id: None,
            }),
            "requires_payment_method" => Err(BillingError::InvalidPaymentMethod {
                payment_intent_id: intent.id,
            }),
            "processing" => Err(BillingError::Pending {
                payment_intent_id: intent.id,
            }),
            other => Err(ProcessorError::new(
                "api_error",
                format!("unexpected payment intent status: {other}"),
            )
            .into()),
        }
    }

    /// Look up a payment intent for the confirmation page.
    ///
    /// # Errors
    ///
    /// `NotFound` if Stripe has no such payment intent.
    pub async fn payment(&self, payment_intent_id: &str) -> Result<Payment> {
        let intent = self
            .client
            .retrieve_payment_intent(payment_intent_id)
            .await?
            .ok_or_else(|| BillingError::not_found("payment", payment_intent_id))?;

        Ok(Payment {
            id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
            status: intent.status,
            client_secret: intent.client_secret,
        })
    }

    /// Refund a charge, fully when `amount` is `None`.
    ///
    /// Only a settled refund is added to the local charge; a pending one is
    /// picked up by the `charge.refunded` webhook.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown charge, `Validation` if the amount exceeds
    /// what is left to refund, `Processor` if Stripe reports the refund as
    /// failed or canceled.
    pub async fn refund(&self, charge_processor_id: &str, amount: Option<i64>) -> Result<Charge> {
        let mut charge = self
            .store
            .find_charge_by_processor_id(charge_processor_id)?
            .ok_or_else(|| BillingError::not_found("charge", charge_processor_id))?;

        let refundable = charge.refundable_amount();
        let amount = amount.unwrap_or(refundable);
        if amount <= 0 || amount > refundable {
            return Err(BillingError::Validation(format!(
                "refund amount must be between 1 and {refundable}"
            )));
        }

        let refund = self
            .client
            .create_refund(charge_processor_id, Some(amount), None)
            .await?;

        match refund.status.as_deref() {
            Some("succeeded") => {
                charge.amount_refunded =
                    (charge.amount_refunded + refund.amount).min(charge.amount);
                charge.updated_at = Utc::now();
                let charge = self.store.upsert_charge(&charge)?;

                tracing::info!(
                    charge = %charge.processor_id,
                    refund = %refund.id,
                    amount = refund.amount,
                    fully_refunded = charge.is_fully_refunded(),
                    "Refunded charge"
                );
                Ok(charge)
            }
            Some(status @ ("failed" | "canceled")) => Err(ProcessorError::new(
                "refund_error",
                format!("refund {} {status}", refund.id),
            )
            .into()),
            status => {
                tracing::info!(
                    charge = %charge.processor_id,
                    refund = %refund.id,
                    status = ?status,
                    "Refund pending"
                );
                Ok(charge)
            }
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe the owner to a price.
    ///
    /// The local record is stored before payment problems are reported, so an
    /// `incomplete` subscription exists when `ActionRequired` is returned.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty price or zero quantity.
    /// - `ActionRequired` if the first payment or setup needs authentication.
    /// - `InvalidPaymentMethod` if the first payment was declined.
    pub async fn create_subscription(
        &self,
        owner: &Owner,
        request: &SubscribeRequest,
    ) -> Result<Subscription> {
        if request.price.trim().is_empty() {
            return Err(BillingError::Validation("price is required".into()));
        }
        if request.quantity == 0 {
            return Err(BillingError::Validation(
                "quantity must be at least 1".into(),
            ));
        }

        let customer = self.create_or_fetch_customer(owner).await?;
        let processor_id = remote_customer_id(&customer)?;

        let mut metadata = request.metadata.clone();
        metadata.insert(SUBSCRIPTION_NAME_KEY.to_string(), request.name.clone());

        let params = CreateSubscription {
            customer: processor_id,
            price: request.price.clone(),
            quantity: request.quantity,
            trial_period_days: request.trial_period_days,
            payment_behavior: request.payment_behavior.clone(),
            metadata,
        };
        let remote = self
            .client
            .create_subscription(&params, request.idempotency_key.as_deref())
            .await?;

        let subscription = self.store.upsert_subscription(&sync::subscription_record(
            customer.id,
            &remote,
            Some(&request.name),
        ))?;

        tracing::info!(
            customer_id = %customer.id,
            subscription = %subscription.processor_id,
            status = subscription.status.as_str(),
            "Created subscription"
        );

        check_initial_payment(&remote)?;
        Ok(subscription)
    }

    /// Cancel a subscription at period end or immediately.
    ///
    /// # Errors
    ///
    /// `NotFound` if the subscription is not stored locally.
    pub async fn cancel_subscription(
        &self,
        subscription_processor_id: &str,
        mode: CancelMode,
    ) -> Result<Subscription> {
        let existing = self.local_subscription(subscription_processor_id)?;

        let remote = match mode {
            CancelMode::AtPeriodEnd => {
                self.client
                    .set_cancel_at_period_end(subscription_processor_id, true)
                    .await?
            }
            CancelMode::Now => {
                self.client
                    .cancel_subscription(subscription_processor_id)
                    .await?
            }
        };

        tracing::info!(subscription = %subscription_processor_id, ?mode, "Canceled subscription");
        self.store_subscription(&existing, &remote)
    }

    /// Undo a cancellation scheduled for period end.
    ///
    /// # Errors
    ///
    /// `Validation` unless the subscription is in its grace period.
    pub async fn resume_subscription(&self, subscription_processor_id: &str) -> Result<Subscription> {
        let existing = self.local_subscription(subscription_processor_id)?;
        if !existing.on_grace_period_at(Utc::now()) {
            return Err(BillingError::Validation(
                "subscription can only be resumed during its grace period".into(),
            ));
        }

        let remote = self
            .client
            .set_cancel_at_period_end(subscription_processor_id, false)
            .await?;

        tracing::info!(subscription = %subscription_processor_id, "Resumed subscription");
        self.store_subscription(&existing, &remote)
    }

    fn local_subscription(&self, processor_id: &str) -> Result<Subscription> {
        self.store
            .find_subscription_by_processor_id(processor_id)?
            .ok_or_else(|| BillingError::not_found("subscription", processor_id))
    }

    fn store_subscription(
        &self,
        existing: &Subscription,
        remote: &types::Subscription,
    ) -> Result<Subscription> {
        let record = sync::subscription_record(existing.customer_id, remote, Some(&existing.name));
        Ok(self.store.upsert_subscription(&record)?)
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    /// Attach a payment method and optionally make it the default.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty id, `Processor` if Stripe rejects a call.
    pub async fn attach_payment_method(
        &self,
        owner: &Owner,
        request: &AttachPaymentMethodRequest,
    ) -> Result<PaymentMethod> {
        if request.payment_method_id.trim().is_empty() {
            return Err(BillingError::Validation(
                "payment_method_id is required".into(),
            ));
        }

        let customer = self.create_or_fetch_customer(owner).await?;
        let processor_id = remote_customer_id(&customer)?;

        let remote = self
            .client
            .attach_payment_method(&request.payment_method_id, &processor_id)
            .await?;

        if request.default {
            let params = UpdateCustomer {
                default_payment_method: Some(remote.id.clone()),
                ..UpdateCustomer::default()
            };
            self.client.update_customer(&processor_id, &params).await?;
        }

        let mut record = self
            .store
            .find_or_create_payment_method(&customer.id, &remote.id)?;
        sync::apply_payment_method(&mut record, &remote);
        self.store.put_payment_method(&record)?;

        if request.default {
            record = self
                .store
                .mark_default_payment_method(&customer.id, &remote.id)?;
        }

        tracing::info!(
            customer_id = %customer.id,
            payment_method = %record.processor_id,
            default = record.default,
            "Attached payment method"
        );
        Ok(record)
    }

    /// Detach a payment method at Stripe and forget it locally.
    ///
    /// # Errors
    ///
    /// `NotFound` if the method is not stored locally, `Processor` if Stripe
    /// rejects the call.
    pub async fn detach_payment_method(&self, processor_id: &str) -> Result<PaymentMethod> {
        let record = self
            .store
            .find_payment_method_by_processor_id(processor_id)?
            .ok_or_else(|| BillingError::not_found("payment method", processor_id))?;

        self.client.detach_payment_method(processor_id).await?;
        self.store.delete_payment_method(processor_id)?;

        tracing::info!(
            customer_id = %record.customer_id,
            payment_method = %processor_id,
            "Detached payment method"
        );
        Ok(record)
    }

    /// Create a setup intent for collecting a payment method off-session.
    ///
    /// # Errors
    ///
    /// `Processor` if Stripe rejects a call.
    pub async fn create_setup_intent(&self, owner: &Owner) -> Result<SetupIntentResult> {
        let customer = self.create_or_fetch_customer(owner).await?;
        let intent = self
            .client
            .create_setup_intent(&remote_customer_id(&customer)?)
            .await?;

        Ok(SetupIntentResult {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
        })
    }

    // =========================================================================
    // Hosted pages
    // =========================================================================

    /// Create a Checkout session.
    ///
    /// # Errors
    ///
    /// `Validation` if a payment or subscription session has no line items.
    pub async fn create_checkout_session(
        &self,
        owner: &Owner,
        request: &CheckoutRequest,
    ) -> Result<SessionLink> {
        if request.mode != CheckoutMode::Setup && request.line_items.is_empty() {
            return Err(BillingError::Validation(
                "at least one line item is required".into(),
            ));
        }
        if request
            .line_items
            .iter()
            .any(|item| item.price.trim().is_empty() || item.quantity == 0)
        {
            return Err(BillingError::Validation(
                "line items need a price and a positive quantity".into(),
            ));
        }

        let customer = self.create_or_fetch_customer(owner).await?;

        let params = CreateCheckoutSession {
            customer: remote_customer_id(&customer)?,
            mode: request.mode.as_str().to_string(),
            line_items: request.line_items.clone(),
            success_url: request
                .success_url
                .clone()
                .unwrap_or_else(|| self.urls.checkout_success_url()),
            cancel_url: request
                .cancel_url
                .clone()
                .unwrap_or_else(|| self.urls.root_url().to_string()),
            client_reference_id: owner.id.to_string(),
            allow_promotion_codes: request.allow_promotion_codes,
            metadata: request.metadata.clone(),
        };
        let session = self.client.create_checkout_session(&params).await?;

        let url = session.url.ok_or_else(|| {
            BillingError::from(ProcessorError::new(
                "api_error",
                format!("checkout session {} has no url", session.id),
            ))
        })?;
        Ok(SessionLink {
            id: session.id,
            url,
        })
    }

    /// Create a billing portal session.
    ///
    /// # Errors
    ///
    /// `Processor` if Stripe rejects a call.
    pub async fn create_billing_portal_session(
        &self,
        owner: &Owner,
        request: &PortalRequest,
    ) -> Result<SessionLink> {
        let customer = self.create_or_fetch_customer(owner).await?;
        let return_url = request
            .return_url
            .clone()
            .unwrap_or_else(|| self.urls.root_url().to_string());

        let session = self
            .client
            .create_billing_portal_session(&remote_customer_id(&customer)?, &return_url)
            .await?;

        Ok(SessionLink {
            id: session.id,
            url: session.url,
        })
    }

    // =========================================================================
    // Webhook sync
    // =========================================================================

    /// Verify a webhook payload and parse the event.
    ///
    /// # Errors
    ///
    /// `Configuration` without a webhook secret, `Processor` for a bad
    /// signature or payload.
    pub fn verify_webhook(&self, payload: &str, signature: &str, now: i64) -> Result<WebhookEvent> {
        Ok(self.client.construct_event(payload, signature, now)?)
    }

    /// Upsert a charge. Charges of unknown customers are skipped.
    ///
    /// Invoice charges are linked to the invoice's subscription.
    ///
    /// # Errors
    ///
    /// Storage or processor errors.
    pub async fn sync_charge(&self, remote: &types::Charge) -> Result<Option<Charge>> {
        let Some(customer) = self.customer_for(remote.customer.as_deref())? else {
            tracing::debug!(charge = %remote.id, "Skipping charge for unknown customer");
            return Ok(None);
        };

        let subscription_id = match remote.invoice.as_deref() {
            Some(invoice_id) => self.invoice_subscription(invoice_id).await?,
            None => None,
        };

        let charge = self
            .store
            .upsert_charge(&sync::charge_record(customer.id, subscription_id, remote))?;
        Ok(Some(charge))
    }

    async fn invoice_subscription(&self, invoice_id: &str) -> Result<Option<SubscriptionId>> {
        let Some(invoice) = self.client.retrieve_invoice(invoice_id).await? else {
            return Ok(None);
        };
        let Some(subscription) = invoice.subscription else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_subscription_by_processor_id(&subscription)?
            .map(|s| s.id))
    }

    /// Upsert a subscription. Subscriptions of unknown customers are skipped.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn sync_subscription(&self, remote: &types::Subscription) -> Result<Option<Subscription>> {
        let Some(customer) = self.customer_for(Some(&remote.customer))? else {
            tracing::debug!(subscription = %remote.id, "Skipping subscription for unknown customer");
            return Ok(None);
        };

        let existing = self.store.find_subscription_by_processor_id(&remote.id)?;
        let record = sync::subscription_record(
            customer.id,
            remote,
            existing.as_ref().map(|s| s.name.as_str()),
        );
        Ok(Some(self.store.upsert_subscription(&record)?))
    }

    /// Upsert a payment method. Methods without a known customer are skipped.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn sync_payment_method(
        &self,
        remote: &types::PaymentMethod,
    ) -> Result<Option<PaymentMethod>> {
        let Some(customer) = self.customer_for(remote.customer.as_deref())? else {
            return Ok(None);
        };

        let mut record = self
            .store
            .find_or_create_payment_method(&customer.id, &remote.id)?;
        sync::apply_payment_method(&mut record, remote);
        self.store.put_payment_method(&record)?;
        Ok(Some(record))
    }

    /// Mirror the customer's invoice default payment method.
    ///
    /// A cleared default unmarks the local one. A default given only by id
    /// and not yet stored is fetched for its card details.
    ///
    /// # Errors
    ///
    /// Storage or processor errors.
    pub async fn sync_default_payment_method(
        &self,
        remote: &types::Customer,
    ) -> Result<Option<PaymentMethod>> {
        let Some(customer) = self.customer_for(Some(&remote.id))? else {
            return Ok(None);
        };
        let Some(settings) = remote.invoice_settings.as_ref() else {
            return Ok(None);
        };
        let Some(default) = settings.default_payment_method.as_ref() else {
            if let Some(previous) = self.store.clear_default_payment_method(&customer.id)? {
                tracing::debug!(
                    customer_id = %customer.id,
                    payment_method = %previous.processor_id,
                    "Cleared default payment method"
                );
            }
            return Ok(None);
        };

        let details = match default {
            Expandable::Object(details) => Some((**details).clone()),
            Expandable::Id(id) => {
                if self.store.find_payment_method_by_processor_id(id)?.is_some() {
                    None
                } else {
                    self.client.retrieve_payment_method(id).await?
                }
            }
        };

        let mut record = self
            .store
            .find_or_create_payment_method(&customer.id, default.id())?;
        if let Some(details) = details {
            sync::apply_payment_method(&mut record, &details);
            self.store.put_payment_method(&record)?;
        }

        Ok(Some(
            self.store
                .mark_default_payment_method(&customer.id, default.id())?,
        ))
    }

    /// Forget a detached payment method.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn delete_payment_method(&self, processor_id: &str) -> Result<bool> {
        Ok(self.store.delete_payment_method(processor_id)?)
    }

    fn customer_for(&self, processor_id: Option<&str>) -> Result<Option<Customer>> {
        match processor_id {
            Some(id) => Ok(self.store.find_customer_by_processor_id(id)?),
            None => Ok(None),
        }
    }
}

fn copy_owner(customer: &mut Customer, owner: &Owner) {
    customer.email = owner.email.trim().to_string();
    customer.name.clone_from(&owner.name);
    if owner.locale.is_some() {
        customer.locale.clone_from(&owner.locale);
    }
    customer.updated_at = Utc::now();
}

fn remote_customer_id(customer: &Customer) -> Result<String> {
    customer
        .processor_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BillingError::not_found("stripe customer", customer.id))
}

fn check_initial_payment(remote: &types::Subscription) -> Result<()> {
    let intent = remote
        .latest_invoice
        .as_ref()
        .and_then(Expandable::as_object)
        .and_then(|invoice| invoice.payment_intent.as_ref())
        .and_then(Expandable::as_object);

    if let Some(intent) = intent {
        match intent.status.as_str() {
            "requires_action" | "requires_confirmation" => {
                return Err(BillingError::ActionRequired {
                    payment_intent_id: intent.id.clone(),
                    client_secret: intent.client_secret.clone(),
                    subscription_id: Some(remote.id.clone()),
                })
            }
            "requires_payment_method" => {
                return Err(BillingError::InvalidPaymentMethod {
                    payment_intent_id: intent.id.clone(),
                })
            }
            _ => {}
        }
    }

    if let Some(setup) = remote
        .pending_setup_intent
        .as_ref()
        .and_then(Expandable::as_object)
    {
        if matches!(setup.status.as_str(), "requires_action" | "requires_confirmation") {
            return Err(BillingError::ActionRequired {
                payment_intent_id: setup.id.clone(),
                client_secret: setup.client_secret.clone(),
                subscription_id: Some(remote.id.clone()),
            });
        }
    }

    Ok(())
}
