//! Stripe API client implementation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::StripeError;
use crate::params::{
    CreateCheckoutSession, CreateCustomer, CreatePaymentIntent, CreateSubscription, FormParams,
    UpdateCustomer,
};
use crate::types::{
    BillingPortalSession, Charge, CheckoutSession, Customer, Invoice, PaymentIntent,
    PaymentMethod, Refund, SetupIntent, StripeErrorResponse, Subscription, WebhookEvent,
};
use crate::webhook;

/// API version sent with every request.
pub const API_VERSION: &str = "2024-06-20";

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    webhook_secret: Option<String>,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `webhook_secret` - Optional webhook signing secret (`whsec_...`)
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Result<Self, StripeError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StripeError::Configuration("Stripe API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client at another API root (a mock server in tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether a webhook signing secret is configured.
    #[must_use]
    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret.is_some()
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Create a customer.
    pub async fn create_customer(&self, params: &CreateCustomer) -> Result<Customer, StripeError> {
        self.post("customers", &params.to_form(), None).await
    }

    /// Get a customer by ID. Deleted customers are returned with `deleted` set.
    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<Option<Customer>, StripeError> {
        self.get_opt(&format!("customers/{customer_id}")).await
    }

    /// Update a customer.
    pub async fn update_customer(
        &self,
        customer_id: &str,
        params: &UpdateCustomer,
    ) -> Result<Customer, StripeError> {
        self.post(&format!("customers/{customer_id}"), &params.to_form(), None)
            .await
    }

    // =========================================================================
    // Payment intents
    // =========================================================================

    /// Create and confirm a payment intent.
    pub async fn create_payment_intent(
        &self,
        params: &CreatePaymentIntent,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentIntent, StripeError> {
        tracing::debug!(
            customer = %params.customer,
            amount = params.amount,
            currency = %params.currency,
            "Creating Stripe payment intent"
        );
        self.post("payment_intents", &params.to_form(), idempotency_key)
            .await
    }

    /// Get a payment intent by ID.
    pub async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, StripeError> {
        self.get_opt(&format!("payment_intents/{payment_intent_id}"))
            .await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Create a subscription.
    pub async fn create_subscription(
        &self,
        params: &CreateSubscription,
        idempotency_key: Option<&str>,
    ) -> Result<Subscription, StripeError> {
        tracing::debug!(
            customer = %params.customer,
            price = %params.price,
            quantity = params.quantity,
            "Creating Stripe subscription"
        );
        self.post("subscriptions", &params.to_form(), idempotency_key)
            .await
    }

    /// Schedule (or unschedule) cancellation at the end of the current period.
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<Subscription, StripeError> {
        let mut params = FormParams::new();
        params.push("cancel_at_period_end", cancel_at_period_end);
        self.post(&format!("subscriptions/{subscription_id}"), &params, None)
            .await
    }

    /// Cancel a subscription immediately.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        let request = self
            .client
            .delete(self.url(&format!("subscriptions/{subscription_id}")));
        self.send(request).await
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    /// Attach a payment method to a customer.
    pub async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<PaymentMethod, StripeError> {
        let mut params = FormParams::new();
        params.push("customer", customer_id);
        self.post(
            &format!("payment_methods/{payment_method_id}/attach"),
            &params,
            None,
        )
        .await
    }

    /// Detach a payment method from its customer.
    pub async fn detach_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, StripeError> {
        self.post(
            &format!("payment_methods/{payment_method_id}/detach"),
            &FormParams::new(),
            None,
        )
        .await
    }

    /// Get a payment method by ID.
    pub async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<Option<PaymentMethod>, StripeError> {
        self.get_opt(&format!("payment_methods/{payment_method_id}"))
            .await
    }

    /// Create an off-session setup intent for collecting a payment method.
    pub async fn create_setup_intent(&self, customer_id: &str) -> Result<SetupIntent, StripeError> {
        let mut params = FormParams::new();
        params.push("customer", customer_id).push("usage", "off_session");
        self.post("setup_intents", &params, None).await
    }

    // =========================================================================
    // Hosted pages
    // =========================================================================

    /// Create a Checkout session.
    pub async fn create_checkout_session(
        &self,
        params: &CreateCheckoutSession,
    ) -> Result<CheckoutSession, StripeError> {
        tracing::debug!(
            customer = %params.customer,
            mode = %params.mode,
            line_items = params.line_items.len(),
            "Creating Stripe checkout session"
        );
        self.post("checkout/sessions", &params.to_form(), None).await
    }

    /// Create a billing portal session.
    pub async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<BillingPortalSession, StripeError> {
        let mut params = FormParams::new();
        params
            .push("customer", customer_id)
            .push("return_url", return_url);
        self.post("billing_portal/sessions", &params, None).await
    }

    // =========================================================================
    // Charges, refunds, invoices
    // =========================================================================

    /// Get a charge by ID.
    pub async fn retrieve_charge(&self, charge_id: &str) -> Result<Option<Charge>, StripeError> {
        self.get_opt(&format!("charges/{charge_id}")).await
    }

    /// Refund a charge, fully when `amount` is `None`.
    pub async fn create_refund(
        &self,
        charge_id: &str,
        amount: Option<i64>,
        idempotency_key: Option<&str>,
    ) -> Result<Refund, StripeError> {
        let mut params = FormParams::new();
        params.push("charge", charge_id).push_opt("amount", amount);
        self.post("refunds", &params, idempotency_key).await
    }

    /// Get an invoice by ID.
    pub async fn retrieve_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, StripeError> {
        self.get_opt(&format!("invoices/{invoice_id}")).await
    }

    // =========================================================================
    // Webhooks
    // =========================================================================

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    ///
    /// * `payload` - Raw request body
    /// * `signature` - Value of the `Stripe-Signature` header
    /// * `now` - Current Unix time in seconds
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if no webhook secret is set, or a
    /// signature error if verification fails.
    pub fn construct_event(
        &self,
        payload: &str,
        signature: &str,
        now: i64,
    ) -> Result<WebhookEvent, StripeError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| StripeError::Configuration("Webhook secret not configured".into()))?;
        webhook::construct_event(secret, payload, signature, now)
    }

    // =========================================================================
    // Transport
    // =========================================================================

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &FormParams,
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeError> {
        let mut request = self.client.post(self.url(path)).form(params.pairs());
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        self.send(request).await
    }

    async fn get_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StripeError> {
        let response = self
            .authorize(self.client.get(self.url(path)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::handle_response(response).await.map(Some)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StripeError> {
        let response = self.authorize(request).send().await?;
        Self::handle_response(response).await
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Stripe-Version", API_VERSION)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        let err = match error_body {
            Ok(stripe_error) => StripeError::Api {
                status: status.as_u16(),
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
                decline_code: stripe_error.error.decline_code,
                param: stripe_error.error.param,
            },
            Err(_) => StripeError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
                decline_code: None,
                param: None,
            },
        };

        tracing::warn!(status = status.as_u16(), error = %err, "Stripe request failed");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> StripeClient {
        StripeClient::new("sk_test_123", Some("whsec_test".into()))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            StripeClient::new("  ", None),
            Err(StripeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn create_customer_sends_form_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .and(header_exists("authorization"))
            .and(header("stripe-version", API_VERSION))
            .and(body_string_contains("metadata%5Bowner_id%5D=own_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "cus_1", "email": "a@example.com" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = CreateCustomer {
            email: "a@example.com".into(),
            name: None,
            metadata: [("owner_id".to_string(), "own_1".to_string())].into(),
        };
        let customer = client(&server).await.create_customer(&params).await.unwrap();
        assert_eq!(customer.id, "cus_1");
    }

    #[tokio::test]
    async fn retrieve_missing_customer_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/cus_gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "type": "invalid_request_error", "message": "No such customer", "code": "resource_missing" }
            })))
            .mount(&server)
            .await;

        let customer = client(&server)
            .await
            .retrieve_customer("cus_gone")
            .await
            .unwrap();
        assert!(customer.is_none());
    }

    #[tokio::test]
    async fn api_errors_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment_intents"))
            .and(header("idempotency-key", "order-42"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "message": "Your card was declined.",
                    "code": "card_declined",
                    "decline_code": "generic_decline"
                }
            })))
            .mount(&server)
            .await;

        let params = CreatePaymentIntent {
            customer: "cus_1".into(),
            payment_method: "pm_1".into(),
            amount: 1000,
            currency: "usd".into(),
            description: None,
            metadata: std::collections::BTreeMap::new(),
        };
        let err = client(&server)
            .await
            .create_payment_intent(&params, Some("order-42"))
            .await
            .unwrap_err();

        match err {
            StripeError::Api {
                status,
                error_type,
                decline_code,
                ..
            } => {
                assert_eq!(status, 402);
                assert_eq!(error_type, "card_error");
                assert_eq!(decline_code.as_deref(), Some("generic_decline"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_is_reported_by_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refunds"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .create_refund("ch_1", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StripeError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn cancel_subscription_uses_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/subscriptions/sub_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "canceled",
                "items": { "data": [{ "id": "si_1", "price": { "id": "price_1" } }] },
                "ended_at": 1_700_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sub = client(&server)
            .await
            .cancel_subscription("sub_1")
            .await
            .unwrap();
        assert_eq!(sub.status, "canceled");
    }

    #[test]
    fn construct_event_requires_secret() {
        let client = StripeClient::new("sk_test_123", Some(String::new())).unwrap();
        assert!(!client.has_webhook_secret());
        assert!(matches!(
            client.construct_event("{}", "t=1,v1=00", 1),
            Err(StripeError::Configuration(_))
        ));
    }
}
