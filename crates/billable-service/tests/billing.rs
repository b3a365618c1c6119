//! Billing endpoint integration tests against a mocked Stripe API.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn charge_intent(status: &str) -> Value {
    json!({
        "id": "pi_1",
        "status": status,
        "amount": 1500,
        "currency": "usd",
        "customer": "cus_1",
        "client_secret": "pi_1_secret",
        "latest_charge": {
            "id": "ch_1",
            "amount": 1500,
            "currency": "usd",
            "status": "succeeded",
            "customer": "cus_1",
            "payment_intent": "pi_1",
            "created": 1_700_000_000
        }
    })
}

/// Charge the owner 1500 through the API, creating `ch_1`.
async fn charge_owner(harness: &TestHarness) {
    harness.create_customer().await;
    harness
        .mock("POST", "/payment_intents", 200, charge_intent("succeeded"))
        .await;

    harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500, "payment_method": "pm_1" }))
        .await
        .assert_status(StatusCode::CREATED);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn billing_requires_service_key() {
    let harness = TestHarness::new().await;
    let body = json!({ "owner": harness.owner(), "amount": 1500 });

    harness
        .server
        .post("/v1/charges")
        .json(&body)
        .await
        .assert_status_unauthorized();

    harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", "wrong-key")
        .json(&body)
        .await
        .assert_status_unauthorized();
}

// ============================================================================
// Customers
// ============================================================================

#[tokio::test]
async fn create_customer_stores_processor_id() {
    let harness = TestHarness::new().await;
    harness
        .mock("POST", "/customers", 200, json!({ "id": "cus_1", "email": "jane@example.com" }))
        .await;

    let response = harness
        .server
        .post("/v1/customers")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner() }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["processor_id"], "cus_1");
    assert_eq!(body["email"], "jane@example.com");
}

#[tokio::test]
async fn invalid_owner_email_is_bad_request() {
    let harness = TestHarness::new().await;
    let owner = json!({ "id": harness.owner_id.to_string(), "email": "not-an-email" });

    let response = harness
        .server
        .post("/v1/customers")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": owner }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

// ============================================================================
// Charges
// ============================================================================

#[tokio::test]
async fn charge_succeeds_and_is_listed() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    harness
        .mock("POST", "/payment_intents", 200, charge_intent("succeeded"))
        .await;

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500, "payment_method": "pm_1" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["processor_id"], "ch_1");
    assert_eq!(body["amount"], 1500);

    let response = harness
        .server
        .get(&format!("/v1/owners/{}/charges", harness.owner_id))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn charge_requiring_action_returns_client_secret() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    harness
        .mock("POST", "/payment_intents", 200, charge_intent("requires_action"))
        .await;

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500, "payment_method": "pm_1" }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "action_required");
    assert_eq!(body["error"]["details"]["payment_intent_id"], "pi_1");
    assert_eq!(body["error"]["details"]["client_secret"], "pi_1_secret");
}

#[tokio::test]
async fn charge_without_payment_method_is_bad_request() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500 }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn declined_card_is_processor_error() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    harness
        .mock(
            "POST",
            "/payment_intents",
            402,
            json!({ "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined."
            }}),
        )
        .await;

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500, "payment_method": "pm_1" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "processor_error");
    assert_eq!(body["error"]["message"], "Your card was declined.");
    assert_eq!(body["error"]["details"]["code"], "card_declined");
}

#[tokio::test]
async fn processing_charge_is_pending() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    harness
        .mock("POST", "/payment_intents", 200, charge_intent("processing"))
        .await;

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500, "payment_method": "pm_1" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "payment_pending");
    assert_eq!(body["error"]["details"]["payment_intent_id"], "pi_1");
}

#[tokio::test]
async fn charge_needing_new_payment_method_is_declined() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    harness
        .mock(
            "POST",
            "/payment_intents",
            200,
            charge_intent("requires_payment_method"),
        )
        .await;

    let response = harness
        .server
        .post("/v1/charges")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "amount": 1500, "payment_method": "pm_1" }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "payment_method_declined");
}

#[tokio::test]
async fn payment_lookup_returns_status_and_secret() {
    let harness = TestHarness::new().await;
    harness
        .mock("GET", "/payment_intents/pi_1", 200, charge_intent("requires_action"))
        .await;

    let response = harness
        .server
        .get("/v1/payments/pi_1")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "requires_action");
    assert_eq!(body["client_secret"], "pi_1_secret");
    assert_eq!(body["amount"], 1500);

    harness
        .server
        .get("/v1/payments/pi_missing")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_not_found();
}

// ============================================================================
// Refunds
// ============================================================================

#[tokio::test]
async fn partial_refund_uses_requested_amount() {
    let harness = TestHarness::new().await;
    charge_owner(&harness).await;
    harness
        .mock(
            "POST",
            "/refunds",
            200,
            json!({ "id": "re_1", "amount": 500, "status": "succeeded", "charge": "ch_1" }),
        )
        .await;

    let response = harness
        .server
        .post("/v1/charges/ch_1/refund")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "amount": 500 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["amount_refunded"], 500);
}

#[tokio::test]
async fn refund_without_body_refunds_remaining_amount() {
    let harness = TestHarness::new().await;
    charge_owner(&harness).await;
    harness
        .mock(
            "POST",
            "/refunds",
            200,
            json!({ "id": "re_1", "amount": 1500, "status": "succeeded", "charge": "ch_1" }),
        )
        .await;

    let response = harness
        .server
        .post("/v1/charges/ch_1/refund")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["amount_refunded"], 1500);
}

#[tokio::test]
async fn malformed_refund_body_is_rejected() {
    let harness = TestHarness::new().await;
    charge_owner(&harness).await;
    Mock::given(method("POST"))
        .and(path("/refunds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "re_1", "amount": 1500 })))
        .expect(0)
        .mount(&harness.stripe)
        .await;

    // Amount as a string.
    let response = harness
        .server
        .post("/v1/charges/ch_1/refund")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "amount": "500" }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"]["code"], "bad_request");

    // JSON sent without the JSON content type.
    harness
        .server
        .post("/v1/charges/ch_1/refund")
        .add_header("x-api-key", harness.service_api_key.clone())
        .text(r#"{"amount":500}"#)
        .await
        .assert_status_bad_request();

    // Misspelled field.
    harness
        .server
        .post("/v1/charges/ch_1/refund")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "amont": 500 }))
        .await
        .assert_status_bad_request();

    let charge: Value = harness
        .server
        .get(&format!("/v1/owners/{}/charges", harness.owner_id))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .json();
    assert_eq!(charge["data"][0]["amount_refunded"], 0);
}

// ============================================================================
// Subscriptions and records
// ============================================================================

#[tokio::test]
async fn cancel_with_unknown_mode_is_rejected() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/subscriptions/sub_1/cancel")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "mode": "Now" }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn cancel_unknown_subscription_is_not_found() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/subscriptions/sub_missing/cancel")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn records_of_unknown_owner_are_not_found() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get(&format!("/v1/owners/{}/subscriptions", harness.owner_id))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_not_found();

    harness
        .server
        .get("/v1/owners/not-a-uuid/subscriptions")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Payment methods
// ============================================================================

#[tokio::test]
async fn detach_payment_method_forgets_it() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    let payment_method = json!({
        "id": "pm_1",
        "type": "card",
        "customer": "cus_1",
        "card": { "brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030 }
    });
    harness
        .mock("POST", "/payment_methods/pm_1/attach", 200, payment_method.clone())
        .await;
    Mock::given(method("POST"))
        .and(path("/payment_methods/pm_1/detach"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_method))
        .expect(1)
        .mount(&harness.stripe)
        .await;

    harness
        .server
        .post("/v1/payment-methods")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "payment_method_id": "pm_1" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .delete("/v1/payment-methods/pm_1")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["processor_id"], "pm_1");

    let listed: Value = harness
        .server
        .get(&format!("/v1/owners/{}/payment-methods", harness.owner_id))
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .json();
    assert!(listed["data"].as_array().unwrap().is_empty());

    harness
        .server
        .delete("/v1/payment-methods/pm_1")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await
        .assert_status_not_found();
}

// ============================================================================
// Hosted pages
// ============================================================================

#[tokio::test]
async fn checkout_session_returns_redirect_url() {
    let harness = TestHarness::new().await;
    harness.create_customer().await;
    harness
        .mock(
            "POST",
            "/checkout/sessions",
            200,
            json!({ "id": "cs_1", "url": "https://checkout.stripe.com/c/cs_1" }),
        )
        .await;

    let response = harness
        .server
        .post("/v1/checkout-sessions")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "owner": harness.owner(),
            "mode": "payment",
            "line_items": [{ "price": "price_1", "quantity": 2 }]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["id"], "cs_1");
    assert_eq!(body["url"], "https://checkout.stripe.com/c/cs_1");
}

#[tokio::test]
async fn checkout_without_line_items_is_bad_request() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/checkout-sessions")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({ "owner": harness.owner(), "mode": "subscription" }))
        .await;

    response.assert_status_bad_request();
}
