//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{billing, health, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for the billing API. Each request makes at
/// least one Stripe call.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Billing (Service API key auth)
/// - `POST /v1/customers` - Create or fetch the owner's customer
/// - `PUT /v1/customers` - Push owner details to the processor
/// - `POST /v1/charges` - Charge a saved payment method
/// - `POST /v1/charges/:id/refund` - Refund a charge
/// - `GET /v1/payments/:id` - Payment intent for the confirmation page
/// - `POST /v1/subscriptions` - Subscribe to a price
/// - `POST /v1/subscriptions/:id/cancel` - Cancel a subscription
/// - `POST /v1/subscriptions/:id/resume` - Resume during the grace period
/// - `POST /v1/payment-methods` - Attach a payment method
/// - `DELETE /v1/payment-methods/:id` - Detach a payment method
/// - `POST /v1/setup-intents` - Collect a payment method for later
/// - `POST /v1/checkout-sessions` - Hosted Checkout page
/// - `POST /v1/billing-portal-sessions` - Hosted billing portal
/// - `GET /v1/owners/:owner_id/{subscriptions,charges,payment-methods}` - Local records
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route(
            "/customers",
            post(billing::create_customer).put(billing::update_customer),
        )
        .route("/charges", post(billing::create_charge))
        .route("/charges/:id/refund", post(billing::refund_charge))
        .route("/payments/:id", get(billing::get_payment))
        .route("/subscriptions", post(billing::create_subscription))
        .route("/subscriptions/:id/cancel", post(billing::cancel_subscription))
        .route("/subscriptions/:id/resume", post(billing::resume_subscription))
        .route("/payment-methods", post(billing::attach_payment_method))
        .route(
            "/payment-methods/:id",
            delete(billing::detach_payment_method),
        )
        .route("/setup-intents", post(billing::create_setup_intent))
        .route("/checkout-sessions", post(billing::create_checkout_session))
        .route(
            "/billing-portal-sessions",
            post(billing::create_billing_portal_session),
        )
        .route(
            "/owners/:owner_id/subscriptions",
            get(billing::list_subscriptions),
        )
        .route("/owners/:owner_id/charges", get(billing::list_charges))
        .route(
            "/owners/:owner_id/payment-methods",
            get(billing::list_payment_methods),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks are not rate limited; Stripe retries on failure.
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
