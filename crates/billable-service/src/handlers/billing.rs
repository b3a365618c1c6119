//! Billing endpoints: customers, charges, subscriptions, payment methods and
//! hosted pages.
//!
//! Mutating requests carry the owner next to the operation's own fields:
//!
//! ```json
//! { "owner": { "id": "…", "email": "jane@example.com" }, "amount": 1500 }
//! ```

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use billable_core::{
    Charge, Customer, Owner, OwnerId, PaymentMethod, Processor, Subscription,
};
use billable_store::{RocksStore, Store};
use billable_stripe::{
    AttachPaymentMethodRequest, Billable, CancelMode, ChargeRequest, CheckoutRequest, Payment,
    PortalRequest, SessionLink, SetupIntentResult, SubscribeRequest,
};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::extract::OptionalJson;
use crate::state::AppState;

/// An operation on behalf of an owner.
#[derive(Debug, Deserialize)]
pub struct WithOwner<T> {
    /// The billable entity.
    pub owner: Owner,
    /// Operation fields.
    #[serde(flatten)]
    pub request: T,
}

/// Request that only names the owner.
#[derive(Debug, Deserialize)]
pub struct OwnerBody {
    /// The billable entity.
    pub owner: Owner,
}

/// Refund request.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefundBody {
    /// Amount to refund; the whole remaining amount when omitted.
    #[serde(default)]
    pub amount: Option<i64>,
}

/// Cancel request.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelBody {
    /// When access ends.
    #[serde(default)]
    pub mode: CancelMode,
}

/// List response.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    /// Items, newest first.
    pub data: Vec<T>,
}

fn billable(state: &AppState) -> Result<&Billable<RocksStore>, ApiError> {
    state
        .billable
        .as_deref()
        .ok_or_else(|| ApiError::NotConfigured("Stripe is not configured".into()))
}

// ============================================================================
// Customers
// ============================================================================

/// Create the owner's processor customer, or return the existing one.
pub async fn create_customer(
    auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<OwnerBody>,
) -> Result<Json<Customer>, ApiError> {
    let customer = billable(&state)?
        .create_or_fetch_customer(&body.owner)
        .await?;

    tracing::info!(
        service = %auth.service_name,
        owner_id = %body.owner.id,
        customer = ?customer.processor_id,
        "Customer ready"
    );
    Ok(Json(customer))
}

/// Push the owner's email and name to the processor.
pub async fn update_customer(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<OwnerBody>,
) -> Result<Json<Customer>, ApiError> {
    let customer = billable(&state)?.update_customer(&body.owner).await?;
    Ok(Json(customer))
}

// ============================================================================
// Charges
// ============================================================================

/// Charge a saved payment method.
pub async fn create_charge(
    auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithOwner<ChargeRequest>>,
) -> Result<(StatusCode, Json<Charge>), ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        owner_id = %body.owner.id,
        amount = body.request.amount,
        "Charging owner"
    );
    let charge = billable(&state)?
        .charge(&body.owner, &body.request)
        .await?;
    Ok((StatusCode::CREATED, Json(charge)))
}

/// A payment intent, for the page where the customer confirms it.
pub async fn get_payment(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let payment = billable(&state)?.payment(&payment_intent_id).await?;
    Ok(Json(payment))
}

/// Refund a charge, fully or partially.
pub async fn refund_charge(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(charge_id): Path<String>,
    OptionalJson(body): OptionalJson<RefundBody>,
) -> Result<Json<Charge>, ApiError> {
    let charge = billable(&state)?.refund(&charge_id, body.amount).await?;
    Ok(Json(charge))
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Subscribe the owner to a price.
pub async fn create_subscription(
    auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithOwner<SubscribeRequest>>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    let subscription = billable(&state)?
        .create_subscription(&body.owner, &body.request)
        .await?;

    tracing::info!(
        service = %auth.service_name,
        owner_id = %body.owner.id,
        subscription = %subscription.processor_id,
        status = ?subscription.status,
        "Subscription created"
    );
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// Cancel a subscription at period end (default) or now.
pub async fn cancel_subscription(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(subscription_id): Path<String>,
    OptionalJson(body): OptionalJson<CancelBody>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = billable(&state)?
        .cancel_subscription(&subscription_id, body.mode)
        .await?;
    Ok(Json(subscription))
}

/// Undo a cancellation during the grace period.
pub async fn resume_subscription(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = billable(&state)?
        .resume_subscription(&subscription_id)
        .await?;
    Ok(Json(subscription))
}

// ============================================================================
// Payment methods
// ============================================================================

/// Attach a payment method collected client-side.
pub async fn attach_payment_method(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithOwner<AttachPaymentMethodRequest>>,
) -> Result<Json<PaymentMethod>, ApiError> {
    let payment_method = billable(&state)?
        .attach_payment_method(&body.owner, &body.request)
        .await?;
    Ok(Json(payment_method))
}

/// Detach a saved payment method.
pub async fn detach_payment_method(
    auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(payment_method_id): Path<String>,
) -> Result<Json<PaymentMethod>, ApiError> {
    let payment_method = billable(&state)?
        .detach_payment_method(&payment_method_id)
        .await?;

    tracing::info!(
        service = %auth.service_name,
        payment_method = %payment_method_id,
        "Payment method detached"
    );
    Ok(Json(payment_method))
}

/// Start collecting a payment method for off-session use.
pub async fn create_setup_intent(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<OwnerBody>,
) -> Result<Json<SetupIntentResult>, ApiError> {
    let intent = billable(&state)?.create_setup_intent(&body.owner).await?;
    Ok(Json(intent))
}

// ============================================================================
// Hosted pages
// ============================================================================

/// Create a Checkout session.
pub async fn create_checkout_session(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithOwner<CheckoutRequest>>,
) -> Result<Json<SessionLink>, ApiError> {
    let session = billable(&state)?
        .create_checkout_session(&body.owner, &body.request)
        .await?;
    Ok(Json(session))
}

/// Create a billing portal session.
pub async fn create_billing_portal_session(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithOwner<PortalRequest>>,
) -> Result<Json<SessionLink>, ApiError> {
    let session = billable(&state)?
        .create_billing_portal_session(&body.owner, &body.request)
        .await?;
    Ok(Json(session))
}

// ============================================================================
// Local records
// ============================================================================

fn owner_customer(state: &AppState, owner_id: &str) -> Result<Customer, ApiError> {
    let owner_id: OwnerId = owner_id.parse()?;
    state
        .store
        .find_customer_by_owner(&owner_id, Processor::Stripe)?
        .ok_or_else(|| ApiError::NotFound(format!("no customer for owner {owner_id}")))
}

/// The owner's subscriptions.
pub async fn list_subscriptions(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<ListResponse<Subscription>>, ApiError> {
    let customer = owner_customer(&state, &owner_id)?;
    let data = state.store.list_subscriptions(&customer.id)?;
    Ok(Json(ListResponse { data }))
}

/// The owner's charges.
pub async fn list_charges(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<ListResponse<Charge>>, ApiError> {
    let customer = owner_customer(&state, &owner_id)?;
    let data = state.store.list_charges(&customer.id)?;
    Ok(Json(ListResponse { data }))
}

/// The owner's saved payment methods.
pub async fn list_payment_methods(
    _auth: ServiceAuth,
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<ListResponse<PaymentMethod>>, ApiError> {
    let customer = owner_customer(&state, &owner_id)?;
    let data = state.store.list_payment_methods(&customer.id)?;
    Ok(Json(ListResponse { data }))
}
