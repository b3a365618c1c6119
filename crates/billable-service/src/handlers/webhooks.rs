//! Stripe webhook intake.
//!
//! Events are verified, de-duplicated by event id, mirrored into the store
//! and, where a customer should hear about them, turned into billing notices.
//! A failed notice is logged and does not fail the webhook.
//!
//! The event id is claimed before any side effect, so concurrent deliveries
//! of one event are handled once. A claim whose handling fails is released
//! and Stripe's retry processes the event again.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use billable_core::{Customer, Money};
use billable_mailer::{
    ActionRequiredNotice, Notifier, PaymentFailedNotice, ReceiptNotice, Recipient, RefundNotice,
    RenewalNotice, TrialEndingNotice,
};
use billable_store::{ProcessedEvent, RocksStore, Store, StoreError};
use billable_stripe::sync::timestamp;
use billable_stripe::types::{self, WebhookEvent};
use billable_stripe::Billable;

use crate::error::ApiError;
use crate::state::AppState;

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
    /// Set when the event was already handled.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let billable = state
        .billable
        .as_deref()
        .ok_or_else(|| ApiError::NotConfigured("Stripe is not configured".into()))?;

    let event = if billable.client().has_webhook_secret() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        billable
            .verify_webhook(&body, signature, Utc::now().timestamp())
            .map_err(|e| {
                tracing::warn!(error = %e, "Invalid Stripe webhook signature");
                ApiError::BadRequest("Invalid webhook signature".into())
            })?
    } else {
        tracing::warn!("Stripe webhook secret not configured - skipping signature verification");
        serde_json::from_str::<WebhookEvent>(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        livemode = event.livemode,
        "Received Stripe webhook"
    );

    match state
        .store
        .put_webhook_event(&ProcessedEvent::new(&event.id, &event.event_type))
    {
        Ok(()) => {}
        Err(StoreError::DuplicateEvent { .. }) => {
            tracing::info!(event_id = %event.id, "Stripe event already processed");
            return Ok(Json(WebhookResponse {
                received: true,
                duplicate: true,
            }));
        }
        Err(e) => return Err(e.into()),
    }

    let handler = EventHandler {
        store: state.store.as_ref(),
        billable,
        notifier: state.notifier.as_deref(),
    };
    if let Err(e) = handler.handle(&event).await {
        if let Err(release) = state.store.delete_webhook_event(&event.id) {
            tracing::error!(event_id = %event.id, error = %release, "Failed to release Stripe event");
        }
        return Err(e);
    }

    Ok(Json(WebhookResponse {
        received: true,
        duplicate: false,
    }))
}

struct EventHandler<'a> {
    store: &'a RocksStore,
    billable: &'a Billable<RocksStore>,
    notifier: Option<&'a dyn Notifier>,
}

impl EventHandler<'_> {
    async fn handle(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        match event.event_type.as_str() {
            "charge.succeeded" => self.charge_succeeded(event).await,
            "charge.refunded" => self.charge_refunded(event).await,
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => {
                self.billable.sync_subscription(&decode(event)?)?;
                Ok(())
            }
            "customer.subscription.trial_will_end" => self.trial_will_end(event).await,
            "invoice.upcoming" => self.invoice_upcoming(event).await,
            "invoice.payment_action_required" => self.payment_action_required(event).await,
            "invoice.payment_failed" => self.payment_failed(event).await,
            "payment_method.attached"
            | "payment_method.updated"
            | "payment_method.card_automatically_updated"
            | "payment_method.automatically_updated" => {
                self.billable.sync_payment_method(&decode(event)?)?;
                Ok(())
            }
            "payment_method.detached" => {
                let remote: types::PaymentMethod = decode(event)?;
                self.billable.delete_payment_method(&remote.id)?;
                Ok(())
            }
            "customer.updated" => {
                self.billable
                    .sync_default_payment_method(&decode(event)?)
                    .await?;
                Ok(())
            }
            other => {
                tracing::debug!(event_type = %other, "Unhandled Stripe event");
                Ok(())
            }
        }
    }

    async fn charge_succeeded(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        let Some(charge) = self.billable.sync_charge(&decode(event)?).await? else {
            return Ok(());
        };
        let (Some(notifier), Some(customer)) = (self.notifier, self.customer(&charge.customer_id)?)
        else {
            return Ok(());
        };

        let notice = ReceiptNotice {
            recipient: Recipient::from(&customer),
            charge,
        };
        report("receipt", notifier.receipt(&notice).await);
        Ok(())
    }

    async fn charge_refunded(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        let Some(charge) = self.billable.sync_charge(&decode(event)?).await? else {
            return Ok(());
        };
        let (Some(notifier), Some(customer)) = (self.notifier, self.customer(&charge.customer_id)?)
        else {
            return Ok(());
        };

        let notice = RefundNotice {
            recipient: Recipient::from(&customer),
            charge,
        };
        report("refund", notifier.refund(&notice).await);
        Ok(())
    }

    async fn trial_will_end(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        let Some(subscription) = self.billable.sync_subscription(&decode(event)?)? else {
            return Ok(());
        };
        let Some(trial_ends_at) = subscription.trial_ends_at else {
            return Ok(());
        };
        let (Some(notifier), Some(customer)) =
            (self.notifier, self.customer(&subscription.customer_id)?)
        else {
            return Ok(());
        };

        let notice = TrialEndingNotice {
            recipient: Recipient::from(&customer),
            subscription_id: subscription.processor_id,
            trial_ends_at,
        };
        report(
            "subscription_trial_will_end",
            notifier.subscription_trial_will_end(&notice).await,
        );
        Ok(())
    }

    async fn invoice_upcoming(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        let invoice: types::Invoice = decode(event)?;
        let Some(subscription) = invoice
            .subscription
            .as_deref()
            .map(|id| self.store.find_subscription_by_processor_id(id))
            .transpose()?
            .flatten()
        else {
            return Ok(());
        };

        if subscription.cancel_at_period_end || subscription.ends_at.is_some() {
            tracing::debug!(
                subscription = %subscription.processor_id,
                "Subscription set to cancel, skipping renewal notice"
            );
            return Ok(());
        }

        let Some(renews_at) = invoice
            .next_payment_attempt
            .and_then(timestamp)
            .or(subscription.current_period_end)
        else {
            return Ok(());
        };
        let (Some(notifier), Some(customer)) =
            (self.notifier, self.customer(&subscription.customer_id)?)
        else {
            return Ok(());
        };

        let notice = RenewalNotice {
            recipient: Recipient::from(&customer),
            subscription_id: subscription.processor_id,
            plan: subscription.processor_plan,
            renews_at,
            amount: invoice_amount(&invoice),
        };
        report(
            "subscription_renewing",
            notifier.subscription_renewing(&notice).await,
        );
        Ok(())
    }

    async fn payment_action_required(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        let invoice: types::Invoice = decode(event)?;
        let Some(payment_intent_id) = invoice.payment_intent.as_ref().map(|pi| pi.id().to_string())
        else {
            return Ok(());
        };
        let (Some(notifier), Some(customer)) = (
            self.notifier,
            self.remote_customer(invoice.customer.as_deref())?,
        ) else {
            return Ok(());
        };

        let notice = ActionRequiredNotice {
            recipient: Recipient::from(&customer),
            payment_url: self.billable.urls().payment_url(&payment_intent_id),
            payment_intent_id,
            amount: invoice_amount(&invoice),
            subscription_id: invoice.subscription.clone(),
        };
        report(
            "payment_action_required",
            notifier.payment_action_required(&notice).await,
        );
        Ok(())
    }

    async fn payment_failed(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        let invoice: types::Invoice = decode(event)?;
        let (Some(notifier), Some(customer)) = (
            self.notifier,
            self.remote_customer(invoice.customer.as_deref())?,
        ) else {
            return Ok(());
        };

        let notice = PaymentFailedNotice {
            recipient: Recipient::from(&customer),
            amount: invoice_amount(&invoice),
            invoice_url: invoice.hosted_invoice_url.clone(),
            next_attempt_at: invoice.next_payment_attempt.and_then(timestamp),
        };
        report("payment_failed", notifier.payment_failed(&notice).await);
        Ok(())
    }

    fn customer(&self, id: &billable_core::CustomerId) -> Result<Option<Customer>, ApiError> {
        Ok(self.store.get_customer(id)?)
    }

    fn remote_customer(&self, processor_id: Option<&str>) -> Result<Option<Customer>, ApiError> {
        match processor_id {
            Some(id) => Ok(self.store.find_customer_by_processor_id(id)?),
            None => Ok(None),
        }
    }
}

fn decode<T: DeserializeOwned>(event: &WebhookEvent) -> Result<T, ApiError> {
    event.object().map_err(|e| {
        ApiError::BadRequest(format!("invalid {} payload: {e}", event.event_type))
    })
}

fn invoice_amount(invoice: &types::Invoice) -> Option<Money> {
    (!invoice.currency.is_empty()).then(|| Money::new(invoice.amount_due, &invoice.currency))
}

fn report(notice: &str, result: billable_mailer::Result<bool>) {
    match result {
        Ok(true) => tracing::debug!(notice = %notice, "Billing notice sent"),
        Ok(false) => {}
        Err(e) => tracing::error!(notice = %notice, error = %e, "Failed to send billing notice"),
    }
}
