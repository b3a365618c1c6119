//! Mapping Stripe objects onto local records.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use billable_core::{
    Charge, ChargeId, CustomerId, PaymentMethod, Subscription, SubscriptionId,
    SubscriptionStatus, DEFAULT_SUBSCRIPTION_NAME,
};

use crate::types;

/// Metadata key holding the local subscription name.
pub const SUBSCRIPTION_NAME_KEY: &str = "pay_name";

/// Convert a Unix timestamp.
#[must_use]
pub fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

fn opt_timestamp(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(timestamp)
}

/// Copy card or bank details onto a stored payment method.
pub fn apply_payment_method(record: &mut PaymentMethod, remote: &types::PaymentMethod) {
    record.method_type = Some(remote.method_type.clone());
    record.brand = None;
    record.last4 = None;
    record.exp_month = None;
    record.exp_year = None;
    record.bank = None;

    if let Some(card) = &remote.card {
        record.brand.clone_from(&card.brand);
        record.last4.clone_from(&card.last4);
        record.exp_month = card.exp_month;
        record.exp_year = card.exp_year;
    } else if let Some(bank) = remote.us_bank_account.as_ref().or(remote.sepa_debit.as_ref()) {
        record.bank.clone_from(&bank.bank_name);
        record.last4.clone_from(&bank.last4);
    }

    record.updated_at = Utc::now();
}

/// Build a subscription record from a Stripe subscription.
///
/// The name comes from the `pay_name` metadata, then `existing_name`, then
/// the default. `upsert_subscription` keeps the stored id and creation time.
#[must_use]
pub fn subscription_record(
    customer_id: CustomerId,
    remote: &types::Subscription,
    existing_name: Option<&str>,
) -> Subscription {
    let item = remote.items.data.first();
    let status = SubscriptionStatus::from_processor(&remote.status).unwrap_or_else(|| {
        tracing::warn!(
            subscription = %remote.id,
            status = %remote.status,
            "Unknown subscription status, treating as incomplete"
        );
        SubscriptionStatus::Incomplete
    });

    let name = remote
        .metadata
        .get(SUBSCRIPTION_NAME_KEY)
        .map(String::as_str)
        .or(existing_name)
        .unwrap_or(DEFAULT_SUBSCRIPTION_NAME)
        .to_string();

    let now = Utc::now();
    Subscription {
        id: SubscriptionId::generate(),
        customer_id,
        name,
        processor_id: remote.id.clone(),
        processor_plan: item.map(|i| i.price.id.clone()).unwrap_or_default(),
        quantity: item.and_then(|i| i.quantity).unwrap_or(1),
        status,
        trial_ends_at: opt_timestamp(remote.trial_end),
        ends_at: ends_at(remote),
        current_period_start: opt_timestamp(remote.current_period_start),
        current_period_end: opt_timestamp(remote.current_period_end),
        cancel_at_period_end: remote.cancel_at_period_end,
        metadata: metadata_value(&remote.metadata),
        created_at: now,
        updated_at: now,
    }
}

fn ends_at(remote: &types::Subscription) -> Option<DateTime<Utc>> {
    if let Some(ended) = opt_timestamp(remote.ended_at) {
        return Some(ended);
    }
    if remote.cancel_at_period_end {
        return opt_timestamp(remote.current_period_end);
    }
    opt_timestamp(remote.cancel_at)
}

fn metadata_value(metadata: &HashMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

/// Build a charge record from a Stripe charge.
#[must_use]
pub fn charge_record(
    customer_id: CustomerId,
    subscription_id: Option<SubscriptionId>,
    remote: &types::Charge,
) -> Charge {
    let details = remote.payment_method_details.as_ref();
    let card = details.and_then(|d| d.card.as_ref());
    let now = Utc::now();

    Charge {
        id: ChargeId::generate(),
        customer_id,
        subscription_id,
        processor_id: remote.id.clone(),
        payment_intent_id: remote.payment_intent.clone(),
        amount: remote.amount,
        amount_refunded: remote.amount_refunded,
        currency: remote.currency.to_lowercase(),
        payment_method_type: details.map(|d| d.method_type.clone()),
        brand: card.and_then(|c| c.brand.clone()),
        last4: card.and_then(|c| c.last4.clone()),
        receipt_url: remote.receipt_url.clone(),
        description: remote.description.clone(),
        created_at: timestamp(remote.created).unwrap_or(now),
        updated_at: now,
    }
}
