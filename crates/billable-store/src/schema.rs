//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Customer records, keyed by `customer_id` (ULID).
    pub const CUSTOMERS: &str = "customers";

    /// Index: customer by owner, keyed by `owner_id || processor`.
    pub const CUSTOMERS_BY_OWNER: &str = "customers_by_owner";

    /// Index: customer by remote id, keyed by processor id string.
    pub const CUSTOMERS_BY_PROCESSOR_ID: &str = "customers_by_processor_id";

    /// Payment method records, keyed by `payment_method_id`.
    pub const PAYMENT_METHODS: &str = "payment_methods";

    /// Index: payment method by remote id.
    pub const PAYMENT_METHODS_BY_PROCESSOR_ID: &str = "payment_methods_by_processor_id";

    /// Index: payment methods by customer, keyed by `customer_id || payment_method_id`.
    /// Value is empty (index only).
    pub const PAYMENT_METHODS_BY_CUSTOMER: &str = "payment_methods_by_customer";

    /// Subscription records, keyed by `subscription_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Index: subscription by remote id.
    pub const SUBSCRIPTIONS_BY_PROCESSOR_ID: &str = "subscriptions_by_processor_id";

    /// Index: subscriptions by customer, keyed by `customer_id || subscription_id`.
    pub const SUBSCRIPTIONS_BY_CUSTOMER: &str = "subscriptions_by_customer";

    /// Charge records, keyed by `charge_id`.
    pub const CHARGES: &str = "charges";

    /// Index: charge by remote id.
    pub const CHARGES_BY_PROCESSOR_ID: &str = "charges_by_processor_id";

    /// Index: charges by customer, keyed by `customer_id || charge_id`.
    pub const CHARGES_BY_CUSTOMER: &str = "charges_by_customer";

    /// Processed webhook events for idempotency, keyed by event id.
    pub const WEBHOOK_EVENTS: &str = "webhook_events";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CUSTOMERS,
        cf::CUSTOMERS_BY_OWNER,
        cf::CUSTOMERS_BY_PROCESSOR_ID,
        cf::PAYMENT_METHODS,
        cf::PAYMENT_METHODS_BY_PROCESSOR_ID,
        cf::PAYMENT_METHODS_BY_CUSTOMER,
        cf::SUBSCRIPTIONS,
        cf::SUBSCRIPTIONS_BY_PROCESSOR_ID,
        cf::SUBSCRIPTIONS_BY_CUSTOMER,
        cf::CHARGES,
        cf::CHARGES_BY_PROCESSOR_ID,
        cf::CHARGES_BY_CUSTOMER,
        cf::WEBHOOK_EVENTS,
    ]
}
