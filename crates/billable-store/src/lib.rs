//! `RocksDB` storage layer for billable.
//!
//! This crate persists the records mirrored from the payment processor:
//! customers, payment methods, subscriptions and charges, plus the ids of
//! processed webhook events.
//!
//! # Architecture
//!
//! Every record family has a primary column family keyed by its local ULID,
//! an index keyed by the processor's id (`cus_...`, `pm_...`, `sub_...`,
//! `ch_...`), and, for customer-owned records, a `customer_id || record_id`
//! index for listing.
//!
//! # Example
//!
//! ```no_run
//! use billable_core::{Customer, Owner, OwnerId, Processor};
//! use billable_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/billable-db").unwrap();
//!
//! let owner = Owner::new(OwnerId::generate(), "jane@example.com");
//! let customer = Customer::new(&owner, Processor::Stripe);
//! store.put_customer(&customer).unwrap();
//!
//! let found = store.find_customer_by_owner(&owner.id, Processor::Stripe).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use billable_core::{
    Charge, Customer, CustomerId, OwnerId, PaymentMethod, Processor, Subscription,
};

/// A webhook event that has been handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    /// Processor event id (`evt_...`).
    pub event_id: String,
    /// Event type, e.g. `charge.succeeded`.
    pub event_type: String,
    /// When it was handled.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEvent {
    /// Record an event as handled now.
    #[must_use]
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
        }
    }
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Insert or update a customer record and its owner/processor indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_customer(&self, customer: &Customer) -> Result<()>;

    /// Get a customer by local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_customer(&self, customer_id: &CustomerId) -> Result<Option<Customer>>;

    /// Find the customer record of an owner at a processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_customer_by_owner(
        &self,
        owner_id: &OwnerId,
        processor: Processor,
    ) -> Result<Option<Customer>>;

    /// Find a customer by its remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_customer_by_processor_id(&self, processor_id: &str) -> Result<Option<Customer>>;

    // =========================================================================
    // Payment Method Operations
    // =========================================================================

    /// Return the stored payment method for a remote id, creating an empty
    /// record for the customer if none exists.
    ///
    /// A method previously stored under another customer is moved to this one
    /// and loses its default flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_or_create_payment_method(
        &self,
        customer_id: &CustomerId,
        processor_id: &str,
    ) -> Result<PaymentMethod>;

    /// Update a payment method record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_payment_method(&self, payment_method: &PaymentMethod) -> Result<()>;

    /// Find a payment method by its remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_payment_method_by_processor_id(
        &self,
        processor_id: &str,
    ) -> Result<Option<PaymentMethod>>;

    /// Make one payment method the customer's only default.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the customer has no such payment method.
    fn mark_default_payment_method(
        &self,
        customer_id: &CustomerId,
        processor_id: &str,
    ) -> Result<PaymentMethod>;

    /// Clear the customer's default flag. Returns the method that lost it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn clear_default_payment_method(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<PaymentMethod>>;

    /// Get the customer's default payment method.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn default_payment_method(&self, customer_id: &CustomerId) -> Result<Option<PaymentMethod>>;

    /// List the customer's payment methods, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_payment_methods(&self, customer_id: &CustomerId) -> Result<Vec<PaymentMethod>>;

    /// Delete a payment method by remote id. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_payment_method(&self, processor_id: &str) -> Result<bool>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Insert or update a subscription, matched by remote id.
    ///
    /// An existing record keeps its local id and `created_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn upsert_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    /// Find a subscription by its remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_subscription_by_processor_id(&self, processor_id: &str)
        -> Result<Option<Subscription>>;

    /// List the customer's subscriptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_subscriptions(&self, customer_id: &CustomerId) -> Result<Vec<Subscription>>;

    /// Find the newest subscription of the customer with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_subscription(
        &self,
        customer_id: &CustomerId,
        name: &str,
    ) -> Result<Option<Subscription>> {
        Ok(self
            .list_subscriptions(customer_id)?
            .into_iter()
            .find(|s| s.name == name))
    }

    // =========================================================================
    // Charge Operations
    // =========================================================================

    /// Insert or update a charge, matched by remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn upsert_charge(&self, charge: &Charge) -> Result<Charge>;

    /// Find a charge by its remote id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_charge_by_processor_id(&self, processor_id: &str) -> Result<Option<Charge>>;

    /// List the customer's charges, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_charges(&self, customer_id: &CustomerId) -> Result<Vec<Charge>>;

    // =========================================================================
    // Webhook Event Operations (for idempotency)
    // =========================================================================

    /// Check if a webhook event has already been processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_webhook_event(&self, event_id: &str) -> Result<bool>;

    /// Record a webhook event as processed.
    ///
    /// The check and the write happen under one lock, so of two concurrent
    /// calls for the same event exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateEvent` if the event was already recorded.
    fn put_webhook_event(&self, event: &ProcessedEvent) -> Result<()>;

    /// Forget a recorded webhook event so a redelivery is handled again.
    /// Returns whether it was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_webhook_event(&self, event_id: &str) -> Result<bool>;
}
