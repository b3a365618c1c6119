//! Stripe integration for billable.
//!
//! - [`StripeClient`]: typed wrapper over the Stripe REST API (form-encoded
//!   requests, basic auth, pinned API version, decoded error bodies)
//! - [`Billable`]: owner-level operations (customers, charges, subscriptions,
//!   payment methods, hosted pages) mirrored into a [`billable_store::Store`]
//! - [`webhook`]: `Stripe-Signature` verification
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use billable_core::{Owner, OwnerId, UrlBuilder};
//! use billable_store::RocksStore;
//! use billable_stripe::{Billable, ChargeRequest, StripeClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StripeClient::new("sk_test_...", None)?;
//! let store = Arc::new(RocksStore::open("/tmp/billable-db")?);
//! let billable = Billable::new(client, store, UrlBuilder::new("https://app.example.com"));
//!
//! let owner = Owner::new(OwnerId::generate(), "jane@example.com");
//! let charge = billable.charge(&owner, &ChargeRequest::new(1500)).await?;
//! println!("charged {}", charge.money());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod billable;
pub mod client;
pub mod error;
pub mod params;
pub mod sync;
pub mod types;
pub mod webhook;

pub use billable::{
    AttachPaymentMethodRequest, Billable, CancelMode, ChargeRequest, CheckoutMode,
    CheckoutRequest, Payment, PortalRequest, SessionLink, SetupIntentResult, SubscribeRequest,
};
pub use client::{StripeClient, API_VERSION};
pub use error::StripeError;
pub use params::CheckoutLineItem;
pub use types::WebhookEvent;
