//! Core types for billable.
//!
//! This crate provides the local records mirrored from the payment processor:
//!
//! - **Identifiers**: `OwnerId`, `CustomerId`, `PaymentMethodId`, `SubscriptionId`, `ChargeId`
//! - **Records**: `Customer`, `PaymentMethod`, `Subscription`, `Charge`
//! - **Owner**: the host application's billable entity
//! - **Money**: minor-unit amounts with currency-aware formatting
//! - **URLs**: `UrlBuilder` for redirect and notice links
//! - **Errors**: `BillingError` and the normalized `ProcessorError`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod charge;
pub mod customer;
pub mod error;
pub mod ids;
pub mod money;
pub mod owner;
pub mod payment_method;
pub mod subscription;
pub mod urls;

pub use charge::Charge;
pub use customer::{Customer, Processor};
pub use error::{BillingError, ProcessorError, Result};
pub use ids::{ChargeId, CustomerId, IdError, OwnerId, PaymentMethodId, SubscriptionId};
pub use money::{Money, DEFAULT_CURRENCY};
pub use owner::{Owner, DEFAULT_LOCALE};
pub use payment_method::PaymentMethod;
pub use subscription::{Subscription, SubscriptionStatus, DEFAULT_SUBSCRIPTION_NAME};
pub use urls::UrlBuilder;
