//! Billable HTTP API service.
//!
//! This crate exposes the Stripe-backed billing operations over HTTP:
//!
//! - Customers, charges and refunds
//! - Subscriptions (create, cancel, resume)
//! - Payment methods and setup intents
//! - Checkout and billing portal sessions
//! - Stripe webhooks, which keep local records in sync and send billing notices
//!
//! # Authentication
//!
//! `/v1` endpoints require the service API key in `X-API-Key`. Webhooks are
//! authenticated by their Stripe signature.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
