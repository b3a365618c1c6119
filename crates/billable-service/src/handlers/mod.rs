//! HTTP handlers.

pub mod billing;
pub mod health;
pub mod webhooks;
