//! The billable owner as seen by this crate.

use serde::{Deserialize, Serialize};

use crate::OwnerId;

/// Locale used when an owner has none configured.
pub const DEFAULT_LOCALE: &str = "en";

/// A billable entity from the host application (a user, a team, ...).
///
/// Only the fields needed to create a processor customer and address
/// notices are carried here; the host application stays the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    /// Host application identifier.
    pub id: OwnerId,
    /// Host application type name, stored as processor metadata (e.g. "User").
    #[serde(default = "default_owner_type")]
    pub owner_type: String,
    /// Billing email address.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Preferred locale for notices.
    #[serde(default)]
    pub locale: Option<String>,
}

fn default_owner_type() -> String {
    "User".to_string()
}

impl Owner {
    /// Create an owner of type `User`.
    #[must_use]
    pub fn new(id: OwnerId, email: impl Into<String>) -> Self {
        Self {
            id,
            owner_type: default_owner_type(),
            email: email.into(),
            name: None,
            locale: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the preferred locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Check the email before it is sent to the processor.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Validation` if the email is blank or lacks an `@`.
    pub fn validate(&self) -> crate::Result<()> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(crate::BillingError::Validation("email is required".into()));
        }
        if !email.contains('@') {
            return Err(crate::BillingError::Validation(format!(
                "invalid email: {email}"
            )));
        }
        Ok(())
    }
}
