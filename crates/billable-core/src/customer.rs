//! Processor customer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CustomerId, OwnerId};

/// Payment processors a record can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Processor {
    /// Stripe.
    Stripe,
}

impl Processor {
    /// Stable name used in keys and metadata.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
        }
    }
}

/// Links an owner to a customer object at the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Local record id.
    pub id: CustomerId,

    /// The owner this customer bills.
    pub owner_id: OwnerId,

    /// Host application type of the owner.
    pub owner_type: String,

    /// Which processor holds the remote customer.
    pub processor: Processor,

    /// Remote customer id (`cus_...`), once created.
    pub processor_id: Option<String>,

    /// Email last pushed to the processor.
    pub email: String,

    /// Name last pushed to the processor.
    pub name: Option<String>,

    /// Preferred locale for notices.
    pub locale: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Create a record for an owner that has no remote customer yet.
    #[must_use]
    pub fn new(owner: &crate::Owner, processor: Processor) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::generate(),
            owner_id: owner.id,
            owner_type: owner.owner_type.clone(),
            processor,
            processor_id: None,
            email: owner.email.clone(),
            name: owner.name.clone(),
            locale: owner.locale.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a remote customer has been created.
    #[must_use]
    pub fn has_processor_id(&self) -> bool {
        self.processor_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Locale to render notices in.
    #[must_use]
    pub fn locale_or_default(&self) -> &str {
        self.locale.as_deref().unwrap_or(crate::owner::DEFAULT_LOCALE)
    }
}
