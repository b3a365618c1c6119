//! Billing notices for billable.
//!
//! - [`Notifier`]: one method per notice (receipt, refund, renewal reminder,
//!   action required, payment failed, trial ending)
//! - [`Mailer`]: the email implementation. Subjects and intros come from
//!   locale tables, bodies from embedded tera templates, and receipts can
//!   carry an attached document from a [`ReceiptRenderer`]
//! - [`Transport`]: delivery through Resend, the log, or memory

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod attachments;
pub mod config;
pub mod error;
pub mod locale;
pub mod mailer;
pub mod notice;
pub mod notifier;
pub mod templates;
pub mod transport;

pub use attachments::{Attachment, HtmlReceiptRenderer, ReceiptRenderer};
pub use config::{EmailToggles, MailerConfig};
pub use error::{MailerError, Result};
pub use locale::Locales;
pub use mailer::Mailer;
pub use notice::{
    ActionRequiredNotice, NoticeKind, PaymentFailedNotice, ReceiptNotice, Recipient,
    RefundNotice, RenewalNotice, TrialEndingNotice,
};
pub use notifier::Notifier;
pub use templates::Templates;
pub use transport::{Email, LogTransport, MemoryTransport, ResendTransport, Transport};
