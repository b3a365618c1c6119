//! Documents attached to receipt and refund notices.

use std::sync::Arc;

use tera::Context;

use billable_core::Charge;

use crate::error::Result;
use crate::notice::Recipient;
use crate::templates::Templates;

/// A file attached to an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Raw bytes.
    pub content: Vec<u8>,
}

/// Produces receipt documents. Returning `None` sends the notice without one.
pub trait ReceiptRenderer: Send + Sync {
    /// Document for a successful charge.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be produced.
    fn receipt(&self, charge: &Charge, recipient: &Recipient) -> Result<Option<Attachment>>;

    /// Document for a refund.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be produced.
    fn refund(&self, charge: &Charge, recipient: &Recipient) -> Result<Option<Attachment>> {
        let _ = (charge, recipient);
        Ok(None)
    }
}

/// Renders an HTML receipt from the bundled `receipt_document.html` template.
pub struct HtmlReceiptRenderer {
    templates: Arc<Templates>,
    business_name: String,
    business_address: Option<String>,
}

impl HtmlReceiptRenderer {
    /// Create a renderer using the given business details.
    pub fn new(
        templates: Arc<Templates>,
        business_name: impl Into<String>,
        business_address: Option<String>,
    ) -> Self {
        Self {
            templates,
            business_name: business_name.into(),
            business_address,
        }
    }

    fn render(&self, charge: &Charge, recipient: &Recipient, refund: bool) -> Result<Attachment> {
        let mut context = Context::new();
        context.insert("application", &self.business_name);
        context.insert("business_address", &self.business_address);
        context.insert("recipient", &recipient.address());
        context.insert("date", &charge.created_at.format("%B %-d, %Y").to_string());
        context.insert("charge_id", &charge.processor_id);
        context.insert("description", &charge.description);
        context.insert("payment_method", &charge.payment_method_description());
        context.insert("amount", &charge.money().to_string());
        context.insert(
            "refunded_amount",
            &refund.then(|| charge.refunded_money().to_string()),
        );

        let html = self.templates.render("receipt_document.html", &context)?;
        let prefix = if refund { "refund" } else { "receipt" };
        Ok(Attachment {
            filename: format!("{prefix}-{}.html", charge.processor_id),
            content_type: "text/html".to_string(),
            content: html.into_bytes(),
        })
    }
}

impl ReceiptRenderer for HtmlReceiptRenderer {
    fn receipt(&self, charge: &Charge, recipient: &Recipient) -> Result<Option<Attachment>> {
        self.render(charge, recipient, false).map(Some)
    }

    fn refund(&self, charge: &Charge, recipient: &Recipient) -> Result<Option<Attachment>> {
        self.render(charge, recipient, true).map(Some)
    }
}
