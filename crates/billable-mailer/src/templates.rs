//! Embedded email templates.

use tera::{Context, Tera};

use crate::error::Result;
use crate::notice::NoticeKind;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("layout.txt", include_str!("../templates/layout.txt")),
    ("receipt.html", include_str!("../templates/receipt.html")),
    ("receipt.txt", include_str!("../templates/receipt.txt")),
    ("refund.html", include_str!("../templates/refund.html")),
    ("refund.txt", include_str!("../templates/refund.txt")),
    (
        "subscription_renewing.html",
        include_str!("../templates/subscription_renewing.html"),
    ),
    (
        "subscription_renewing.txt",
        include_str!("../templates/subscription_renewing.txt"),
    ),
    (
        "payment_action_required.html",
        include_str!("../templates/payment_action_required.html"),
    ),
    (
        "payment_action_required.txt",
        include_str!("../templates/payment_action_required.txt"),
    ),
    ("payment_failed.html", include_str!("../templates/payment_failed.html")),
    ("payment_failed.txt", include_str!("../templates/payment_failed.txt")),
    (
        "subscription_trial_will_end.html",
        include_str!("../templates/subscription_trial_will_end.html"),
    ),
    (
        "subscription_trial_will_end.txt",
        include_str!("../templates/subscription_trial_will_end.txt"),
    ),
    ("receipt_document.html", include_str!("../templates/receipt_document.html")),
];

/// A rendered notice body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    /// HTML part.
    pub html: String,
    /// Plain text part.
    pub text: String,
}

/// The template set.
#[derive(Debug, Clone)]
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Load the bundled templates.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Template` if a bundled template fails to parse.
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    /// Replace or add a template. Names ending in `.html` are autoescaped.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Template` if the template fails to parse.
    pub fn override_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.tera.add_raw_template(name, source)?;
        Ok(())
    }

    /// Render both parts of a notice.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Template` if rendering fails.
    pub fn render_notice(&self, kind: NoticeKind, context: &Context) -> Result<RenderedBody> {
        Ok(RenderedBody {
            html: self.render(&format!("{kind}.html"), context)?,
            text: self.render(&format!("{kind}.txt"), context)?,
        })
    }

    /// Render a single template.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Template` if rendering fails.
    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(name, context)?)
    }
}
