//! `Mailer`: renders notices from templates and locale tables and hands them
//! to a `Transport`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tera::Context;

use billable_core::Money;

use crate::attachments::{Attachment, ReceiptRenderer};
use crate::config::MailerConfig;
use crate::error::Result;
use crate::locale::Locales;
use crate::notice::{
    ActionRequiredNotice, NoticeKind, PaymentFailedNotice, ReceiptNotice, Recipient,
    RefundNotice, RenewalNotice, TrialEndingNotice,
};
use crate::notifier::Notifier;
use crate::templates::Templates;
use crate::transport::{Email, Transport};

const DATE_FORMAT: &str = "%B %-d, %Y";

fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Template-driven notifier.
pub struct Mailer {
    config: MailerConfig,
    locales: Locales,
    templates: Arc<Templates>,
    transport: Arc<dyn Transport>,
    renderer: Option<Arc<dyn ReceiptRenderer>>,
}

/// A notice before rendering: its kind, recipient, locale variables and
/// template context.
struct Draft<'a> {
    kind: NoticeKind,
    recipient: &'a Recipient,
    vars: Vec<(&'static str, String)>,
    context: Context,
    attachments: Vec<Attachment>,
}

impl<'a> Draft<'a> {
    fn new(kind: NoticeKind, recipient: &'a Recipient) -> Self {
        Self {
            kind,
            recipient,
            vars: Vec::new(),
            context: Context::new(),
            attachments: Vec::new(),
        }
    }

    /// Set a value usable both in templates and in `%{..}` placeholders.
    fn var(mut self, key: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.context.insert(key, &value);
        self.vars.push((key, value));
        self
    }

    fn opt(mut self, key: &'static str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.var(key, value),
            None => {
                self.context.insert(key, &None::<String>);
                self
            }
        }
    }
}

impl Mailer {
    /// Create a mailer with the bundled templates and locales.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a bundled
    /// template or locale table fails to load.
    pub fn new(config: MailerConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            locales: Locales::builtin()?,
            templates: Arc::new(Templates::builtin()?),
            transport,
            renderer: None,
        })
    }

    /// Attach receipt documents produced by `renderer`.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn ReceiptRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the locale tables.
    #[must_use]
    pub fn with_locales(mut self, locales: Locales) -> Self {
        self.locales = locales;
        self
    }

    /// Replace the templates.
    #[must_use]
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// The shared template set (for building an `HtmlReceiptRenderer`).
    #[must_use]
    pub fn templates(&self) -> Arc<Templates> {
        Arc::clone(&self.templates)
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &MailerConfig {
        &self.config
    }

    /// Build the message for a draft without sending it.
    fn compose(&self, draft: Draft<'_>) -> Result<Email> {
        let Draft {
            kind,
            recipient,
            mut vars,
            mut context,
            attachments,
        } = draft;

        let locale = recipient
            .locale
            .as_deref()
            .unwrap_or(&self.config.default_locale);

        vars.push(("application", self.config.business_name.clone()));
        let borrowed: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let subject = self
            .locales
            .translate(locale, &format!("{kind}.subject"), &borrowed);
        let intro = self
            .locales
            .translate(locale, &format!("{kind}.intro"), &borrowed);
        let greeting = match recipient.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => self.locales.translate(locale, "greeting", &[("name", name)]),
            None => self.locales.translate(locale, "greeting_anonymous", &[]),
        };

        context.insert("subject", &subject);
        context.insert("greeting", &greeting);
        context.insert("intro", &intro);
        context.insert("application", &self.config.business_name);
        context.insert("business_address", &self.config.business_address);
        context.insert("support_email", &self.config.support_email);

        let body = self.templates.render_notice(kind, &context)?;

        Ok(Email {
            from: self.config.from_header(),
            to: vec![recipient.address()],
            reply_to: self.config.reply_to.clone(),
            subject,
            html: body.html,
            text: body.text,
            attachments,
        })
    }

    async fn deliver(&self, draft: Draft<'_>) -> Result<bool> {
        let kind = draft.kind;
        let email = self.compose(draft)?;
        self.transport.send(&email).await?;
        tracing::info!(
            notice = %kind,
            to = ?email.to,
            attachments = email.attachments.len(),
            "Sent billing notice"
        );
        Ok(true)
    }

    fn enabled(&self, kind: NoticeKind) -> bool {
        let enabled = self.config.toggles.enabled(kind);
        if !enabled {
            tracing::debug!(notice = %kind, "Notice disabled, not sending");
        }
        enabled
    }
}

fn money(amount: Option<&Money>) -> Option<String> {
    amount.map(ToString::to_string)
}

#[async_trait]
impl Notifier for Mailer {
    async fn receipt(&self, notice: &ReceiptNotice) -> Result<bool> {
        if !self.enabled(NoticeKind::Receipt) {
            return Ok(false);
        }
        let charge = &notice.charge;

        let mut draft = Draft::new(NoticeKind::Receipt, &notice.recipient)
            .var("amount", charge.money().to_string())
            .var("date", format_date(charge.created_at))
            .var("charge_id", charge.processor_id.clone())
            .opt("payment_method", charge.payment_method_description())
            .opt("description", charge.description.clone())
            .opt("receipt_url", charge.receipt_url.clone());

        if let Some(renderer) = &self.renderer {
            draft
                .attachments
                .extend(renderer.receipt(charge, &notice.recipient)?);
        }

        self.deliver(draft).await
    }

    async fn refund(&self, notice: &RefundNotice) -> Result<bool> {
        if !self.enabled(NoticeKind::Refund) {
            return Ok(false);
        }
        let charge = &notice.charge;

        let mut draft = Draft::new(NoticeKind::Refund, &notice.recipient)
            .var("amount", charge.money().to_string())
            .var("refunded_amount", charge.refunded_money().to_string())
            .var("date", format_date(charge.created_at))
            .var("charge_id", charge.processor_id.clone())
            .var(
                "payment_method",
                charge
                    .payment_method_description()
                    .unwrap_or_else(|| "payment method".to_string()),
            );
        let remaining = (!charge.is_fully_refunded())
            .then(|| Money::new(charge.refundable_amount(), &charge.currency).to_string());
        draft = draft.opt("remaining_amount", remaining);

        if let Some(renderer) = &self.renderer {
            draft
                .attachments
                .extend(renderer.refund(charge, &notice.recipient)?);
        }

        self.deliver(draft).await
    }

    async fn subscription_renewing(&self, notice: &RenewalNotice) -> Result<bool> {
        if !self.enabled(NoticeKind::SubscriptionRenewing) {
            return Ok(false);
        }
        let draft = Draft::new(NoticeKind::SubscriptionRenewing, &notice.recipient)
            .var("plan", notice.plan.clone())
            .var("date", format_date(notice.renews_at))
            .var("subscription_id", notice.subscription_id.clone())
            .opt("amount", money(notice.amount.as_ref()));
        self.deliver(draft).await
    }

    async fn payment_action_required(&self, notice: &ActionRequiredNotice) -> Result<bool> {
        if !self.enabled(NoticeKind::PaymentActionRequired) {
            return Ok(false);
        }
        let draft = Draft::new(NoticeKind::PaymentActionRequired, &notice.recipient)
            .var("payment_url", notice.payment_url.clone())
            .var("payment_intent_id", notice.payment_intent_id.clone())
            .opt("subscription_id", notice.subscription_id.clone())
            .opt("amount", money(notice.amount.as_ref()));
        self.deliver(draft).await
    }

    async fn payment_failed(&self, notice: &PaymentFailedNotice) -> Result<bool> {
        if !self.enabled(NoticeKind::PaymentFailed) {
            return Ok(false);
        }
        let draft = Draft::new(NoticeKind::PaymentFailed, &notice.recipient)
            .opt("amount", money(notice.amount.as_ref()))
            .opt("invoice_url", notice.invoice_url.clone())
            .opt("next_attempt", notice.next_attempt_at.map(format_date));
        self.deliver(draft).await
    }

    async fn subscription_trial_will_end(&self, notice: &TrialEndingNotice) -> Result<bool> {
        if !self.enabled(NoticeKind::SubscriptionTrialWillEnd) {
            return Ok(false);
        }
        let draft = Draft::new(NoticeKind::SubscriptionTrialWillEnd, &notice.recipient)
            .var("date", format_date(notice.trial_ends_at))
            .var("subscription_id", notice.subscription_id.clone());
        self.deliver(draft).await
    }
}
