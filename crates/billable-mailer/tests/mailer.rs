//! `Mailer` rendering and delivery through an in-memory transport.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use billable_core::{Charge, ChargeId, CustomerId, Money};
use billable_mailer::{
    ActionRequiredNotice, Attachment, EmailToggles, HtmlReceiptRenderer, Mailer, MailerConfig,
    MailerError, MemoryTransport, Notifier, PaymentFailedNotice, ReceiptNotice, ReceiptRenderer,
    Recipient, RefundNotice, RenewalNotice, TrialEndingNotice,
};

fn config() -> MailerConfig {
    MailerConfig {
        from_email: "billing@acme.test".into(),
        from_name: "Acme Billing".into(),
        business_name: "Acme".into(),
        business_address: Some("1 Main St, Springfield".into()),
        support_email: Some("help@acme.test".into()),
        ..MailerConfig::default()
    }
}

fn mailer(config: MailerConfig) -> (Mailer, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let mailer = Mailer::new(config, transport.clone()).expect("Failed to build mailer");
    (mailer, transport)
}

fn recipient() -> Recipient {
    Recipient {
        email: "jane@example.com".into(),
        name: Some("Jane".into()),
        locale: None,
    }
}

fn charge() -> Charge {
    let created = Utc.with_ymd_and_hms(2030, 5, 1, 9, 30, 0).unwrap();
    Charge {
        id: ChargeId::generate(),
        customer_id: CustomerId::generate(),
        subscription_id: None,
        processor_id: "ch_123".into(),
        payment_intent_id: Some("pi_123".into()),
        amount: 1999,
        amount_refunded: 500,
        currency: "usd".into(),
        payment_method_type: Some("card".into()),
        brand: Some("visa".into()),
        last4: Some("4242".into()),
        receipt_url: Some("https://pay.stripe.com/receipts/ch_123".into()),
        description: None,
        created_at: created,
        updated_at: created,
    }
}

#[tokio::test]
async fn receipt_renders_subject_body_and_footer() {
    let (mailer, transport) = mailer(config());
    let sent = mailer
        .receipt(&ReceiptNotice {
            recipient: recipient(),
            charge: charge(),
        })
        .await
        .unwrap();
    assert!(sent);

    let emails = transport.sent();
    assert_eq!(emails.len(), 1);
    let email = &emails[0];
    assert_eq!(email.subject, "[Acme] Payment receipt");
    assert_eq!(email.from, "Acme Billing <billing@acme.test>");
    assert_eq!(email.to, ["Jane <jane@example.com>"]);
    assert!(email.text.starts_with("Hi Jane,"));
    assert!(email.text.contains("Thanks for your payment of $19.99."));
    assert!(email.text.contains("Payment method: Visa ending in 4242"));
    assert!(email.text.contains("May 1, 2030"));
    assert!(email.text.contains("1 Main St, Springfield"));
    assert!(email.html.contains("ch_123"));
    assert!(email.attachments.is_empty());
}

#[tokio::test]
async fn receipt_attaches_rendered_document_when_configured() {
    let transport = Arc::new(MemoryTransport::new());
    let mailer = Mailer::new(config(), transport.clone()).unwrap();
    let renderer = HtmlReceiptRenderer::new(mailer.templates(), "Acme", None);
    let mailer = mailer.with_renderer(Arc::new(renderer));

    mailer
        .receipt(&ReceiptNotice {
            recipient: recipient(),
            charge: charge(),
        })
        .await
        .unwrap();

    let email = &transport.sent()[0];
    assert_eq!(email.attachments.len(), 1);
    assert_eq!(email.attachments[0].filename, "receipt-ch_123.html");
}

struct SkipSmallCharges;

impl ReceiptRenderer for SkipSmallCharges {
    fn receipt(
        &self,
        charge: &Charge,
        _recipient: &Recipient,
    ) -> billable_mailer::Result<Option<Attachment>> {
        Ok((charge.amount >= 10_000).then(|| Attachment {
            filename: "receipt.pdf".into(),
            content_type: "application/pdf".into(),
            content: vec![0x25, 0x50, 0x44, 0x46],
        }))
    }
}

#[tokio::test]
async fn renderer_can_decline_to_attach() {
    let transport = Arc::new(MemoryTransport::new());
    let mailer = Mailer::new(config(), transport.clone())
        .unwrap()
        .with_renderer(Arc::new(SkipSmallCharges));

    let notice = RefundNotice {
        recipient: recipient(),
        charge: charge(),
    };
    assert!(mailer.refund(&notice).await.unwrap());
    mailer
        .receipt(&ReceiptNotice {
            recipient: recipient(),
            charge: charge(),
        })
        .await
        .unwrap();

    for email in transport.sent() {
        assert!(email.attachments.is_empty());
    }
}

#[tokio::test]
async fn refund_mentions_refunded_amount() {
    let (mailer, transport) = mailer(config());
    mailer
        .refund(&RefundNotice {
            recipient: recipient(),
            charge: charge(),
        })
        .await
        .unwrap();

    let email = &transport.sent()[0];
    assert_eq!(email.subject, "[Acme] Payment refunded");
    assert!(email.text.contains("We refunded $5.00 to your Visa ending in 4242."));
    assert!(email.text.contains("Original charge: $19.99 on May 1, 2030"));
    assert!(email.text.contains("Still on the charge: $14.99"));
}

#[tokio::test]
async fn full_refund_omits_remaining_amount() {
    let (mailer, transport) = mailer(config());
    let mut charge = charge();
    charge.amount_refunded = charge.amount;
    mailer
        .refund(&RefundNotice {
            recipient: recipient(),
            charge,
        })
        .await
        .unwrap();

    let email = &transport.sent()[0];
    assert!(email.text.contains("We refunded $19.99"));
    assert!(!email.text.contains("Still on the charge"));
}

#[tokio::test]
async fn disabled_notice_is_not_sent() {
    let mut config = config();
    config.toggles = EmailToggles {
        subscription_renewing: false,
        ..EmailToggles::default()
    };
    let (mailer, transport) = mailer(config);

    let sent = mailer
        .subscription_renewing(&RenewalNotice {
            recipient: recipient(),
            subscription_id: "sub_1".into(),
            plan: "price_pro".into(),
            renews_at: Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap(),
            amount: Some(Money::new(4900, "usd")),
        })
        .await
        .unwrap();

    assert!(!sent);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn recipient_locale_selects_subject() {
    let (mailer, transport) = mailer(config());
    let mut recipient = recipient();
    recipient.locale = Some("es".into());

    mailer
        .payment_action_required(&ActionRequiredNotice {
            recipient: recipient.clone(),
            payment_intent_id: "pi_1".into(),
            payment_url: "https://app.example.com/pay/payments/pi_1".into(),
            amount: Some(Money::new(2500, "eur")),
            subscription_id: None,
        })
        .await
        .unwrap();

    mailer
        .subscription_trial_will_end(&TrialEndingNotice {
            recipient,
            subscription_id: "sub_1".into(),
            trial_ends_at: Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap(),
        })
        .await
        .unwrap();

    let emails = transport.sent();
    assert_eq!(emails[0].subject, "[Acme] Confirma tu pago");
    assert!(emails[0].text.starts_with("Hola Jane,"));
    assert!(emails[0]
        .text
        .contains("Confirm payment: https://app.example.com/pay/payments/pi_1"));
    // No Spanish trial table: falls back to English.
    assert_eq!(emails[1].subject, "[Acme] Your trial is ending soon");
    assert!(emails[1].text.contains("June 1, 2030"));
}

#[tokio::test]
async fn payment_failed_omits_missing_details() {
    let (mailer, transport) = mailer(config());
    mailer
        .payment_failed(&PaymentFailedNotice {
            recipient: Recipient::new("jane@example.com"),
            amount: None,
            invoice_url: Some("https://invoice.stripe.com/i/1".into()),
            next_attempt_at: None,
        })
        .await
        .unwrap();

    let email = &transport.sent()[0];
    assert!(email.text.starts_with("Hi,"));
    assert!(!email.text.contains("Amount due"));
    assert!(!email.text.contains("try again"));
    assert!(email
        .text
        .contains("Update your payment details: https://invoice.stripe.com/i/1"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = MailerConfig {
        from_email: "nope".into(),
        ..MailerConfig::default()
    };
    let result = Mailer::new(config, Arc::new(MemoryTransport::new()));
    assert!(matches!(result, Err(MailerError::Configuration(_))));
}
