//! Email delivery.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::attachments::Attachment;
use crate::error::{MailerError, Result};

/// A message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// From header.
    pub from: String,
    /// Recipients.
    pub to: Vec<String>,
    /// Reply-To header.
    pub reply_to: Option<String>,
    /// Subject.
    pub subject: String,
    /// HTML part.
    pub html: String,
    /// Plain text part.
    pub text: String,
    /// Attachments.
    pub attachments: Vec<Attachment>,
}

/// Delivers rendered email.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message.
    async fn send(&self, email: &Email) -> Result<()>;
}

// =============================================================================
// Resend
// =============================================================================

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment<'a>>,
}

#[derive(Serialize)]
struct ResendAttachment<'a> {
    filename: &'a str,
    content: String,
    content_type: &'a str,
}

#[derive(Deserialize)]
struct ResendError {
    #[serde(default)]
    message: String,
}

/// Sends through the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ResendTransport {
    /// Resend API base URL.
    pub const BASE_URL: &'static str = "https://api.resend.com";

    /// Create a transport.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Configuration` if the key is missing or does not
    /// look like a Resend key, or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(MailerError::Configuration(
                "Resend API key is required".into(),
            ));
        }
        if !api_key.starts_with("re_") {
            return Err(MailerError::Configuration(
                "Resend API key must start with re_".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MailerError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the transport at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Transport for ResendTransport {
    async fn send(&self, email: &Email) -> Result<()> {
        let body = ResendRequest {
            from: &email.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
            reply_to: email.reply_to.as_deref(),
            attachments: email
                .attachments
                .iter()
                .map(|a| ResendAttachment {
                    filename: &a.filename,
                    content: STANDARD.encode(&a.content),
                    content_type: &a.content_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(subject = %email.subject, "Email sent via Resend");
            return Ok(());
        }

        let message = response
            .json::<ResendError>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));

        Err(MailerError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

// =============================================================================
// Log / memory
// =============================================================================

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            to = ?email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email delivery disabled, logging instead"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory, for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Email>>,
}

impl MemoryTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, email: &Email) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| MailerError::Configuration("memory transport poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> Email {
        Email {
            from: "Acme <billing@acme.test>".into(),
            to: vec!["jane@example.com".into()],
            reply_to: None,
            subject: "Receipt".into(),
            html: "<p>hi</p>".into(),
            text: "hi".into(),
            attachments: vec![Attachment {
                filename: "receipt.html".into(),
                content_type: "text/html".into(),
                content: b"hello".to_vec(),
            }],
        }
    }

    #[test]
    fn resend_key_prefix_is_checked() {
        assert!(ResendTransport::new("").is_err());
        assert!(ResendTransport::new("sk_live_x").is_err());
        assert!(ResendTransport::new("re_123").is_ok());
    }

    #[tokio::test]
    async fn resend_posts_json_with_base64_attachments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "to": ["jane@example.com"],
                "subject": "Receipt",
                "attachments": [{ "filename": "receipt.html", "content": "aGVsbG8=" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ResendTransport::new("re_test")
            .unwrap()
            .with_base_url(server.uri());
        transport.send(&email()).await.unwrap();
    }

    #[tokio::test]
    async fn resend_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({ "name": "validation_error", "message": "Invalid `to` field" })),
            )
            .mount(&server)
            .await;

        let transport = ResendTransport::new("re_test")
            .unwrap()
            .with_base_url(server.uri());
        let err = transport.send(&email()).await.unwrap_err();
        assert!(matches!(
            err,
            MailerError::Rejected { status: 422, ref message } if message == "Invalid `to` field"
        ));
    }

    #[tokio::test]
    async fn memory_transport_records_messages() {
        let transport = MemoryTransport::new();
        transport.send(&email()).await.unwrap();
        LogTransport.send(&email()).await.unwrap();
        assert_eq!(transport.sent().len(), 1);
    }
}
