//! Error types for the mailer.

/// Result type for mailer operations.
pub type Result<T> = std::result::Result<T, MailerError>;

/// Errors that can occur while rendering or delivering a notice.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// A template failed to parse or render.
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// HTTP request to the delivery provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The delivery provider rejected the message.
    #[error("delivery rejected ({status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// An attachment could not be produced.
    #[error("attachment error: {0}")]
    Attachment(String),

    /// Locale table could not be loaded.
    #[error("locale error: {0}")]
    Locale(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
