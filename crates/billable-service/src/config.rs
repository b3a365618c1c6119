//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use billable_mailer::{EmailToggles, MailerConfig, NoticeKind};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/billable").
    pub data_dir: String,

    /// Service API key for the `/v1` endpoints.
    pub service_api_key: Option<String>,

    /// Stripe secret key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Override for the Stripe API root.
    pub stripe_api_base: Option<String>,

    /// Root URL of the host application, used for redirects and notice links.
    pub app_root_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Sender, business details and notice switches.
    pub mailer: MailerConfig,

    /// Resend API key. Without it notices are logged instead of sent.
    pub resend_api_key: Option<String>,

    /// Attach an HTML receipt document to receipt and refund notices.
    pub attach_receipts: bool,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Resend secrets file structure.
#[derive(Debug, Deserialize)]
struct ResendSecrets {
    api_key: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();
        let defaults = Self::default();

        Self {
            listen_addr: env_or("LISTEN_ADDR", defaults.listen_addr),
            data_dir: env_or("DATA_DIR", defaults.data_dir),
            service_api_key: env_opt("SERVICE_API_KEY"),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_api_base: env_opt("STRIPE_API_BASE"),
            app_root_url: env_or("APP_ROOT_URL", defaults.app_root_url),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            mailer: mailer_from_env(),
            resend_api_key: load_resend_key(),
            attach_receipts: std::env::var("ATTACH_RECEIPTS")
                .is_ok_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: String) -> String {
    env_opt(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Mailer settings from `MAIL_*` and business variables.
fn mailer_from_env() -> MailerConfig {
    let defaults = MailerConfig::default();
    let mut toggles = EmailToggles::default();
    if let Some(disabled) = env_opt("DISABLED_NOTICES") {
        disable_notices(&mut toggles, &disabled);
    }

    MailerConfig {
        from_email: env_or("MAIL_FROM_EMAIL", defaults.from_email),
        from_name: env_or("MAIL_FROM_NAME", defaults.from_name),
        reply_to: env_opt("MAIL_REPLY_TO"),
        business_name: env_or("BUSINESS_NAME", defaults.business_name),
        business_address: env_opt("BUSINESS_ADDRESS"),
        support_email: env_opt("SUPPORT_EMAIL"),
        default_locale: env_or("DEFAULT_LOCALE", defaults.default_locale),
        toggles,
    }
}

/// Switch off the notices named in a comma separated list
/// (`receipt,subscription_renewing`). Unknown names are logged and ignored.
pub fn disable_notices(toggles: &mut EmailToggles, list: &str) {
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some(kind) = NoticeKind::ALL.iter().find(|k| k.as_str() == name) else {
            tracing::warn!(notice = %name, "Unknown notice in DISABLED_NOTICES");
            continue;
        };
        let flag = match kind {
            NoticeKind::Receipt => &mut toggles.receipt,
            NoticeKind::Refund => &mut toggles.refund,
            NoticeKind::SubscriptionRenewing => &mut toggles.subscription_renewing,
            NoticeKind::PaymentActionRequired => &mut toggles.payment_action_required,
            NoticeKind::PaymentFailed => &mut toggles.payment_failed,
            NoticeKind::SubscriptionTrialWillEnd => &mut toggles.subscription_trial_will_end,
        };
        *flag = false;
    }
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "billable/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        env_opt("STRIPE_API_KEY"),
        env_opt("STRIPE_WEBHOOK_SECRET"),
    )
}

/// Load the Resend key from file or environment.
fn load_resend_key() -> Option<String> {
    for path in [".secrets/resend.json", "../.secrets/resend.json"] {
        if let Ok(secrets) = load_secrets_file::<ResendSecrets>(path) {
            tracing::info!(path = %path, "Loaded Resend secrets from file");
            return Some(secrets.api_key);
        }
    }
    env_opt("RESEND_API_KEY")
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/billable".into(),
            service_api_key: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: None,
            app_root_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            mailer: MailerConfig::default(),
            resend_api_key: None,
            attach_receipts: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_notices_switches_off_named_kinds() {
        let mut toggles = EmailToggles::default();
        disable_notices(&mut toggles, "receipt, payment_failed,bogus,");

        assert!(!toggles.receipt);
        assert!(!toggles.payment_failed);
        assert!(toggles.refund);
        assert!(toggles.subscription_trial_will_end);
    }

    #[test]
    fn secrets_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stripe.json");
        std::fs::write(&path, r#"{"api_key":"sk_test_1","webhook_secret":"whsec_1"}"#).unwrap();

        let secrets: StripeSecrets = load_secrets_file(path.to_str().unwrap()).unwrap();
        assert_eq!(secrets.api_key, "sk_test_1");
        assert_eq!(secrets.webhook_secret.as_deref(), Some("whsec_1"));

        assert!(load_secrets_file::<StripeSecrets>("/nonexistent/stripe.json").is_err());
    }

    #[test]
    fn defaults_leave_integrations_off() {
        let config = ServiceConfig::default();
        assert!(config.stripe_api_key.is_none());
        assert!(config.resend_api_key.is_none());
        assert!(!config.attach_receipts);
        assert_eq!(config.cors_origins, ["*"]);
    }
}
