//! Application state.

use std::sync::Arc;

use billable_core::UrlBuilder;
use billable_mailer::{
    HtmlReceiptRenderer, LogTransport, Mailer, Notifier, ResendTransport, Transport,
};
use billable_store::RocksStore;
use billable_stripe::{Billable, StripeClient};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe-backed billing operations (optional).
    pub billable: Option<Arc<Billable<RocksStore>>>,

    /// Billing notices (optional).
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let billable = build_billable(&store, &config);
        if billable.is_none() {
            tracing::warn!("Stripe not configured - billing endpoints will not be available");
        }

        let notifier = build_mailer(&config).map(|mailer| Arc::new(mailer) as Arc<dyn Notifier>);

        Self {
            store,
            config,
            billable,
            notifier,
        }
    }

    /// Replace the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.billable.is_some()
    }

    /// Check if notices are sent.
    #[must_use]
    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }
}

fn build_billable(
    store: &Arc<RocksStore>,
    config: &ServiceConfig,
) -> Option<Arc<Billable<RocksStore>>> {
    let key = config.stripe_api_key.as_ref()?;

    let client = match StripeClient::new(key.clone(), config.stripe_webhook_secret.clone()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Stripe client");
            return None;
        }
    };
    let client = match &config.stripe_api_base {
        Some(base) => client.with_base_url(base.clone()),
        None => client,
    };

    if !client.has_webhook_secret() {
        tracing::warn!("Stripe webhook secret not configured - signatures will not be verified");
    }
    tracing::info!("Stripe integration enabled");

    Some(Arc::new(Billable::new(
        client,
        Arc::clone(store),
        UrlBuilder::new(config.app_root_url.clone()),
    )))
}

fn build_mailer(config: &ServiceConfig) -> Option<Mailer> {
    let transport: Arc<dyn Transport> = match config.resend_api_key.as_ref() {
        Some(key) => match ResendTransport::new(key.clone()) {
            Ok(transport) => {
                tracing::info!("Resend email delivery enabled");
                Arc::new(transport)
            }
            Err(e) => {
                tracing::error!(error = %e, "Invalid Resend configuration - logging notices instead");
                Arc::new(LogTransport)
            }
        },
        None => {
            tracing::warn!("Resend not configured - notices will be logged, not sent");
            Arc::new(LogTransport)
        }
    };

    let mailer = match Mailer::new(config.mailer.clone(), transport) {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create mailer - notices disabled");
            return None;
        }
    };

    if !config.attach_receipts {
        return Some(mailer);
    }
    let renderer = HtmlReceiptRenderer::new(
        mailer.templates(),
        config.mailer.business_name.clone(),
        config.mailer.business_address.clone(),
    );
    Some(mailer.with_renderer(Arc::new(renderer)))
}
