//! Common test utilities for billable-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use billable_core::OwnerId;
use billable_mailer::{Mailer, MailerConfig, MemoryTransport};
use billable_service::{create_router, AppState, ServiceConfig};
use billable_store::RocksStore;

/// Test harness: the service backed by a fresh database, a mocked Stripe API
/// and an in-memory mail transport.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Mocked Stripe API.
    pub stripe: MockServer,
    /// The store the service writes to.
    pub store: Arc<RocksStore>,
    /// Delivered notices.
    pub mail: Arc<MemoryTransport>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// The service API key for `/v1` requests.
    pub service_api_key: String,
    /// Owner used in requests.
    pub owner_id: OwnerId,
}

impl TestHarness {
    /// Harness that accepts unsigned webhooks.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Harness that verifies webhook signatures with `secret`.
    pub async fn with_webhook_secret(secret: &str) -> Self {
        Self::build(Some(secret.to_string())).await
    }

    async fn build(webhook_secret: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));
        let stripe = MockServer::start().await;

        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(service_api_key.clone()),
            stripe_api_key: Some("sk_test_123".into()),
            stripe_webhook_secret: webhook_secret,
            stripe_api_base: Some(stripe.uri()),
            app_root_url: "https://app.example.com".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            mailer: MailerConfig {
                from_email: "billing@acme.test".into(),
                business_name: "Acme".into(),
                ..MailerConfig::default()
            },
            resend_api_key: None,
            attach_receipts: false,
        };

        let mail = Arc::new(MemoryTransport::new());
        let mailer = Mailer::new(config.mailer.clone(), mail.clone()).expect("Failed to build mailer");

        let state = AppState::new(Arc::clone(&store), config).with_notifier(Arc::new(mailer));
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            stripe,
            store,
            mail,
            _temp_dir: temp_dir,
            service_api_key,
            owner_id: OwnerId::generate(),
        }
    }

    /// The owner as sent in request bodies.
    pub fn owner(&self) -> Value {
        json!({ "id": self.owner_id.to_string(), "email": "jane@example.com", "name": "Jane" })
    }

    /// Respond to `verb route` on the mocked Stripe API.
    pub async fn mock(&self, verb: &str, route: &str, status: u16, body: Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.stripe)
            .await;
    }

    /// Create the owner's customer (`cus_1`) through the API.
    pub async fn create_customer(&self) {
        self.mock("POST", "/customers", 200, json!({ "id": "cus_1", "email": "jane@example.com" }))
            .await;
        self.mock("GET", "/customers/cus_1", 200, json!({ "id": "cus_1", "email": "jane@example.com" }))
            .await;

        self.server
            .post("/v1/customers")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&json!({ "owner": self.owner() }))
            .await
            .assert_status_ok();
    }

    /// Post a webhook event without a signature.
    pub async fn webhook(&self, event: &Value) -> axum_test::TestResponse {
        self.server
            .post("/webhooks/stripe")
            .text(event.to_string())
            .await
    }
}

/// A Stripe event envelope.
pub fn event(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": 1_700_000_000,
        "livemode": false,
        "data": { "object": object }
    })
}
