//! Common test utilities for API testing with mocks.
//!
//! Builds an in-process router over a real SQLite store and mock ticket
//! source, generator and sink, so the HTTP surface can be exercised without
//! network access or signing certificates.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tailorpass_core::testing::{MockArtifactSink, MockPassGenerator, MockTicketSource};
use tailorpass_core::{load_config_from_str, Channel, SqliteProductionStore, SyncOrchestrator};
use tailorpass_server::api::create_router;
use tailorpass_server::state::AppState;

/// Re-export fixtures for test convenience
pub use tailorpass_core::testing::fixtures;

/// API key configured for the fixture; must never appear in responses.
pub const API_KEY: &str = "sk_test_secret";

/// Test fixture with controllable mocks behind the real router.
pub struct TestFixture {
    pub router: Router,
    pub source: Arc<MockTicketSource>,
    pub generator: Arc<MockPassGenerator>,
    pub sink: Arc<MockArtifactSink>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = load_config_from_str(&format!(
            r#"
[database]
path = "{}"

[ticket_source]
base_url = "https://api.tickettailor.test/v1"
api_key = "{}"
event_id = "ev_1"

[sync]
enabled = false
run_timeout_secs = 30
channels = ["apple_wallet"]
"#,
            db_path.display(),
            API_KEY
        ))
        .expect("Failed to parse test config");

        let source = Arc::new(MockTicketSource::new());
        let generator = Arc::new(MockPassGenerator::new(Channel::AppleWallet));
        let sink = Arc::new(MockArtifactSink::new());
        let store = Arc::new(
            SqliteProductionStore::new(&db_path, std::time::Duration::from_secs(5))
                .expect("Failed to open store"),
        );

        let orchestrator = Arc::new(
            SyncOrchestrator::new(source.clone(), store, sink.clone(), "valid")
                .with_generator(generator.clone()),
        );

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = create_router(state);

        Self {
            router,
            source,
            generator,
            sink,
            orchestrator,
            temp_dir,
        }
    }

    /// Serve `ids` as a single page of issued tickets.
    pub async fn with_tickets(self, ids: &[&str]) -> Self {
        let page = ids.iter().map(|id| fixtures::issued_ticket(id)).collect();
        self.source.set_pages(vec![page]).await;
        self
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with an optional JSON body.
    pub async fn post(&self, path: &str, body: Option<Value>) -> TestResponse {
        self.request("POST", path, body).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }
}
