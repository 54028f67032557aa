//! HTTP API tests against an in-process router.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio_test::assert_ok;

use common::{TestFixture, API_KEY};
use tailorpass_core::{CheckAction, SourceError};

// =============================================================================
// Health and config
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["ticket_source"]["event_id"], "ev_1");
    assert_eq!(response.body["ticket_source"]["api_key_configured"], true);
    assert!(!response.text.contains(API_KEY));
}

// =============================================================================
// Sync runs
// =============================================================================

#[tokio::test]
async fn test_last_report_missing_before_first_run() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/sync/last").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_trigger_sync_returns_report() {
    let fixture = TestFixture::new().await.with_tickets(&["it_1", "it_2"]).await;

    let response = fixture.post("/api/v1/sync", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["outcome"], "succeeded");
    assert_eq!(response.body["trigger"], "manual");
    assert_eq!(response.body["fetched"], 2);
    assert_eq!(response.body["artifacts"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["artifacts"][0]["ticket_id"], "it_1");
    assert_eq!(fixture.sink.stored().await.len(), 2);

    let last = fixture.get("/api/v1/sync/last").await;
    assert_eq!(last.status, StatusCode::OK);
    assert_eq!(last.body["id"], response.body["id"]);
}

#[tokio::test]
async fn test_second_sync_skips_produced_tickets() {
    let fixture = TestFixture::new().await.with_tickets(&["it_1", "it_2"]).await;

    fixture.post("/api/v1/sync", None).await;
    let response = fixture.post("/api/v1/sync", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["skipped"], 2);
    assert!(response.body["artifacts"].as_array().unwrap().is_empty());
    assert_eq!(fixture.generator.generated().await, vec!["it_1", "it_2"]);
}

#[tokio::test]
async fn test_failed_run_is_reported() {
    let fixture = TestFixture::new().await;
    fixture
        .source
        .set_next_fetch_error(SourceError::Api {
            status: 503,
            body: "maintenance".to_string(),
        })
        .await;

    let response = fixture.post("/api/v1/sync", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["outcome"], "failed");
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("HTTP 503"));
}

#[tokio::test]
async fn test_overlapping_sync_conflicts() {
    let fixture = TestFixture::new().await.with_tickets(&["it_1"]).await;
    fixture.generator.set_delay(Duration::from_millis(500)).await;

    let router = fixture.router.clone();
    let first = tokio::spawn(async move {
        use tower::ServiceExt;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/v1/sync")
            .body(axum::body::Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap().status()
    });

    for _ in 0..100 {
        if fixture.orchestrator.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(fixture.orchestrator.is_running());

    let second = fixture.post("/api/v1/sync", None).await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    assert_eq!(first.await.unwrap(), StatusCode::OK);
}

// =============================================================================
// Pass state
// =============================================================================

#[tokio::test]
async fn test_list_passes_after_sync() {
    let fixture = TestFixture::new().await.with_tickets(&["it_2", "it_1"]).await;
    fixture.post("/api/v1/sync", None).await;

    let response = fixture.get("/api/v1/passes?channel=apple_wallet").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["passes"][0]["ticket_tailor_id"], "it_1");
    assert_eq!(response.body["passes"][0]["status"], "produced");
    assert_eq!(response.body["passes"][0]["purchaser_email"], "nala@example.com");
}

#[tokio::test]
async fn test_pass_stats_by_channel() {
    let fixture = TestFixture::new().await.with_tickets(&["it_1", "it_2", "it_3"]).await;
    fixture.post("/api/v1/sync", None).await;

    let response = fixture.get("/api/v1/passes/stats").await;

    assert_eq!(response.status, StatusCode::OK);
    let channels = response.body["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0]["channel"], "apple_wallet");
    assert_eq!(channels[0]["produced"], 3);
    assert_eq!(channels[0]["sent"], 0);
    assert_eq!(channels[0]["total"], 3);
}

#[tokio::test]
async fn test_unknown_channel_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/passes?channel=paper").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("unknown channel"));
}

// =============================================================================
// Check-ins
// =============================================================================

#[tokio::test]
async fn test_check_in_and_out() {
    let fixture = TestFixture::new().await;

    let checked_in = fixture.post("/api/v1/tickets/it_1/check-in", None).await;
    assert_eq!(checked_in.status, StatusCode::OK);
    assert_eq!(checked_in.body["issued_ticket_id"], "it_1");
    assert_eq!(checked_in.body["quantity"], 1);

    let checked_out = fixture.post("/api/v1/tickets/it_1/check-out", None).await;
    assert_eq!(checked_out.status, StatusCode::OK);
    assert_eq!(checked_out.body["quantity"], -1);

    assert_eq!(
        fixture.source.check_in_calls().await,
        vec![
            ("it_1".to_string(), CheckAction::CheckIn),
            ("it_1".to_string(), CheckAction::CheckOut),
        ]
    );
}

#[tokio::test]
async fn test_rejected_check_in_is_bad_gateway() {
    let fixture = TestFixture::new().await;
    fixture.source.fail_check_in_for("it_9").await;

    let response = fixture.post("/api/v1/tickets/it_9/check-in", None).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(response.body["error"].as_str().unwrap().contains("422"));
}

#[tokio::test]
async fn test_sweep_continues_past_failures() {
    let fixture = TestFixture::new().await.with_tickets(&["it_1", "it_2", "it_3"]).await;
    fixture.source.fail_check_in_for("it_2").await;

    let response = fixture
        .post("/api/v1/check-ins/sweep", Some(json!({ "action": "check_in" })))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["action"], "check_in");
    assert_eq!(response.body["attempted"], 3);
    assert_eq!(response.body["succeeded"], 2);
    assert_eq!(response.body["skipped"], 0);
    assert_eq!(response.body["failures"][0]["ticket_id"], "it_2");
    assert_eq!(fixture.source.fetch_calls().await[0].0, "valid");
}

#[tokio::test]
async fn test_sweep_rejects_unknown_action() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/check-ins/sweep", Some(json!({ "action": "teleport" })))
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(fixture.source.check_in_calls().await.is_empty());
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_exposes_pass_counts() {
    let fixture = TestFixture::new().await.with_tickets(&["it_1"]).await;
    let report = fixture.post("/api/v1/sync", None).await;
    assert_ok!(serde_json::from_value::<tailorpass_core::RunReport>(report.body));

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .text
        .contains(r#"tailorpass_passes{channel="apple_wallet",status="produced"}"#));
    assert!(response.text.contains("tailorpass_sync_runs_total"));
    assert!(response.text.contains("tailorpass_http_requests_total"));
}
