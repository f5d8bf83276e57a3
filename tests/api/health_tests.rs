//! Health Check Tests

use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_liveness_and_basic_health() {
    let app = TestApp::new();

    let live: Value = app.server.get("/health/live").await.json();
    assert_eq!(live["status"], "alive");

    let health: Value = app.server.get("/health").await.json();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_reports_gateway_sessions() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let _session = app.connect(&alice, "ready-check").await;

    let response = app.server.get("/health/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["gateway"]["sessions"], 1);
    assert!(body["checks"].get("redis").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_text_format() {
    let app = TestApp::new();
    app.server.get("/health").await;

    let metrics = app.server.get("/metrics").await;
    metrics.assert_status_ok();
    assert!(metrics.text().contains("http_requests_total"));
}
