//! Report API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_file_report() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;

    let response = app
        .server
        .post("/api/v1/reports")
        .authorization_bearer(&alice.token)
        .json(&json!({ "reported_user_id": bob.id, "reason": "spam" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["status"], "pending");
    assert_eq!(app.store.report_count(), 1);
}

#[tokio::test]
async fn test_report_rejections() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    app.server
        .post("/api/v1/reports")
        .authorization_bearer(&alice.token)
        .json(&json!({ "reported_user_id": alice.id, "reason": "me" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/reports")
        .authorization_bearer(&alice.token)
        .json(&json!({ "reported_user_id": "424242", "reason": "ghost" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .post("/api/v1/reports")
        .authorization_bearer(&alice.token)
        .json(&json!({ "reported_user_id": "424242", "reason": "" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(app.store.report_count(), 0);
}
