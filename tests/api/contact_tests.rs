//! Contact API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_request_accept_flow() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;

    let created = app
        .server
        .post("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .json(&json!({ "email": "bob@example.com" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let contact: Value = created.json();
    assert_eq!(contact["status"], "pending");
    assert_eq!(contact["nickname"], "Bob");
    let contact_id = contact["id"].as_str().unwrap().to_string();

    let pending: Value = app
        .server
        .get("/api/v1/contacts/requests")
        .authorization_bearer(&bob.token)
        .await
        .json();
    assert_eq!(pending[0]["requester"]["id"], alice.id.as_str());

    app.server
        .post(&format!("/api/v1/contacts/{contact_id}/accept"))
        .authorization_bearer(&alice.token)
        .expect_failure()
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let accepted = app
        .server
        .post(&format!("/api/v1/contacts/{contact_id}/accept"))
        .authorization_bearer(&bob.token)
        .await;
    accepted.assert_status_ok();
    assert_eq!(accepted.json::<Value>()["status"], "accepted");

    let alice_contacts: Value = app
        .server
        .get("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .await
        .json();
    assert_eq!(alice_contacts[0]["user"]["id"], bob.id.as_str());
}

#[tokio::test]
async fn test_add_contact_errors() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    app.sign_in("bob").await;

    app.server
        .post("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .json(&json!({ "email": "nobody@example.com" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .post("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .json(&json!({ "email": "alice@example.com" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .json(&json!({ "email": "not-an-email" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .json(&json!({ "email": "bob@example.com" }))
        .await
        .assert_status(StatusCode::CREATED);
    app.server
        .post("/api/v1/contacts")
        .authorization_bearer(&alice.token)
        .json(&json!({ "email": "bob@example.com" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::CONFLICT);
}
