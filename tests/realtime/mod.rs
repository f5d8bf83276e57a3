//! Fan-out and presence through the assembled application state.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use spectr_server::application::dto::HistoryQuery;
use spectr_server::application::realtime::{ServerEvent, SubmitError, SubmitMessage};
use spectr_server::domain::MessageKind;

use crate::common::TestApp;

fn text(chat_id: i64, content: &str) -> SubmitMessage {
    SubmitMessage {
        chat_id,
        kind: MessageKind::Text,
        content: Some(content.to_string()),
        attachment_url: None,
    }
}

#[tokio::test]
async fn test_every_member_session_gets_one_push() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;
    let chat_id: i64 = app.create_chat(&alice, "group", &[&bob]).await.parse().unwrap();

    let mut alice_s = app.connect(&alice, "a1").await;
    let mut bob_s1 = app.connect(&bob, "b1").await;
    let mut bob_s2 = app.connect(&bob, "b2").await;
    let mut carol_s = app.connect(&carol, "c1").await;

    let sent = app.state.fanout.submit(alice.id(), text(chat_id, "hi")).await.unwrap();
    assert_eq!(app.store.message_count(chat_id), 1);

    for session in [&mut bob_s1, &mut bob_s2, &mut alice_s] {
        let pushes = session.drain("new_message");
        assert_eq!(pushes.len(), 1);
        match pushes[0].as_ref() {
            ServerEvent::NewMessage(message) => {
                assert_eq!(message.id, sent.id);
                assert_eq!(message.content.as_deref(), Some("hi"));
                assert_eq!(message.sender.id, alice.id);
                assert_eq!(message.sender.display_name, "Alice");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(carol_s.drain("new_message").is_empty());
}

#[tokio::test]
async fn test_non_member_submit_is_forbidden_and_not_persisted() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;
    let chat_id: i64 = app.create_chat(&alice, "group", &[&bob]).await.parse().unwrap();
    let mut bob_s = app.connect(&bob, "b1").await;

    let result = app.state.fanout.submit(carol.id(), text(chat_id, "hello?")).await;
    assert!(matches!(result, Err(SubmitError::Forbidden)));
    assert_eq!(app.store.message_count(chat_id), 0);
    assert!(bob_s.drain("new_message").is_empty());
}

#[tokio::test]
async fn test_unknown_chat_is_not_found() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    let result = app.state.fanout.submit(alice.id(), text(31337, "anyone?")).await;
    assert!(matches!(result, Err(SubmitError::ChatNotFound(31337))));
    assert_eq!(app.store.message_count(31337), 0);
}

#[tokio::test]
async fn test_ids_increase_and_sessions_see_submission_order() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let chat_id: i64 = app.create_chat(&alice, "group", &[&bob]).await.parse().unwrap();
    let mut bob_s = app.connect(&bob, "b1").await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let sent = app
            .state
            .fanout
            .submit(alice.id(), text(chat_id, &format!("m{i}")))
            .await
            .unwrap();
        ids.push(sent.id.parse::<i64>().unwrap());
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let received: Vec<i64> = bob_s
        .drain("new_message")
        .iter()
        .filter_map(|e| match e.as_ref() {
            ServerEvent::NewMessage(m) => m.id.parse().ok(),
            _ => None,
        })
        .collect();
    assert_eq!(received, ids);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_submissions_arrive_in_id_order() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;
    let busy_chat: i64 = app.create_chat(&alice, "group", &[&bob]).await.parse().unwrap();
    let quiet_chat: i64 = app.create_chat(&carol, "group", &[&bob]).await.parse().unwrap();
    let mut alice_s = app.connect(&alice, "a1").await;
    let mut bob_s = app.connect(&bob, "b1").await;

    let submissions: Vec<_> = (0..12)
        .map(|i| {
            let fanout = app.state.fanout.clone();
            let (sender, chat_id) = match i % 3 {
                0 => (alice.id(), busy_chat),
                1 => (bob.id(), busy_chat),
                _ => (carol.id(), quiet_chat),
            };
            tokio::spawn(async move { fanout.submit(sender, text(chat_id, &format!("m{i}"))).await })
        })
        .collect();

    let mut busy_ids = Vec::new();
    for result in futures::future::join_all(submissions).await {
        let sent = result.unwrap().unwrap();
        if sent.chat_id == busy_chat.to_string() {
            busy_ids.push(sent.id.parse::<i64>().unwrap());
        }
    }
    busy_ids.sort_unstable();
    assert_eq!(busy_ids.len(), 8);

    let bob_events = bob_s.drain("new_message");
    assert_eq!(message_ids(&bob_events, busy_chat), busy_ids);
    let bob_quiet = message_ids(&bob_events, quiet_chat);
    assert_eq!(bob_quiet.len(), 4);
    assert!(bob_quiet.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(message_ids(&alice_s.drain("new_message"), busy_chat), busy_ids);
}

fn message_ids(events: &[Arc<ServerEvent>], chat_id: i64) -> Vec<i64> {
    events
        .iter()
        .filter_map(|e| match e.as_ref() {
            ServerEvent::NewMessage(m) if m.chat_id == chat_id.to_string() => m.id.parse().ok(),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_offline_member_reads_missed_message_from_history() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let carol = app.sign_in("carol").await;
    let chat_id: i64 = app.create_chat(&alice, "group", &[&carol]).await.parse().unwrap();

    let sent = app.state.fanout.submit(alice.id(), text(chat_id, "hello")).await.unwrap();

    let mut carol_s = app.connect(&carol, "c1").await;
    assert!(carol_s.drain("new_message").is_empty());

    let history = app
        .state
        .messages
        .history(carol.id(), chat_id, HistoryQuery::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, sent.id);
    assert_eq!(history[0].chat_id, chat_id.to_string());
    assert_eq!(history[0].user_id, alice.id);
    assert_eq!(history[0].kind, "text");
    assert_eq!(history[0].content.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_presence_online_offline_and_idempotent_unbind() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let presence = app.state.hub.presence().clone();

    let mut watcher = app.connect(&alice, "a1").await;
    let first = app.connect(&bob, "b1").await;
    let second = app.connect(&bob, "b2").await;

    let bob_online = watcher
        .drain("user_online")
        .iter()
        .filter(|e| matches!(e.as_ref(), ServerEvent::UserOnline(p) if p.user_id == bob.id))
        .count();
    assert_eq!(bob_online, 1);
    assert!(presence.is_online(bob.id()));

    first.guard.close().await;
    assert!(presence.is_online(bob.id()));
    assert!(presence.unbind("b1").is_none());
    assert_eq!(presence.sessions_for(bob.id()).len(), 1);

    second.guard.close().await;
    assert!(!presence.is_online(bob.id()));
    assert!(watcher.next("user_offline").await.is_some());
}

#[tokio::test]
async fn test_chat_invite_reaches_added_member() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let mut bob_s = app.connect(&bob, "b1").await;

    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;

    match bob_s.next("chat_invite").await.as_deref() {
        Some(ServerEvent::ChatInvite(chat)) => {
            assert_eq!(chat.id, chat_id);
            assert_eq!(chat.role.as_deref(), Some("member"));
        }
        other => panic!("expected chat_invite, got {other:?}"),
    }
}
