//! End-to-end session behaviour against the mock backend: sends, replies,
//! server errors, conversation switching and connection loss.
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use serde_json::json;

use chat_session::domain::{
    ConnectionState, ConversationId, Message, SendOutcome, SessionEvent,
};

use common::{MockBackend, Script, TOKEN, config, next_change, start, wait_ready, wait_until};

#[tokio::test]
async fn send_appends_optimistically_then_reconciles() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;
    let mut events = session.subscribe();

    let outcome = session.send_message("hi").await;
    assert!(matches!(outcome, Ok(SendOutcome::Sent { .. })));

    let first = next_change(&mut events).await;
    let second = next_change(&mut events).await;
    assert!(matches!(
        first,
        SessionEvent::MessageAppended { ref message, index: 0, .. } if *message == Message::user("hi")
    ));
    assert!(matches!(second, SessionEvent::TypingChanged { typing: true, .. }));

    let snapshot = wait_until(&session, "bot reply", |s| s.messages.len() == 2).await;
    assert_eq!(
        snapshot.messages,
        vec![Message::user("hi"), Message::bot("echo: hi")]
    );
    assert!(!snapshot.typing);
    assert_eq!(snapshot.pending_sends, 0);
    assert_eq!(
        backend.frames(),
        vec![json!({"chat_id": null, "role": "user", "content": "hi"})]
    );

    session.shutdown().await;
}

#[tokio::test]
async fn sends_keep_their_order() {
    let backend = MockBackend::new(Script::Silent);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    for text in ["one", "two", "three"] {
        let outcome = session.send_message(text).await;
        assert!(matches!(outcome, Ok(SendOutcome::Sent { .. })));
    }

    let snapshot = wait_until(&session, "three sends", |s| s.pending_sends == 3).await;
    assert_eq!(
        snapshot.messages,
        vec![Message::user("one"), Message::user("two"), Message::user("three")]
    );
    assert!(snapshot.typing);

    session.shutdown().await;
}

#[tokio::test]
async fn empty_input_is_not_sent() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    let outcome = session.send_message("").await;

    assert!(matches!(outcome, Ok(SendOutcome::EmptyInput)));
    let snapshot = wait_until(&session, "snapshot", |_| true).await;
    assert!(snapshot.messages.is_empty());
    assert!(!snapshot.typing);
    session.shutdown().await;
    assert!(backend.frames().is_empty());
}

#[tokio::test]
async fn error_frame_becomes_diagnostic() {
    let backend = MockBackend::new(Script::ErrorReply);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    let _ = session.send_message("hi").await;

    let snapshot = wait_until(&session, "error diagnostic", |s| s.messages.len() == 2).await;
    assert_eq!(snapshot.messages.last(), Some(&Message::bot("⚠️ Error occurred")));
    assert!(!snapshot.typing);
    session.shutdown().await;
}

#[tokio::test]
async fn malformed_frame_is_shown_verbatim() {
    let backend = MockBackend::new(Script::Malformed);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    let _ = session.send_message("hi").await;

    let snapshot = wait_until(&session, "raw reply", |s| s.messages.len() == 2).await;
    assert_eq!(snapshot.messages.last(), Some(&Message::bot("not valid json")));
    assert!(!snapshot.typing);
    session.shutdown().await;
}

#[tokio::test]
async fn unanswered_send_times_out() {
    let backend = MockBackend::new(Script::Silent);
    let addr = backend.spawn().await;
    let config = config(addr).with_reply_timeout(Some(Duration::from_millis(200)));
    let session = start(&config, TOKEN);
    wait_ready(&session).await;

    let _ = session.send_message("anyone?").await;

    let snapshot = wait_until(&session, "reply timeout", |s| !s.typing && s.messages.len() == 2).await;
    assert_eq!(
        snapshot.messages,
        vec![
            Message::user("anyone?"),
            Message::bot("⚠️ No response from server")
        ]
    );
    assert_eq!(snapshot.pending_sends, 0);
    session.shutdown().await;
}

#[tokio::test]
async fn selecting_conversation_replaces_view() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    let ready = wait_ready(&session).await;
    let titles: Vec<&str> = ready.conversations.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Seven", "Chat #2"]);

    let selected = session.select_conversation(ConversationId::from(7)).await;
    assert!(selected.is_ok());

    let snapshot = wait_until(&session, "switch", |_| true).await;
    assert_eq!(snapshot.messages, vec![Message::user("a"), Message::bot("b")]);
    assert_eq!(snapshot.active_conversation_id, Some(ConversationId::from(7)));
    session.shutdown().await;
}

#[tokio::test]
async fn switching_back_restores_stored_history() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    assert!(session.select_conversation(ConversationId::from(7)).await.is_ok());
    assert!(session.select_conversation(ConversationId::from("x")).await.is_ok());
    let _ = session.send_message("on x").await;
    wait_until(&session, "reply on x", |s| s.messages.len() == 2).await;
    assert!(session.select_conversation(ConversationId::from(7)).await.is_ok());

    let snapshot = wait_until(&session, "back on 7", |_| true).await;
    assert_eq!(snapshot.messages, vec![Message::user("a"), Message::bot("b")]);
    assert_eq!(
        backend.frames(),
        vec![json!({"chat_id": "x", "role": "user", "content": "on x"})]
    );
    session.shutdown().await;
}

#[tokio::test]
async fn unknown_conversation_is_rejected() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    let result = session.select_conversation(ConversationId::from(404)).await;

    assert!(result.is_err());
    let snapshot = wait_until(&session, "snapshot", |_| true).await;
    assert_eq!(snapshot.active_conversation_id, None);
    session.shutdown().await;
}

#[tokio::test]
async fn refresh_reloads_listing() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;

    backend.set_chats(json!([
        {"id": 7, "title": "Seven"},
        {"id": "x"},
        {"id": 12, "title": "Fresh", "messages": [{"role": "bot", "content": "new"}]}
    ]));
    assert!(session.refresh_conversations().await.is_ok());

    let snapshot = wait_until(&session, "refreshed listing", |s| s.conversations.len() == 3).await;
    let titles: Vec<&str> = snapshot.conversations.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Seven", "Chat #2", "Fresh"]);
    assert!(snapshot.messages.is_empty());

    assert!(session.select_conversation(ConversationId::from(12)).await.is_ok());
    let switched = wait_until(&session, "switch to fresh", |_| true).await;
    assert_eq!(switched.messages, vec![Message::bot("new")]);
    session.shutdown().await;
}

#[tokio::test]
async fn failed_listing_surfaces_diagnostic() {
    let mut backend = MockBackend::new(Script::Echo);
    backend.fail_chats = true;
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);

    let snapshot = wait_until(&session, "listing diagnostic", |s| !s.messages.is_empty()).await;

    assert_eq!(snapshot.messages, vec![Message::bot("⚠️ Failed to load chats")]);
    assert!(snapshot.conversations.is_empty());
    session.shutdown().await;
}

#[tokio::test]
async fn rejected_token_reports_connection_error() {
    let backend = MockBackend::new(Script::Echo);
    let addr = backend.spawn().await;
    let session = start(&config(addr), "wrong-token");

    let snapshot = wait_until(&session, "connection error", |s| {
        s.messages.contains(&Message::bot("⚠️ Connection error. Please refresh."))
    })
    .await;

    assert_eq!(snapshot.connection, ConnectionState::Disconnected);
    let outcome = session.send_message("hi").await;
    assert!(matches!(
        outcome,
        Ok(SendOutcome::NotConnected(ConnectionState::Disconnected))
    ));
    session.shutdown().await;
}

#[tokio::test]
async fn server_close_clears_typing_and_allows_reconnect() {
    let backend = MockBackend::new(Script::Close);
    let addr = backend.spawn().await;
    let session = start(&config(addr), TOKEN);
    wait_ready(&session).await;
    assert!(matches!(session.reconnect().await, Ok(false)));

    let _ = session.send_message("bye").await;

    let snapshot = wait_until(&session, "remote close", |s| {
        s.messages.contains(&Message::bot("⚠️ Connection closed."))
    })
    .await;
    assert!(!snapshot.typing);
    assert_eq!(snapshot.pending_sends, 0);
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);

    assert!(matches!(session.reconnect().await, Ok(true)));
    wait_until(&session, "reconnected", |s| s.connection.is_open()).await;
    session.shutdown().await;
}
