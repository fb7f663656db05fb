//! Realtime client against an in-memory socket

use caseflow_model::{CaseId, UserId};
use caseflow_realtime::{
    ConnectionStatus, EventFilter, MemoryTokenStore, MessageKind, OutboundMessage, RealtimeClient,
    RealtimeConfig, TokenStore, TransportError, ABNORMAL_CLOSURE, MAX_RETRIES_REACHED,
    NORMAL_CLOSURE,
};
use caseflow_test_utils::{FakeConnector, FakeServer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(120);

fn config() -> RealtimeConfig {
    RealtimeConfig::new("ws://test/ws")
        .with_max_reconnect_attempts(3)
        .with_reconnect_interval(Duration::from_secs(1))
}

fn client_with_token(
    token: Option<&str>) -> (RealtimeClient, Arc<FakeConnector>, FakeServer, Arc<MemoryTokenStore>,
) {
    let (connector, server) = FakeConnector::new();
    let tokens = Arc::new(MemoryTokenStore::new(token.map(str::to_string)));
    let client = RealtimeClient::new(config(), connector.clone(), tokens.clone());
    (client, connector, server, tokens)
}

async fn wait_status(client: &RealtimeClient, pred: impl FnMut(&ConnectionStatus) -> bool) {
    let mut rx = client.watch_status();
    timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("status reached in time")
        .expect("client alive");
}

#[tokio::test]
async fn connect_without_token_is_refused() {
    let (client, connector, _server, _tokens) = client_with_token(None);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::MissingToken));
    assert_eq!(connector.calls(), 0);

    let status = client.status();
    assert!(!status.connected);
    assert!(!status.reconnecting);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn token_travels_in_url_and_subscriptions_replay_on_open() {
    let (client, _connector, mut server, _tokens) = client_with_token(Some("jwt"));
    client.subscribe_to_case(CaseId(10));
    client.subscribe_to_user(UserId(7));

    client.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();
    assert_eq!(socket.url, "ws://test/ws?token=jwt");
    assert!(client.is_connected());
    assert!(client.status().connected);

    let first = socket.next_message().await.unwrap();
    assert_eq!(first["type"], "SUBSCRIBE_CASE");
    assert_eq!(first["data"]["caseId"], 10);
    let second = socket.next_message().await.unwrap();
    assert_eq!(second["type"], "SUBSCRIBE_USER");
    assert_eq!(second["data"]["userId"], 7);
}

#[tokio::test]
async fn switching_case_unsubscribes_the_previous_one() {
    let (client, _connector, mut server, _tokens) = client_with_token(Some("jwt"));
    client.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();

    client.subscribe_to_case(CaseId(10));
    client.subscribe_to_case(CaseId(11));

    let kinds: Vec<(String, i64)> = socket
        .drain()
        .iter()
        .map(|m| {
            (
                m["type"].as_str().unwrap_or_default().to_string(),
                m["data"]["caseId"].as_i64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("SUBSCRIBE_CASE".to_string(), 10),
            ("UNSUBSCRIBE_CASE".to_string(), 10),
            ("SUBSCRIBE_CASE".to_string(), 11),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn abnormal_close_retries_until_budget_is_spent() {
    let (client, connector, mut server, _tokens) = client_with_token(Some("jwt"));
    client.connect().await.unwrap();
    let socket = server.accept().await.unwrap();

    connector.accept_only(0);
    socket.close(ABNORMAL_CLOSURE);

    wait_status(&client, ConnectionStatus::is_terminal).await;

    assert_eq!(connector.calls(), 4);
    let status = client.status();
    assert_eq!(status.retry_count, 3);
    assert_eq!(status.error.as_deref(), Some(MAX_RETRIES_REACHED));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn reconnect_replays_subscriptions_and_resets_retry_count() {
    let (client, connector, mut server, _tokens) = client_with_token(Some("jwt"));
    client.subscribe_to_case(CaseId(42));
    client.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();
    assert_eq!(socket.next_message().await.unwrap()["type"], "SUBSCRIBE_CASE");

    drop(socket);

    let mut socket = timeout(WAIT, server.accept()).await.unwrap().unwrap();
    let replayed = socket.next_message().await.unwrap();
    assert_eq!(replayed["type"], "SUBSCRIBE_CASE");
    assert_eq!(replayed["data"]["caseId"], 42);

    wait_status(&client, |s| s.connected).await;
    assert_eq!(client.status().retry_count, 0);
    assert_eq!(connector.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn normal_close_does_not_reconnect() {
    let (client, connector, mut server, _tokens) = client_with_token(Some("jwt"));
    client.connect().await.unwrap();
    let socket = server.accept().await.unwrap();

    socket.close(NORMAL_CLOSURE);
    wait_status(&client, |s| !s.connected).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.calls(), 1);
    assert!(!client.status().reconnecting);
}

#[tokio::test]
async fn disconnect_resets_status_and_closes_cleanly() {
    let (client, _connector, mut server, _tokens) = client_with_token(Some("jwt"));
    client.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();

    client.disconnect();

    assert_eq!(client.status(), ConnectionStatus::default());
    assert!(!client.is_connected());
    let close = socket.next_message().await.unwrap();
    assert_eq!(close["code"], NORMAL_CLOSURE);
}

#[tokio::test]
async fn sends_are_dropped_while_closed() {
    let (client, _connector, mut server, _tokens) = client_with_token(Some("jwt"));
    let message = OutboundMessage::new("assignment.task_assignment", json!({})).for_case(CaseId(1));
    assert!(!client.send_message(&message));

    client.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();
    assert!(client.send_message(&message));
    assert!(client.ping());

    assert_eq!(socket.next_message().await.unwrap()["type"], "assignment.task_assignment");
    assert_eq!(socket.next_message().await.unwrap()["type"], "PING");
}

#[tokio::test]
async fn malformed_frame_surfaces_as_error_message() {
    let (client, _connector, mut server, _tokens) = client_with_token(Some("jwt"));
    let mut all = client.messages();
    client.connect().await.unwrap();
    let socket = server.accept().await.unwrap();

    socket.send_text("{not json");

    let message = timeout(WAIT, all.recv()).await.unwrap().unwrap();
    assert_eq!(message.kind, MessageKind::Error);
    assert_eq!(message.data["raw"], "{not json");
    assert!(client.is_connected());
}

#[tokio::test]
async fn typed_streams_filter_by_category_and_case() {
    let (client, _connector, mut server, _tokens) = client_with_token(Some("jwt"));
    let mut tasks = client.task_events(EventFilter::case(CaseId(10)));
    let mut cases = client.case_events(EventFilter::any());
    let mut assignments = client.assignment_events(EventFilter::case(CaseId(10)));
    client.connect().await.unwrap();
    let socket = server.accept().await.unwrap();

    socket.send_json(&json!({"type": "TASK_UPDATED", "caseId": 11, "data": {"id": 1}}));
    socket.send_json(&json!({"type": "TASK_UPDATED", "caseId": 10, "data": {"id": 2}}));
    socket.send_json(&json!({"type": "assignment.task_assignment", "caseId": 10, "data": {}}));
    socket.send_json(&json!({"type": "SOMETHING_NEW", "caseId": 10, "data": {}}));
    socket.send_json(&json!({"type": "CASE_UPDATED", "caseId": 10, "data": {"id": 10}}));

    let task = timeout(WAIT, tasks.recv()).await.unwrap().unwrap();
    assert_eq!(task.kind, MessageKind::TaskUpdated);
    assert_eq!(task.data["id"], 2);

    let case = timeout(WAIT, cases.recv()).await.unwrap().unwrap();
    assert_eq!(case.kind, MessageKind::CaseUpdated);

    let sync = timeout(WAIT, assignments.recv()).await.unwrap().unwrap();
    assert_eq!(sync.case_id, Some(CaseId(10)));
    assert!(assignments.try_recv().is_none());
    assert!(tasks.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn token_watch_follows_token_presence() {
    let (client, _connector, mut server, tokens) = client_with_token(None);
    client.start_token_watch();

    tokens.set_token(Some("fresh".to_string())).unwrap();
    let _socket = timeout(WAIT, server.accept()).await.unwrap().unwrap();
    wait_status(&client, |s| s.connected).await;

    tokens.set_token(None).unwrap();
    wait_status(&client, |s| !s.connected).await;
    assert_eq!(client.status(), ConnectionStatus::default());

    client.stop_token_watch();
}
