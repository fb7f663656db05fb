//! A session wired over in-memory collaborators

use caseflow_core::{CaseSession, CaseflowConfig, CaseflowError, Collaborators, UserPermissions};
use caseflow_model::{CaseId, CaseRoleType, TaskId, UserId};
use caseflow_realtime::{MemoryTokenStore, RealtimeConfig};
use caseflow_test_utils::{
    case, member, task, FakeApi, FakeConnector, FakeNotifier, FakeRbac, RecordingFeedback,
    ServerSocket, StaticConfirm,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn session(api: FakeApi) -> (CaseSession, Arc<FakeApi>, caseflow_test_utils::FakeServer) {
    let api = Arc::new(api);
    let (connector, server) = FakeConnector::new();
    let collaborators = Collaborators {
        api: api.clone(),
        rbac: Arc::new(FakeRbac::new()),
        notifier: Arc::new(FakeNotifier::new()),
        feedback: Arc::new(RecordingFeedback::new()),
        confirm: Arc::new(StaticConfirm::new(true)),
        connector,
        tokens: Arc::new(MemoryTokenStore::new(Some("jwt".to_string()))),
    };
    let config = CaseflowConfig {
        realtime: RealtimeConfig::new("ws://test/ws"),
        ..CaseflowConfig::default()
    };
    (CaseSession::new(&config, collaborators), api, server)
}

fn matter() -> FakeApi {
    FakeApi::new()
        .with_case(case(10))
        .with_member(member(1, 10, 7, CaseRoleType::LeadAttorney))
        .with_task(task(5, 10))
}

async fn next_of_type(socket: &mut ServerSocket, kind: &str) -> Value {
    timeout(WAIT, async {
        loop {
            let message = socket.next_message().await.expect("socket open");
            if message["type"] == kind {
                return message;
            }
        }
    })
    .await
    .expect("message arrived")
}

#[tokio::test]
async fn dashboard_needs_an_acting_user() {
    let (session, _api, _server) = session(matter());
    assert!(matches!(session.dashboard(), Err(CaseflowError::PermissionDenied(_))));

    session.set_user(UserId(7), UserPermissions::default());
    assert!(session.dashboard().is_ok());
}

#[tokio::test]
async fn open_case_loads_store_and_subscribes() {
    let (session, _api, mut server) = session(matter());
    session.start();
    session.set_user(UserId(7), UserPermissions::default());
    session.open_case(CaseId(10)).await.unwrap();

    assert_eq!(session.store().user_role(), Some(CaseRoleType::LeadAttorney));
    assert_eq!(session.store().tasks_snapshot().len(), 1);

    session.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();
    assert_eq!(next_of_type(&mut socket, "SUBSCRIBE_CASE").await["data"]["caseId"], 10);
}

#[tokio::test]
async fn remote_events_reach_the_store_and_local_changes_go_out() {
    let (session, _api, mut server) = session(matter());
    session.start();
    session.set_user(UserId(7), UserPermissions::default());
    session.open_case(CaseId(10)).await.unwrap();
    session.connect().await.unwrap();
    let mut socket = server.accept().await.unwrap();

    let mut tasks = session.store().watch_tasks();
    socket.send_json(&json!({
        "type": "TASK_CREATED",
        "caseId": 10,
        "data": {"id": 99, "caseId": 10, "title": "Remote"}
    }));
    timeout(WAIT, tasks.wait_for(|t| t.iter().any(|t| t.id == TaskId(99))))
        .await
        .expect("remote task applied")
        .unwrap();

    let result = session.sync().assign_task_to_user(5, 7, 10).await;
    assert!(result.success);
    let sent = next_of_type(&mut socket, "assignment.task_assignment").await;
    assert_eq!(sent["caseId"], 10);
}

#[tokio::test]
async fn unknown_case_is_an_error() {
    let (session, _api, _server) = session(matter());
    assert!(session.open_case(CaseId(404)).await.is_err());
    assert!(session.store().current_case().is_none());
}
