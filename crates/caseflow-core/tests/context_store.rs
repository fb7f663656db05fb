//! Case context store: loading, mutations, realtime application

use caseflow_core::{CaseContextStore, ContextEvent, Origin, WorkloadConfig};
use caseflow_model::{CaseId, CaseRoleType, CaseStatus, CaseTask, TaskId, TaskStatus, UserId};
use caseflow_realtime::{ChangeKind, InboundMessage, MessageKind};
use caseflow_test_utils::{case, member, task, FakeApi, RecordingBroadcaster, SyncHarness};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn case_10() -> FakeApi {
    FakeApi::new()
        .with_case(case(10))
        .with_member(member(1, 10, 7, CaseRoleType::LeadAttorney).with_workload(90))
        .with_member(member(2, 10, 8, CaseRoleType::Paralegal).with_workload(20))
        .with_task(task(5, 10))
        .with_task(task(6, 10).with_status(TaskStatus::Completed))
}

#[tokio::test]
async fn load_case_fills_every_slot_before_announcing() {
    let h = SyncHarness::new(case_10());
    let mut events = h.store.events();

    let loaded = h.store.load_case(CaseId(10)).await.unwrap();

    assert_eq!(loaded.id, CaseId(10));
    assert_eq!(h.store.team_snapshot().len(), 2);
    assert_eq!(h.store.tasks_snapshot().len(), 2);
    assert_eq!(h.store.task_summary().completion_rate, 50.0);

    let team = h.store.team_summary();
    assert_eq!(team.total_members, 2);
    assert_eq!((team.light, team.heavy), (1, 1));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.last(), Some(&ContextEvent::CaseUpdated(CaseId(10))));
    assert!(h.broadcaster.sent().is_empty());
}

#[tokio::test]
async fn failed_related_fetch_leaves_that_slot_empty() {
    let api = case_10();
    api.fail("case_tasks", 500, None);
    let h = SyncHarness::new(api);

    h.store.load_case(CaseId(10)).await.unwrap();

    assert_eq!(h.store.current_case_id(), Some(CaseId(10)));
    assert_eq!(h.store.team_snapshot().len(), 2);
    assert!(h.store.tasks_snapshot().is_empty());
}

#[tokio::test]
async fn failed_case_fetch_changes_nothing() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    h.api.fail("get_case", 404, None);

    assert!(h.store.load_case(CaseId(99)).await.is_err());
    assert_eq!(h.store.current_case_id(), Some(CaseId(10)));
    assert_eq!(h.store.tasks_snapshot().len(), 2);
}

#[tokio::test]
async fn user_role_follows_the_roster() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let role = h.store.watch_user_role();

    h.store.set_current_user(Some(UserId(7)));
    assert_eq!(*role.borrow(), Some(CaseRoleType::LeadAttorney));

    h.store.remove_team_member(UserId(7), Origin::Local);
    assert_eq!(h.store.user_role(), None);

    h.store.add_team_member(member(3, 10, 7, CaseRoleType::CoCounsel), Origin::Local);
    assert_eq!(h.store.user_role(), Some(CaseRoleType::CoCounsel));
}

#[tokio::test]
async fn only_local_writes_are_broadcast() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;

    h.store.add_task(task(20, 10), Origin::Remote);
    h.store.add_task(task(21, 10), Origin::Sync);
    assert!(h.broadcaster.sent().is_empty());

    h.store.add_task(task(22, 10), Origin::Local);
    h.store.remove_team_member(UserId(8), Origin::Local);

    let sent = h.broadcaster.sent();
    assert_eq!(
        sent.iter().map(|m| m.kind.as_str()).collect::<Vec<_>>(),
        vec!["TASK_CREATED", "MEMBER_REMOVED"]
    );
    assert!(sent.iter().all(|m| m.case_id == Some(CaseId(10))));
    assert_eq!(sent[1].data["userId"], 8);
}

#[tokio::test]
async fn add_task_replaces_an_existing_id() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;

    h.store.add_task(task(5, 10).with_status(TaskStatus::Review), Origin::Remote);

    assert_eq!(h.store.tasks_snapshot().len(), 2);
    assert_eq!(h.store.find_task(TaskId(5)).unwrap().status, TaskStatus::Review);
}

#[tokio::test]
async fn updates_to_unknown_tasks_are_ignored() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let before = h.store.tasks_snapshot();

    assert!(!h.store.update_task(task(404, 10), Origin::Local));
    h.store.remove_task(TaskId(404), Origin::Local);

    assert_eq!(h.store.tasks_snapshot(), before);
    assert!(h.broadcaster.sent().is_empty());
}

#[tokio::test]
async fn clear_resets_everything_but_the_user() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    h.store.set_current_user(Some(UserId(7)));

    h.store.clear();

    assert_eq!(h.store.current_case(), None);
    assert!(h.store.team_snapshot().is_empty());
    assert!(h.store.tasks_snapshot().is_empty());
    assert_eq!(h.store.user_role(), None);
    assert_eq!(h.store.task_summary().total, 0);
    assert_eq!(h.store.current_user(), Some(UserId(7)));
}

// ---- realtime ----

#[tokio::test]
async fn messages_for_other_cases_are_ignored() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let before = (h.store.team_snapshot(), h.store.tasks_snapshot());

    let foreign =
        InboundMessage::new(MessageKind::TaskDeleted, json!({"taskId": 5})).for_case(CaseId(11));
    let unscoped = InboundMessage::new(MessageKind::TaskDeleted, json!({"taskId": 5}));

    assert!(!h.store.apply_realtime(&foreign).await);
    assert!(!h.store.apply_realtime(&unscoped).await);
    assert_eq!((h.store.team_snapshot(), h.store.tasks_snapshot()), before);
}

#[tokio::test]
async fn nothing_applies_without_a_current_case() {
    let h = SyncHarness::new(case_10());
    let message =
        InboundMessage::new(MessageKind::TaskCreated, json!(task(5, 10))).for_case(CaseId(10));

    assert!(!h.store.apply_realtime(&message).await);
    assert!(h.store.tasks_snapshot().is_empty());
}

#[tokio::test]
async fn task_messages_apply_without_echo() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let on_case = |kind, data| InboundMessage::new(kind, data).for_case(CaseId(10));

    let created = task(30, 10).assigned_to(UserId(8));
    assert!(h.store.apply_realtime(&on_case(MessageKind::TaskCreated, json!(created))).await);

    let renamed = CaseTask {
        title: "Renamed".into(),
        ..task(5, 10)
    };
    assert!(h.store.apply_realtime(&on_case(MessageKind::TaskUpdated, json!(renamed))).await);

    let patch = json!({"taskId": 30, "status": "IN_PROGRESS"});
    assert!(h.store.apply_realtime(&on_case(MessageKind::TaskStatusChanged, patch)).await);

    assert!(h.store.apply_realtime(&on_case(MessageKind::TaskDeleted, json!({"id": 6}))).await);

    let tasks = h.store.tasks_snapshot();
    assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![TaskId(5), TaskId(30)]);
    assert_eq!(h.store.find_task(TaskId(5)).unwrap().title, "Renamed");
    assert_eq!(h.store.find_task(TaskId(30)).unwrap().status, TaskStatus::InProgress);
    assert!(h.broadcaster.sent().is_empty());
}

#[tokio::test]
async fn member_messages_apply() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let on_case = |kind, data| InboundMessage::new(kind, data).for_case(CaseId(10));

    let joined = member(9, 10, 12, CaseRoleType::Consultant);
    assert!(h.store.apply_realtime(&on_case(MessageKind::MemberAdded, json!(joined))).await);
    let removed = on_case(MessageKind::MemberRemoved, json!({"userId": 8}));
    assert!(h.store.apply_realtime(&removed).await);

    let users: Vec<UserId> = h.store.team_snapshot().iter().map(|m| m.user_id).collect();
    assert_eq!(users, vec![UserId(7), UserId(12)]);
    assert!(h.broadcaster.sent().is_empty());
}

#[tokio::test]
async fn peer_sync_broadcasts_are_applied() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let team_fetches = h.api.calls("case_team");

    let entity = task(5, 10).assigned_to(UserId(8));
    let task_sync = InboundMessage::new(
        MessageKind::AssignmentSync(ChangeKind::TaskAssignment),
        json!({"change": {}, "entity": entity, "affectedUsers": [8]}),
    )
    .for_case(CaseId(10));
    assert!(h.store.apply_realtime(&task_sync).await);
    assert_eq!(h.store.find_task(TaskId(5)).unwrap().assigned_to_id, Some(UserId(8)));

    let case_sync = InboundMessage::new(
        MessageKind::AssignmentSync(ChangeKind::CaseReassignment),
        json!({"change": {}, "entity": {}, "affectedUsers": []}),
    )
    .for_case(CaseId(10));
    assert!(h.store.apply_realtime(&case_sync).await);
    assert_eq!(h.api.calls("case_team"), team_fetches + 1);
}

#[tokio::test]
async fn case_messages_update_metadata() {
    let h = SyncHarness::with_open_case(case_10(), 10).await;
    let on_case = |kind, data| InboundMessage::new(kind, data).for_case(CaseId(10));

    assert!(
        h.store
            .apply_realtime(&on_case(MessageKind::CaseStatusChanged, json!({"status": "CLOSED"})))
            .await
    );
    assert_eq!(h.store.current_case().unwrap().status, CaseStatus::Closed);

    let renamed = on_case(
        MessageKind::CaseUpdated,
        json!({"id": 10, "title": "Smith v. Jones"}),
    );
    assert!(h.store.apply_realtime(&renamed).await);
    assert_eq!(h.store.current_case().unwrap().title, "Smith v. Jones");

    assert!(!h.store.apply_realtime(&on_case(MessageKind::Notification, json!({}))).await);
}

// ---- concurrency ----

#[test]
fn concurrent_writers_never_lose_edits() {
    const THREADS: i64 = 8;
    const PER_THREAD: i64 = 500;
    let store = Arc::new(bare_store());

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let id = t * PER_THREAD + i + 1;
                    store.add_task(task(id, 10), Origin::Remote);
                    store.add_team_member(
                        member(id, 10, id, CaseRoleType::Associate),
                        Origin::Remote,
                    );
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let expected = usize::try_from(THREADS * PER_THREAD).unwrap();
    assert_eq!(store.tasks_snapshot().len(), expected);
    assert_eq!(store.task_summary().total, expected);
    assert_eq!(store.team_snapshot().len(), expected);
    assert_eq!(store.team_summary().total_members, expected);
}

#[test]
fn concurrent_removals_leave_only_survivors() {
    let store = Arc::new(bare_store());
    store.update_tasks((1..=1000).map(|id| task(id, 10)).collect());

    let removers: Vec<_> = (0..4_i64)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for id in (1..=1000).filter(|id| id % 4 == t && id % 2 == 0) {
                    store.remove_task(TaskId(id), Origin::Remote);
                }
            })
        })
        .collect();
    for remover in removers {
        remover.join().unwrap();
    }

    let left = store.tasks_snapshot();
    assert_eq!(left.len(), 500);
    assert!(left.iter().all(|t| t.id.get() % 2 == 1));
    assert_eq!(store.task_summary().total, 500);
}

// ---- properties ----

fn bare_store() -> CaseContextStore {
    CaseContextStore::new(Arc::new(FakeApi::new()), WorkloadConfig::default())
        .with_broadcaster(Arc::new(RecordingBroadcaster::new()))
}

proptest! {
    #[test]
    fn removing_a_member_twice_equals_removing_once(
        users in proptest::collection::btree_set(1_i64..50, 0..12),
        target in 1_i64..50,
    ) {
        let team: Vec<_> = users
            .iter()
            .enumerate()
            .map(|(i, u)| member(i64::try_from(i).unwrap() + 1, 10, *u, CaseRoleType::Associate))
            .collect();

        let once = bare_store();
        once.update_team(team.clone());
        once.remove_team_member(UserId(target), Origin::Local);

        let twice = bare_store();
        twice.update_team(team);
        twice.remove_team_member(UserId(target), Origin::Local);
        twice.remove_team_member(UserId(target), Origin::Local);

        prop_assert_eq!(once.team_snapshot(), twice.team_snapshot());
        prop_assert!(twice.team_snapshot().iter().all(|m| m.user_id != UserId(target)));
    }

    #[test]
    fn replacing_the_task_list_reads_back_unchanged(
        ids in proptest::collection::vec(1_i64..500, 0..20),
    ) {
        let tasks: Vec<_> = ids.iter().map(|id| task(*id, 10)).collect();
        let store = bare_store();

        store.update_tasks(tasks.clone());

        prop_assert_eq!(store.tasks_snapshot(), tasks.clone());
        prop_assert_eq!(store.task_summary().total, tasks.len());
    }
}
