//! Dashboard and Kanban board view-models

use caseflow_core::{
    AssignmentDashboard, AssignmentOptions, BoardFilter, CaseflowError, Origin, PermissionConfig,
    PermissionResolver, TaskBoard, UserPermissions,
};
use caseflow_model::{
    CaseId, CaseRoleType, TaskDraft, TaskId, TaskPriority, TaskStatus, TransferId, TransferStatus,
    UserId,
};
use caseflow_test_utils::{
    case, member, pending_transfer, task, user, FakeApi, FakeRbac, StaticConfirm, SyncHarness,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

// ---- dashboard ----

fn firm() -> FakeApi {
    FakeApi::new()
        .with_case(case(10))
        .with_case(case(11))
        .with_member(member(1, 10, 7, CaseRoleType::LeadAttorney).with_workload(50))
        .with_member(member(2, 11, 8, CaseRoleType::Associate).with_workload(30))
        .with_member(member(3, 11, 7, CaseRoleType::CoCounsel))
        .with_attorney(user(7, "Ada", "Lovelace"))
        .with_attorney(user(9, "Grace", "Hopper"))
        .with_transfer(pending_transfer(40, 11, 8, 9))
}

fn dashboard(h: &SyncHarness, confirm: bool) -> (AssignmentDashboard, Arc<StaticConfirm>) {
    let confirm = Arc::new(StaticConfirm::new(confirm));
    let dashboard = AssignmentDashboard::new(
        h.api.clone(),
        h.sync.clone(),
        h.feedback.clone(),
        confirm.clone(),
        UserId(7),
    );
    (dashboard, confirm)
}

#[tokio::test]
async fn my_assignments_fall_back_to_filtering_all() {
    let h = SyncHarness::new(firm());
    h.api.fail("user_assignments", 500, None);
    let (dashboard, _) = dashboard(&h, true);

    dashboard.load_initial_data().await;

    let state = dashboard.state();
    assert!(!state.loading);
    assert_eq!(state.cases.len(), 2);
    assert_eq!(state.all_assignments.len(), 3);
    assert_eq!(dashboard.my_assignments().len(), 2);
    assert_eq!(dashboard.my_total_workload(), 50);
}

#[tokio::test]
async fn one_failing_source_does_not_block_the_rest() {
    let h = SyncHarness::new(firm());
    h.api.fail("attorneys", 503, None);
    let (dashboard, _) = dashboard(&h, true);

    dashboard.load_initial_data().await;

    let state = dashboard.state();
    assert!(state.attorneys.is_empty());
    assert_eq!(state.cases.len(), 2);
    assert_eq!(state.my_assignments.len(), 2);
}

#[tokio::test]
async fn lighter_attorneys_rank_first() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, true);
    dashboard.load_initial_data().await;

    let ranked = dashboard.recommend_attorneys(None);

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].candidate.user_id, UserId(9));
    assert_eq!(ranked[1].candidate.workload_weight, 50);
}

#[tokio::test]
async fn assigning_myself_updates_my_list() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, true);
    dashboard.load_initial_data().await;

    let result = dashboard
        .assign(12, 7, CaseRoleType::Consultant, AssignmentOptions::default().with_workload(10))
        .await;

    assert!(result.success);
    assert_eq!(dashboard.state().all_assignments.len(), 4);
    assert_eq!(dashboard.my_total_workload(), 60);
}

#[tokio::test]
async fn reassigning_an_existing_member_replaces_the_record() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, true);
    dashboard.load_initial_data().await;

    let result = dashboard
        .assign(
            10,
            7,
            CaseRoleType::LeadAttorney,
            AssignmentOptions::default().with_workload(60),
        )
        .await;

    assert!(result.success);
    let state = dashboard.state();
    assert_eq!(state.all_assignments.len(), 3);
    let mine: Vec<_> = state
        .my_assignments
        .iter()
        .filter(|a| a.case_id == CaseId(10))
        .collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].workload(), 60);
    assert_eq!(dashboard.my_total_workload(), 60);
}

#[tokio::test]
async fn declined_unassign_makes_no_request() {
    let h = SyncHarness::new(firm());
    let (dashboard, confirm) = dashboard(&h, false);

    let outcome = dashboard.unassign(CaseId(10), UserId(7), "rotation").await;

    assert!(matches!(outcome, Err(CaseflowError::Cancelled)));
    assert_eq!(confirm.prompts(), 1);
    assert_eq!(h.api.calls("unassign_case"), 0);
}

#[tokio::test]
async fn confirmed_unassign_drops_the_assignment() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, true);
    dashboard.load_initial_data().await;

    let result = dashboard.unassign(CaseId(10), UserId(7), "rotation").await.unwrap();

    assert!(result.success);
    assert_eq!(dashboard.my_assignments().len(), 1);
    assert_eq!(dashboard.my_total_workload(), 0);
}

#[tokio::test]
async fn transfer_reloads_the_dashboard() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, true);
    dashboard.load_initial_data().await;

    let result = dashboard.transfer(CaseId(10), UserId(7), UserId(9), "leave").await;

    assert!(result.success);
    let state = dashboard.state();
    assert!(state
        .all_assignments
        .iter()
        .any(|a| a.case_id == CaseId(10) && a.user_id == UserId(9)));
    assert_eq!(state.my_assignments.len(), 1);
}

#[tokio::test]
async fn transfer_requests_are_decided() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, true);
    dashboard.load_pending_transfers().await;
    assert_eq!(dashboard.state().pending_transfers.len(), 1);

    dashboard.approve_transfer(TransferId(40)).await.unwrap();

    assert_eq!(h.api.transfer_status(TransferId(40)), Some(TransferStatus::Approved));
    assert!(dashboard.state().pending_transfers.is_empty());
    assert_eq!(h.feedback.successes(), vec!["Transfer approved".to_string()]);

    let missing = dashboard.approve_transfer(TransferId(41)).await;
    assert!(missing.is_err());
    assert_eq!(h.feedback.errors().len(), 1);
}

#[tokio::test]
async fn declined_rejection_makes_no_request() {
    let h = SyncHarness::new(firm());
    let (dashboard, _) = dashboard(&h, false);

    let outcome = dashboard.reject_transfer(TransferId(40), "not now").await;

    assert!(matches!(outcome, Err(CaseflowError::Cancelled)));
    assert_eq!(h.api.calls("reject_transfer"), 0);
    assert_eq!(h.api.transfer_status(TransferId(40)), Some(TransferStatus::Pending));
}

// ---- board ----

fn matter() -> FakeApi {
    FakeApi::new()
        .with_case(case(10))
        .with_member(member(1, 10, 7, CaseRoleType::LeadAttorney))
        .with_task(task(5, 10))
        .with_task(task(6, 10).with_status(TaskStatus::InProgress).assigned_to(UserId(7)))
        .with_task(task(7, 10).with_status(TaskStatus::Completed).assigned_to(UserId(8)))
        .with_task(task(8, 10).with_priority(TaskPriority::High).assigned_to(UserId(7)))
}

fn board(h: &SyncHarness, confirm: bool) -> TaskBoard {
    TaskBoard::new(
        h.api.clone(),
        h.store.clone(),
        h.sync.clone(),
        h.feedback.clone(),
        Arc::new(StaticConfirm::new(confirm)),
    )
}

#[tokio::test]
async fn columns_follow_status() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, true);

    let ids = |status| board.column(status).iter().map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(ids(TaskStatus::Todo), vec![TaskId(5), TaskId(8)]);
    assert_eq!(ids(TaskStatus::InProgress), vec![TaskId(6)]);
    assert_eq!(ids(TaskStatus::Completed), vec![TaskId(7)]);

    board.set_filter(BoardFilter {
        assignee: Some(UserId(7)),
        ..BoardFilter::default()
    });
    assert_eq!(ids(TaskStatus::Todo), vec![TaskId(8)]);
}

#[tokio::test]
async fn move_persists_status_and_reports() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, true);

    let result = board.move_task(TaskId(5), TaskStatus::Review, Some(0)).await;

    assert!(result.success);
    assert_eq!(board.column(TaskStatus::Review)[0].id, TaskId(5));
    assert_eq!(h.store.find_task(TaskId(5)).unwrap().status, TaskStatus::Review);
    let server = h.api.server_tasks(CaseId(10));
    assert_eq!(server.iter().find(|t| t.id == TaskId(5)).unwrap().status, TaskStatus::Review);
    assert_eq!(h.feedback.successes(), vec!["Task moved to REVIEW".to_string()]);
}

#[tokio::test]
async fn failed_move_restores_the_board() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, true);
    let before = board.columns();
    h.api.fail("update_task", 500, Some("Task is locked"));

    let result = board.move_task(TaskId(5), TaskStatus::Completed, None).await;

    assert!(!result.success);
    assert_eq!(board.columns(), before);
    assert_eq!(h.store.find_task(TaskId(5)).unwrap().status, TaskStatus::Todo);
    assert_eq!(h.feedback.errors(), vec!["Task is locked".to_string()]);
}

#[tokio::test]
async fn reorder_within_a_column_makes_no_request() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, true);

    let result = board.move_task(TaskId(8), TaskStatus::Todo, Some(0)).await;

    assert!(result.success);
    assert_eq!(board.column(TaskStatus::Todo)[0].id, TaskId(8));
    assert_eq!(h.api.calls("update_task"), 0);
}

#[tokio::test]
async fn moves_are_gated_by_task_permissions() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    h.store.set_current_user(Some(UserId(3)));
    let resolver = Arc::new(PermissionResolver::new(
        Arc::new(FakeRbac::new()),
        PermissionConfig::default(),
    ));
    resolver
        .refresh(h.store.current_case().as_ref(), h.store.user_role(), &UserPermissions::default())
        .await;
    let board = board(&h, true).with_permissions(resolver);

    let locked = board.move_task(TaskId(7), TaskStatus::Review, None).await;
    assert!(!locked.success);
    assert_eq!(h.api.calls("update_task"), 0);
    assert_eq!(h.feedback.errors().len(), 1);

    let open = board.move_task(TaskId(5), TaskStatus::InProgress, None).await;
    assert!(open.success);
}

#[tokio::test]
async fn cancelled_is_not_a_drop_target() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, true);

    assert!(!board.move_task(TaskId(5), TaskStatus::Cancelled, None).await.success);
    assert!(!board.move_task(TaskId(404), TaskStatus::Review, None).await.success);
    assert_eq!(h.api.total_calls(), 3);
}

#[tokio::test]
async fn create_and_delete_go_through_the_store() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, true);

    let created = board.create_task(TaskDraft::new(CaseId(10), "File motion")).await.unwrap();
    assert!(h.store.find_task(created.id).is_some());
    assert!(board.column(TaskStatus::Todo).iter().any(|t| t.id == created.id));

    board.delete_task(TaskId(5)).await.unwrap();
    assert!(h.store.find_task(TaskId(5)).is_none());

    assert_eq!(h.broadcaster.kinds(), vec!["TASK_CREATED".to_string(), "TASK_DELETED".to_string()]);
}

#[tokio::test]
async fn declined_delete_keeps_the_task() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = board(&h, false);

    let outcome = board.delete_task(TaskId(5)).await;

    assert!(matches!(outcome, Err(CaseflowError::Cancelled)));
    assert!(h.store.find_task(TaskId(5)).is_some());
    assert_eq!(h.api.calls("delete_task"), 0);
}

#[tokio::test]
async fn bound_board_tracks_remote_changes() {
    let h = SyncHarness::with_open_case(matter(), 10).await;
    let board = Arc::new(board(&h, true));
    let pump = board.bind();
    let mut columns = board.watch();

    h.store.add_task(task(50, 10).with_status(TaskStatus::Review), Origin::Remote);

    timeout(
        Duration::from_secs(5),
        columns.wait_for(|cols| cols.iter().any(|c| c.tasks.iter().any(|t| t.id == TaskId(50)))),
    )
    .await
    .expect("board rebuilt")
    .unwrap();
    pump.abort();
}
