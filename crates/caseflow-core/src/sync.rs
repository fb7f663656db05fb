//! Assignment sync orchestrator
//!
//! Every assignment, reassignment, unassignment and task status change goes
//! through [`AssignmentSync`]. Each operation:
//! 1. validates its ids, failing without any network call
//! 2. builds an [`AssignmentChange`]
//! 3. makes exactly one REST call
//! 4. reconciles the context store with the response
//! 5. broadcasts `assignment.<change>` to peer sessions
//! 6. notifies the affected users, best-effort
//!
//! Operations never return `Err`; every failure becomes a failed
//! [`SyncResult`]. The store is written only after the REST call succeeds,
//! so a failure leaves it untouched.

use crate::api::CaseApi;
use crate::change::{AssignmentChange, ChangeMetadata, SyncResult};
use crate::context::{CaseContextStore, Origin};
use crate::error::ApiError;
use crate::notify::{Feedback, NotificationKind, NotificationPriority, Notifier, UserNotification};
use caseflow_model::{
    AssignmentType, CaseAssignmentRequest, CaseId, CaseRoleType, CaseTask, CaseTransferRequest,
    IdInput, TaskPatch, TaskStatus,
};
use caseflow_realtime::{Broadcaster, ChangeKind, OutboundMessage};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;

const DEFAULT_COMPONENT: &str = "assignment-sync";

/// Options for adding a user to a case team
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOptions {
    /// Assignment type
    pub assignment_type: AssignmentType,
    /// Workload weight
    pub workload_weight: Option<u32>,
    /// Reason or notes
    pub reason: Option<String>,
    /// Originating component
    pub component: String,
}

impl Default for AssignmentOptions {
    fn default() -> Self {
        Self {
            assignment_type: AssignmentType::Primary,
            workload_weight: None,
            reason: None,
            component: DEFAULT_COMPONENT.to_string(),
        }
    }
}

impl AssignmentOptions {
    /// With workload weight
    #[inline]
    #[must_use]
    pub fn with_workload(mut self, weight: u32) -> Self {
        self.workload_weight = Some(weight);
        self
    }

    /// With reason
    #[inline]
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// With originating component
    #[inline]
    #[must_use]
    pub fn from_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }
}

/// Holds the in-flight count up for its lifetime
struct InFlight<'a>(&'a watch::Sender<usize>);

impl<'a> InFlight<'a> {
    fn start(counter: &'a watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

macro_rules! validated {
    ($input:expr) => {
        match $input {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("sync rejected before any request: {}", e);
                return SyncResult::failed(e.to_string());
            }
        }
    };
}

/// The assignment/task mutation funnel
#[derive(Debug)]
pub struct AssignmentSync {
    api: Arc<dyn CaseApi>,
    store: Arc<CaseContextStore>,
    broadcaster: Arc<dyn Broadcaster>,
    notifier: Arc<dyn Notifier>,
    feedback: Arc<dyn Feedback>,
    in_flight: watch::Sender<usize>,
}

impl AssignmentSync {
    /// Create an orchestrator
    #[must_use]
    pub fn new(
        api: Arc<dyn CaseApi>,
        store: Arc<CaseContextStore>,
        broadcaster: Arc<dyn Broadcaster>,
        notifier: Arc<dyn Notifier>,
        feedback: Arc<dyn Feedback>,
    ) -> Self {
        Self {
            api,
            store,
            broadcaster,
            notifier,
            feedback,
            in_flight: watch::Sender::new(0),
        }
    }

    /// Whether any operation is in flight
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        *self.in_flight.borrow() > 0
    }

    /// Watch the number of operations in flight
    #[must_use]
    pub fn watch_in_flight(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Add a user to a case team
    pub async fn assign_user_to_case(
        &self,
        case_id: impl Into<IdInput>,
        user_id: impl Into<IdInput>,
        role: CaseRoleType,
        options: AssignmentOptions,
    ) -> SyncResult {
        let case_id = validated!(case_id.into().case_id());
        let user_id = validated!(user_id.into().user_id());
        let _busy = InFlight::start(&self.in_flight);

        let request = CaseAssignmentRequest {
            case_id,
            user_id,
            role_type: role,
            assignment_type: options.assignment_type,
            workload_weight: options.workload_weight,
            notes: options.reason.clone(),
        };
        let change = AssignmentChange::new(
            ChangeKind::CaseAssignment,
            case_id.get(),
            case_id,
            Some(user_id),
            self.metadata(&options.component, options.reason.clone()),
        )
        .with_data(json!(request));
        tracing::info!(
            "[{}] assigning user {} to case {} as {}",
            change.id,
            user_id,
            case_id,
            role.as_str()
        );

        let assignment = match self.api.assign_case(&request).await {
            Ok(assignment) => assignment,
            Err(e) => return self.fail(&change, &e, true),
        };

        if self.store.current_case_id() == Some(case_id) {
            self.store.add_team_member(assignment.clone(), Origin::Sync);
        }
        let entity = json!(assignment);
        self.broadcast(&change, &entity);

        let case_label = self.case_label(case_id);
        let notification = UserNotification::new(
            user_id,
            NotificationKind::CaseAssigned,
            "New case assignment",
            format!("You have been assigned to {case_label} as {}", role.display_name()),
        )
        .for_case(case_id);
        self.notify_all(vec![notification]).await;

        self.feedback.success("User assigned to case");
        SyncResult::ok(change.affected_users(), Some(entity))
    }

    /// Move a case from one user to another
    ///
    /// Both users are notified in parallel; one failed notification does not
    /// stop the other.
    pub async fn reassign_case(
        &self,
        case_id: impl Into<IdInput>,
        previous_user_id: impl Into<IdInput>,
        new_user_id: impl Into<IdInput>,
        reason: impl Into<String>,
        role: Option<CaseRoleType>,
    ) -> SyncResult {
        let case_id = validated!(case_id.into().case_id());
        let previous = validated!(previous_user_id.into().user_id());
        let next = validated!(new_user_id.into().user_id());
        let _busy = InFlight::start(&self.in_flight);

        let request = CaseTransferRequest {
            case_id,
            from_user_id: previous,
            to_user_id: next,
            reason: reason.into(),
            role_type: role,
        };
        let change = AssignmentChange::new(
            ChangeKind::CaseReassignment,
            case_id.get(),
            case_id,
            Some(next),
            self.metadata(DEFAULT_COMPONENT, Some(request.reason.clone())),
        )
        .with_previous_user(previous)
        .with_data(json!(request));
        tracing::info!(
            "[{}] reassigning case {} from {} to {}",
            change.id,
            case_id,
            previous,
            next
        );

        let assignment = match self.api.transfer_case(&request).await {
            Ok(assignment) => assignment,
            Err(e) => return self.fail(&change, &e, true),
        };

        if self.store.current_case_id() == Some(case_id) {
            self.store.remove_team_member(previous, Origin::Sync);
            self.store.add_team_member(assignment.clone(), Origin::Sync);
        }
        let entity = json!(assignment);
        self.broadcast(&change, &entity);

        let case_label = self.case_label(case_id);
        self.notify_all(vec![
            UserNotification::new(
                next,
                NotificationKind::CaseTransferred,
                "Case transferred to you",
                format!("{case_label} has been transferred to you"),
            )
            .for_case(case_id)
            .with_priority(NotificationPriority::High),
            UserNotification::new(
                previous,
                NotificationKind::CaseTransferred,
                "Case reassigned",
                format!("{case_label} has been reassigned to another team member"),
            )
            .for_case(case_id),
        ])
        .await;

        self.feedback.success("Case reassigned");
        SyncResult::ok(change.affected_users(), Some(entity))
    }

    /// Give a task to a user
    pub async fn assign_task_to_user(
        &self,
        task_id: impl Into<IdInput>,
        user_id: impl Into<IdInput>,
        case_id: impl Into<IdInput>,
    ) -> SyncResult {
        let task_id = validated!(task_id.into().task_id());
        let user_id = validated!(user_id.into().user_id());
        let case_id = validated!(case_id.into().case_id());
        let _busy = InFlight::start(&self.in_flight);

        let change = AssignmentChange::new(
            ChangeKind::TaskAssignment,
            task_id.get(),
            case_id,
            Some(user_id),
            self.metadata(DEFAULT_COMPONENT, None),
        );
        tracing::info!("[{}] assigning task {} to user {}", change.id, task_id, user_id);

        let mut task = match self.api.assign_task(task_id, user_id).await {
            Ok(task) => task,
            Err(e) => return self.fail(&change, &e, true),
        };
        task.assigned_to_id = Some(user_id);

        self.reconcile_task(case_id, &task);
        let entity = json!(task);
        self.broadcast(&change, &entity);

        let notification = UserNotification::new(
            user_id,
            NotificationKind::TaskAssigned,
            "New task assigned",
            format!("You have been assigned: {}", task.title),
        )
        .for_case(case_id);
        self.notify_all(vec![notification]).await;

        self.feedback.success("Task assigned");
        SyncResult::ok(change.affected_users(), Some(entity))
    }

    /// Move a task from one user to another
    ///
    /// Failures are left to the caller to surface.
    pub async fn reassign_task(
        &self,
        task_id: impl Into<IdInput>,
        new_user_id: impl Into<IdInput>,
        previous_user_id: impl Into<IdInput>,
        case_id: impl Into<IdInput>,
        reason: Option<String>,
    ) -> SyncResult {
        let task_id = validated!(task_id.into().task_id());
        let next = validated!(new_user_id.into().user_id());
        let previous = validated!(previous_user_id.into().user_id());
        let case_id = validated!(case_id.into().case_id());
        let _busy = InFlight::start(&self.in_flight);

        let change = AssignmentChange::new(
            ChangeKind::TaskReassignment,
            task_id.get(),
            case_id,
            Some(next),
            self.metadata(DEFAULT_COMPONENT, reason),
        )
        .with_previous_user(previous);
        tracing::info!(
            "[{}] reassigning task {} from {} to {}",
            change.id,
            task_id,
            previous,
            next
        );

        let mut task = match self.api.assign_task(task_id, next).await {
            Ok(task) => task,
            Err(e) => return self.fail(&change, &e, false),
        };
        task.assigned_to_id = Some(next);

        self.reconcile_task(case_id, &task);
        let entity = json!(task);
        self.broadcast(&change, &entity);

        self.notify_all(vec![
            UserNotification::new(
                next,
                NotificationKind::TaskAssigned,
                "Task reassigned to you",
                format!("You have been assigned: {}", task.title),
            )
            .for_case(case_id),
            UserNotification::new(
                previous,
                NotificationKind::TaskReassigned,
                "Task reassigned",
                format!("{} has been reassigned to another team member", task.title),
            )
            .for_case(case_id),
        ])
        .await;

        SyncResult::ok(change.affected_users(), Some(entity))
    }

    /// Remove a user from a case team
    pub async fn unassign_user_from_case(
        &self,
        case_id: impl Into<IdInput>,
        user_id: impl Into<IdInput>,
        reason: impl Into<String>,
    ) -> SyncResult {
        let case_id = validated!(case_id.into().case_id());
        let user_id = validated!(user_id.into().user_id());
        let reason = reason.into();
        let _busy = InFlight::start(&self.in_flight);

        let change = AssignmentChange::new(
            ChangeKind::CaseUnassignment,
            case_id.get(),
            case_id,
            Some(user_id),
            self.metadata(DEFAULT_COMPONENT, Some(reason.clone())),
        );
        tracing::info!("[{}] removing user {} from case {}", change.id, user_id, case_id);

        if let Err(e) = self.api.unassign_case(case_id, user_id, &reason).await {
            return self.fail(&change, &e, true);
        }

        if self.store.current_case_id() == Some(case_id) {
            self.store.remove_team_member(user_id, Origin::Sync);
        }
        let entity = json!({ "caseId": case_id, "userId": user_id });
        self.broadcast(&change, &entity);

        let case_label = self.case_label(case_id);
        let notification = UserNotification::new(
            user_id,
            NotificationKind::CaseUnassigned,
            "Removed from case",
            format!("You have been removed from {case_label}"),
        )
        .for_case(case_id);
        self.notify_all(vec![notification]).await;

        self.feedback.success("User removed from case");
        SyncResult::ok(change.affected_users(), Some(entity))
    }

    /// Set a task's status
    ///
    /// Any status may be set; legality is the backend's call. Failures are
    /// left to the caller to surface.
    pub async fn update_task_status(
        &self,
        task_id: impl Into<IdInput>,
        status: TaskStatus,
        case_id: impl Into<IdInput>,
    ) -> SyncResult {
        let task_id = validated!(task_id.into().task_id());
        let case_id = validated!(case_id.into().case_id());
        let _busy = InFlight::start(&self.in_flight);

        let change = AssignmentChange::new(
            ChangeKind::TaskStatusUpdate,
            task_id.get(),
            case_id,
            self.store.current_user(),
            self.metadata(DEFAULT_COMPONENT, None),
        )
        .with_data(json!({ "status": status }));
        tracing::info!("[{}] setting task {} to {}", change.id, task_id, status.as_str());

        let mut task = match self.api.update_task(task_id, &TaskPatch::status(status)).await {
            Ok(task) => task,
            Err(e) => return self.fail(&change, &e, false),
        };
        task.status = status;

        self.reconcile_task(case_id, &task);
        let entity = json!(task);
        self.broadcast(&change, &entity);

        let mut affected = Vec::new();
        if let Some(assignee) = task.assigned_to_id {
            affected.push(assignee);
            if Some(assignee) != self.store.current_user() {
                let notification = UserNotification::new(
                    assignee,
                    NotificationKind::TaskStatusChanged,
                    "Task status updated",
                    format!("{} is now {}", task.title, status.as_str()),
                )
                .for_case(case_id);
                self.notify_all(vec![notification]).await;
            }
        }

        SyncResult::ok(affected, Some(entity))
    }

    /// Re-fetch a case's roster and tasks into the store
    ///
    /// Loads the case first when it is not the current one.
    pub async fn force_sync_case(&self, case_id: impl Into<IdInput>) -> SyncResult {
        let case_id = validated!(case_id.into().case_id());
        let _busy = InFlight::start(&self.in_flight);
        tracing::info!("force-syncing case {}", case_id);

        let outcome = if self.store.current_case_id() == Some(case_id) {
            let (team, tasks) =
                futures::join!(self.store.refresh_team(), self.store.refresh_tasks());
            team.and(tasks)
        } else {
            self.store.load_case(case_id).await.map(|_| ())
        };

        match outcome {
            Ok(()) => {
                let affected = self.store.team_snapshot().iter().map(|m| m.user_id).collect();
                SyncResult::ok(affected, None)
            }
            Err(e) => {
                tracing::warn!("force sync of case {} failed: {}", case_id, e);
                SyncResult::failed(e.user_message())
            }
        }
    }

    fn metadata(&self, component: &str, reason: Option<String>) -> ChangeMetadata {
        ChangeMetadata::new(self.store.current_user(), component).with_reason(reason)
    }

    fn reconcile_task(&self, case_id: CaseId, task: &CaseTask) {
        if self.store.current_case_id() != Some(case_id) {
            return;
        }
        if !self.store.update_task(task.clone(), Origin::Sync) {
            self.store.add_task(task.clone(), Origin::Sync);
        }
    }

    fn broadcast(&self, change: &AssignmentChange, entity: &Value) {
        let message = OutboundMessage::new(
            change.kind.wire_type(),
            json!({
                "change": change,
                "entity": entity,
                "affectedUsers": change.affected_users(),
            }),
        )
        .for_case(change.case_id);

        if !self.broadcaster.broadcast(message) {
            tracing::debug!(
                "[{}] {} not broadcast; peers converge on reload",
                change.id,
                change.kind.as_str()
            );
        }
    }

    async fn notify_all(&self, notifications: Vec<UserNotification>) {
        let sends = notifications.iter().map(|n| async move {
            if let Err(e) = self.notifier.notify(n).await {
                tracing::warn!("notification to user {} dropped: {}", n.user_id, e);
            }
        });
        join_all(sends).await;
    }

    fn fail(&self, change: &AssignmentChange, error: &ApiError, surface: bool) -> SyncResult {
        let message = error.user_message();
        tracing::error!("[{}] {} failed: {}", change.id, change.kind.as_str(), error);
        if surface {
            self.feedback.error(&message);
        }
        SyncResult::failed(message)
    }

    fn case_label(&self, case_id: CaseId) -> String {
        self.store
            .current_case()
            .filter(|c| c.id == case_id)
            .map_or_else(|| format!("case #{case_id}"), |c| {
                if c.case_number.is_empty() {
                    c.title
                } else {
                    format!("{} ({})", c.title, c.case_number)
                }
            })
    }
}

