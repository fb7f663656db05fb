//! Case context store
//!
//! In-memory view of the one case currently open: its metadata, team roster
//! and task list, plus the acting user's role on the case and a navigation
//! context. Each slot is a `watch` channel holding a single current value;
//! subscribers see the latest value, not necessarily every intermediate one.
//!
//! Every write recomputes the derived [`TaskSummary`] / [`TeamSummary`] by a
//! full re-scan. Writes carry an [`Origin`]; only [`Origin::Local`] writes
//! are re-broadcast to peer sessions, so applying a peer's message never
//! echoes it back.

use crate::api::CaseApi;
use crate::config::WorkloadConfig;
use crate::error::CaseflowError;
use crate::summary::{TaskSummary, TeamSummary};
use caseflow_model::{
    Case, CaseAssignment, CaseId, CaseRoleType, CaseStatus, CaseTask, TaskId, TaskPatch,
    TaskStatus, UserId,
};
use caseflow_realtime::{Broadcaster, InboundMessage, MessageKind, OutboundMessage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Where a store mutation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// This session's UI; re-broadcast to peers
    Local,
    /// A peer session, via the realtime transport
    Remote,
    /// Reconciliation with a REST response; the caller broadcasts
    Sync,
}

impl Origin {
    /// Whether mutations from this origin are re-broadcast
    #[inline]
    #[must_use]
    pub fn broadcasts(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Store-level change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    /// Case (and related data, when requested) loaded or updated
    CaseUpdated(CaseId),
    /// Roster changed
    TeamChanged(CaseId),
    /// Task list changed
    TasksChanged(CaseId),
    /// Store reset
    Cleared,
}

/// UI navigation and filter state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationContext {
    /// Active section, e.g. `tasks` or `team`
    pub section: Option<String>,
    /// Task status filter
    pub status_filter: Option<TaskStatus>,
    /// Assignee filter
    pub assignee_filter: Option<UserId>,
    /// Free-text search
    pub search: Option<String>,
}

/// Observable store of the currently open case
#[derive(Debug)]
pub struct CaseContextStore {
    api: Arc<dyn CaseApi>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    thresholds: WorkloadConfig,
    case: watch::Sender<Option<Case>>,
    team: watch::Sender<Vec<CaseAssignment>>,
    tasks: watch::Sender<Vec<CaseTask>>,
    current_user: watch::Sender<Option<UserId>>,
    user_role: watch::Sender<Option<CaseRoleType>>,
    navigation: watch::Sender<NavigationContext>,
    task_summary: watch::Sender<TaskSummary>,
    team_summary: watch::Sender<TeamSummary>,
    events: broadcast::Sender<ContextEvent>,
}

impl CaseContextStore {
    /// Create an empty store
    #[must_use]
    pub fn new(api: Arc<dyn CaseApi>, thresholds: WorkloadConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            broadcaster: None,
            thresholds,
            case: watch::Sender::new(None),
            team: watch::Sender::new(Vec::new()),
            tasks: watch::Sender::new(Vec::new()),
            current_user: watch::Sender::new(None),
            user_role: watch::Sender::new(None),
            navigation: watch::Sender::new(NavigationContext::default()),
            task_summary: watch::Sender::new(TaskSummary::default()),
            team_summary: watch::Sender::new(TeamSummary::default()),
            events,
        }
    }

    /// With a broadcaster for local mutations
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    // ---- case ----

    /// Replace the current case
    ///
    /// With `load_related`, the roster and task list are fetched in parallel
    /// and both slots are written before [`ContextEvent::CaseUpdated`] fires.
    /// A failed fetch leaves that slot empty. Results are discarded if another
    /// case became current while they were in flight.
    pub async fn set_current_case(&self, case: Case, load_related: bool) {
        let case_id = case.id;
        self.case.send_replace(Some(case));

        if load_related {
            let (team, tasks) =
                futures::join!(self.api.case_team(case_id), self.api.case_tasks(case_id));

            if self.current_case_id() != Some(case_id) {
                tracing::debug!("case {} no longer current; dropping related data", case_id);
                return;
            }

            let team = team.unwrap_or_else(|e| {
                tracing::warn!("failed to load team for case {}: {}", case_id, e);
                Vec::new()
            });
            let tasks = tasks.unwrap_or_else(|e| {
                tracing::warn!("failed to load tasks for case {}: {}", case_id, e);
                Vec::new()
            });
            self.write_team(team);
            self.write_tasks(tasks);
        }

        tracing::info!("current case set to {}", case_id);
        self.emit(ContextEvent::CaseUpdated(case_id));
    }

    /// Fetch a case and make it current, with its roster and tasks
    ///
    /// # Errors
    /// The REST error when the case itself cannot be fetched; the store is
    /// left unchanged.
    pub async fn load_case(&self, case_id: CaseId) -> Result<Case, CaseflowError> {
        let case = self.api.get_case(case_id).await?;
        self.set_current_case(case.clone(), true).await;
        Ok(case)
    }

    /// Set the acting user; their role on the case is derived from the roster
    pub fn set_current_user(&self, user_id: Option<UserId>) {
        self.current_user.send_replace(user_id);
        self.recompute_role();
    }

    /// Re-fetch the roster of the current case
    ///
    /// # Errors
    /// `NoCurrentCase` without a loaded case, or the REST error.
    pub async fn refresh_team(&self) -> Result<(), CaseflowError> {
        let case_id = self.current_case_id().ok_or(CaseflowError::NoCurrentCase)?;
        let team = self.api.case_team(case_id).await?;
        if self.current_case_id() == Some(case_id) {
            self.write_team(team);
        }
        Ok(())
    }

    /// Re-fetch the task list of the current case
    ///
    /// # Errors
    /// `NoCurrentCase` without a loaded case, or the REST error.
    pub async fn refresh_tasks(&self) -> Result<(), CaseflowError> {
        let case_id = self.current_case_id().ok_or(CaseflowError::NoCurrentCase)?;
        let tasks = self.api.case_tasks(case_id).await?;
        if self.current_case_id() == Some(case_id) {
            self.write_tasks(tasks);
        }
        Ok(())
    }

    /// Reset every slot except the acting user
    pub fn clear(&self) {
        self.case.send_replace(None);
        self.team.send_modify(|team| {
            team.clear();
            self.team_summary.send_replace(TeamSummary::default());
            self.user_role.send_replace(None);
        });
        self.tasks.send_modify(|tasks| {
            tasks.clear();
            self.task_summary.send_replace(TaskSummary::default());
        });
        self.navigation.send_replace(NavigationContext::default());
        self.emit(ContextEvent::Cleared);
    }

    // ---- tasks ----

    /// Add a task; replaces a task with the same id rather than duplicating it
    pub fn add_task(&self, task: CaseTask, origin: Origin) {
        self.edit_tasks(|tasks| {
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task.clone(),
                None => tasks.push(task.clone()),
            }
            true
        });
        self.publish(origin, MessageKind::TaskCreated, json!(task));
    }

    /// Replace a task by id; no-op when the task is not in the list
    pub fn update_task(&self, task: CaseTask, origin: Origin) -> bool {
        let updated = self.edit_tasks(|tasks| match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => {
                *existing = task.clone();
                true
            }
            None => false,
        });
        if !updated {
            tracing::debug!("update for unknown task {} ignored", task.id);
            return false;
        }
        self.publish(origin, MessageKind::TaskUpdated, json!(task));
        true
    }

    /// Apply a partial update to a task; returns the patched task
    pub fn patch_task(
        &self,
        task_id: TaskId,
        patch: &TaskPatch,
        origin: Origin,
    ) -> Option<CaseTask> {
        let mut patched = None;
        self.edit_tasks(|tasks| {
            let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
                return false;
            };
            patch.apply_to(task);
            patched = Some(task.clone());
            true
        });
        let patched = patched?;
        self.publish(origin, MessageKind::TaskUpdated, json!(patched));
        Some(patched)
    }

    /// Remove a task by id
    pub fn remove_task(&self, task_id: TaskId, origin: Origin) {
        let removed = self.edit_tasks(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.id != task_id);
            tasks.len() != before
        });
        if removed {
            self.publish(origin, MessageKind::TaskDeleted, json!({ "taskId": task_id }));
        }
    }

    /// Replace the whole task list
    pub fn update_tasks(&self, tasks: Vec<CaseTask>) {
        self.write_tasks(tasks);
    }

    // ---- team ----

    /// Add a team member, replacing any record for the same user
    pub fn add_team_member(&self, member: CaseAssignment, origin: Origin) {
        self.edit_team(|team| {
            match team.iter_mut().find(|m| m.user_id == member.user_id) {
                Some(existing) => *existing = member.clone(),
                None => team.push(member.clone()),
            }
            true
        });
        self.publish(origin, MessageKind::MemberAdded, json!(member));
    }

    /// Remove a user from the roster; a no-op when they are not on it
    pub fn remove_team_member(&self, user_id: UserId, origin: Origin) {
        let removed = self.edit_team(|team| {
            let before = team.len();
            team.retain(|m| m.user_id != user_id);
            team.len() != before
        });
        if removed {
            self.publish(origin, MessageKind::MemberRemoved, json!({ "userId": user_id }));
        }
    }

    /// Replace the whole roster
    pub fn update_team(&self, team: Vec<CaseAssignment>) {
        self.write_team(team);
    }

    /// Replace the navigation context
    pub fn set_navigation(&self, navigation: NavigationContext) {
        self.navigation.send_replace(navigation);
    }

    // ---- realtime ----

    /// Apply a message from the realtime transport
    ///
    /// Only messages whose `caseId` matches the current case are applied;
    /// everything else leaves the store untouched. Returns whether the
    /// message was applied.
    pub async fn apply_realtime(&self, message: &InboundMessage) -> bool {
        let Some(current) = self.current_case_id() else {
            return false;
        };
        if message.case_id != Some(current) {
            if message.kind.category().is_case_scoped() {
                tracing::debug!(
                    "ignoring {} for case {:?}; current case is {}",
                    message.kind,
                    message.case_id,
                    current
                );
            }
            return false;
        }

        match message.kind {
            MessageKind::CaseUpdated | MessageKind::CaseStatusChanged => {
                self.apply_case_update(current, &message.data)
            }
            MessageKind::CaseAssigned
            | MessageKind::AssignmentCreated
            | MessageKind::AssignmentUpdated
            | MessageKind::AssignmentRemoved => self.refetch_team(message.kind).await,
            MessageKind::TaskCreated => decode::<CaseTask>(&message.data)
                .map(|task| self.add_task(task, Origin::Remote))
                .is_some(),
            MessageKind::TaskUpdated
            | MessageKind::TaskAssigned
            | MessageKind::TaskStatusChanged => self.apply_task_update(message),
            MessageKind::TaskDeleted => match message.data_i64(&["taskId", "id"]) {
                Some(id) => {
                    self.remove_task(TaskId(id), Origin::Remote);
                    true
                }
                None => false,
            },
            MessageKind::MemberAdded => decode::<CaseAssignment>(&message.data)
                .map(|member| self.add_team_member(member, Origin::Remote))
                .is_some(),
            MessageKind::MemberRemoved => {
                let user = message
                    .data_i64(&["userId"])
                    .map(UserId)
                    .or(message.user_id);
                match user {
                    Some(user_id) => {
                        self.remove_team_member(user_id, Origin::Remote);
                        true
                    }
                    None => false,
                }
            }
            MessageKind::AssignmentSync(change) => {
                if change.is_task_change() {
                    message
                        .data
                        .get("entity")
                        .and_then(decode::<CaseTask>)
                        .is_some_and(|task| self.update_task(task, Origin::Remote))
                } else {
                    self.refetch_team(message.kind).await
                }
            }
            MessageKind::Notification
            | MessageKind::Alert
            | MessageKind::Reminder
            | MessageKind::DeadlineAlert
            | MessageKind::SystemMessage
            | MessageKind::Pong
            | MessageKind::Error => false,
        }
    }

    fn apply_case_update(&self, current: CaseId, data: &Value) -> bool {
        if let Some(case) = decode::<Case>(data).filter(|c| c.id == current) {
            self.case.send_replace(Some(case));
        } else if let Some(status) = data
            .get("status")
            .cloned()
            .and_then(|s| serde_json::from_value::<CaseStatus>(s).ok())
        {
            let changed = self.case.send_if_modified(|case| match case {
                Some(case) if case.id == current => {
                    case.status = status;
                    true
                }
                _ => false,
            });
            if !changed {
                return false;
            }
        } else {
            return false;
        }
        self.emit(ContextEvent::CaseUpdated(current));
        true
    }

    fn apply_task_update(&self, message: &InboundMessage) -> bool {
        if let Some(task) = decode::<CaseTask>(&message.data) {
            return self.update_task(task, Origin::Remote);
        }
        let Some(task_id) = message.data_i64(&["taskId", "id"]) else {
            return false;
        };
        decode::<TaskPatch>(&message.data)
            .and_then(|patch| self.patch_task(TaskId(task_id), &patch, Origin::Remote))
            .is_some()
    }

    async fn refetch_team(&self, kind: MessageKind) -> bool {
        match self.refresh_team().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("roster refresh after {} failed: {}", kind, e);
                false
            }
        }
    }

    // ---- reads ----

    /// Current case
    #[must_use]
    pub fn current_case(&self) -> Option<Case> {
        self.case.borrow().clone()
    }

    /// Current case id
    #[must_use]
    pub fn current_case_id(&self) -> Option<CaseId> {
        self.case.borrow().as_ref().map(|c| c.id)
    }

    /// Acting user
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        *self.current_user.borrow()
    }

    /// Roster snapshot
    #[must_use]
    pub fn team_snapshot(&self) -> Vec<CaseAssignment> {
        self.team.borrow().clone()
    }

    /// Task list snapshot
    #[must_use]
    pub fn tasks_snapshot(&self) -> Vec<CaseTask> {
        self.tasks.borrow().clone()
    }

    /// One task by id
    #[must_use]
    pub fn find_task(&self, task_id: TaskId) -> Option<CaseTask> {
        self.tasks.borrow().iter().find(|t| t.id == task_id).cloned()
    }

    /// Acting user's role on the current case
    #[must_use]
    pub fn user_role(&self) -> Option<CaseRoleType> {
        *self.user_role.borrow()
    }

    /// Navigation context
    #[must_use]
    pub fn navigation(&self) -> NavigationContext {
        self.navigation.borrow().clone()
    }

    /// Task summary
    #[must_use]
    pub fn task_summary(&self) -> TaskSummary {
        self.task_summary.borrow().clone()
    }

    /// Team summary
    #[must_use]
    pub fn team_summary(&self) -> TeamSummary {
        self.team_summary.borrow().clone()
    }

    /// Watch the current case
    #[must_use]
    pub fn watch_case(&self) -> watch::Receiver<Option<Case>> {
        self.case.subscribe()
    }

    /// Watch the roster
    #[must_use]
    pub fn watch_team(&self) -> watch::Receiver<Vec<CaseAssignment>> {
        self.team.subscribe()
    }

    /// Watch the task list
    #[must_use]
    pub fn watch_tasks(&self) -> watch::Receiver<Vec<CaseTask>> {
        self.tasks.subscribe()
    }

    /// Watch the acting user's role
    #[must_use]
    pub fn watch_user_role(&self) -> watch::Receiver<Option<CaseRoleType>> {
        self.user_role.subscribe()
    }

    /// Watch the navigation context
    #[must_use]
    pub fn watch_navigation(&self) -> watch::Receiver<NavigationContext> {
        self.navigation.subscribe()
    }

    /// Watch the task summary
    #[must_use]
    pub fn watch_task_summary(&self) -> watch::Receiver<TaskSummary> {
        self.task_summary.subscribe()
    }

    /// Watch the team summary
    #[must_use]
    pub fn watch_team_summary(&self) -> watch::Receiver<TeamSummary> {
        self.team_summary.subscribe()
    }

    /// Store-level change notifications
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    // ---- internals ----

    fn write_tasks(&self, tasks: Vec<CaseTask>) {
        self.edit_tasks(|slot| {
            *slot = tasks;
            true
        });
    }

    /// Edit the task list in place under the slot's write lock
    ///
    /// The summary is recomputed under the same lock, so concurrent writers
    /// never lose each other's edits or publish summaries out of order.
    fn edit_tasks(&self, edit: impl FnOnce(&mut Vec<CaseTask>) -> bool) -> bool {
        let changed = self.tasks.send_if_modified(|tasks| {
            if !edit(tasks) {
                return false;
            }
            self.task_summary.send_replace(TaskSummary::compute(
                tasks,
                chrono::Utc::now(),
                self.thresholds.due_soon_days,
            ));
            true
        });
        if changed {
            if let Some(case_id) = self.current_case_id() {
                self.emit(ContextEvent::TasksChanged(case_id));
            }
        }
        changed
    }

    fn write_team(&self, team: Vec<CaseAssignment>) {
        self.edit_team(|slot| {
            *slot = team;
            true
        });
    }

    /// Edit the roster in place under the slot's write lock; the team
    /// summary and the acting user's role follow under the same lock
    fn edit_team(&self, edit: impl FnOnce(&mut Vec<CaseAssignment>) -> bool) -> bool {
        let changed = self.team.send_if_modified(|team| {
            if !edit(team) {
                return false;
            }
            self.team_summary.send_replace(TeamSummary::compute(
                team,
                self.thresholds.light_threshold,
                self.thresholds.heavy_threshold,
            ));
            self.set_role(team);
            true
        });
        if changed {
            if let Some(case_id) = self.current_case_id() {
                self.emit(ContextEvent::TeamChanged(case_id));
            }
        }
        changed
    }

    fn recompute_role(&self) {
        // Holding the roster lock orders this against concurrent roster edits
        self.team.send_if_modified(|team| {
            self.set_role(team);
            false
        });
    }

    fn set_role(&self, team: &[CaseAssignment]) {
        let role = self.current_user().and_then(|user| {
            team.iter()
                .find(|m| m.user_id == user && m.active)
                .map(|m| m.role_type)
        });
        self.user_role.send_if_modified(|current| {
            let changed = *current != role;
            *current = role;
            changed
        });
    }

    fn publish(&self, origin: Origin, kind: MessageKind, data: Value) {
        if !origin.broadcasts() {
            return;
        }
        let (Some(broadcaster), Some(case_id)) = (&self.broadcaster, self.current_case_id()) else {
            return;
        };
        if !broadcaster.broadcast(OutboundMessage::of_kind(kind, data).for_case(case_id)) {
            tracing::debug!("{} for case {} not broadcast (transport closed)", kind, case_id);
        }
    }

    fn emit(&self, event: ContextEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

fn decode<T: DeserializeOwned>(data: &Value) -> Option<T> {
    match T::deserialize(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("realtime payload did not decode: {}", e);
            None
        }
    }
}
