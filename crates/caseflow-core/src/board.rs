//! Kanban task board view-model
//!
//! Four columns, one per non-cancelled status. Moving a card splices it into
//! the target column immediately and then asks the orchestrator to persist
//! the status; if that fails the columns are restored from the snapshot
//! taken before the move.

use crate::api::CaseApi;
use crate::change::SyncResult;
use crate::context::{CaseContextStore, Origin};
use crate::error::CaseflowError;
use crate::notify::{Confirm, Feedback};
use crate::permissions::{task_permissions, PermissionResolver};
use crate::sync::AssignmentSync;
use caseflow_model::{CaseTask, TaskDraft, TaskId, TaskPriority, TaskStatus, UserId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One board column
#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn {
    /// Status the column represents
    pub status: TaskStatus,
    /// Cards, top to bottom
    pub tasks: Vec<CaseTask>,
}

/// Card filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    /// Only this assignee's cards
    pub assignee: Option<UserId>,
    /// Only this priority
    pub priority: Option<TaskPriority>,
    /// Case-insensitive title/description match
    pub search: Option<String>,
}

impl BoardFilter {
    fn matches(&self, task: &CaseTask) -> bool {
        if self.assignee.is_some() && task.assigned_to_id != self.assignee {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

fn build_columns(tasks: &[CaseTask], filter: &BoardFilter) -> Vec<BoardColumn> {
    TaskStatus::BOARD_COLUMNS
        .iter()
        .map(|status| BoardColumn {
            status: *status,
            tasks: tasks
                .iter()
                .filter(|t| t.status == *status && filter.matches(t))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Kanban board over the context store's task list
#[derive(Debug)]
pub struct TaskBoard {
    api: Arc<dyn CaseApi>,
    store: Arc<CaseContextStore>,
    sync: Arc<AssignmentSync>,
    feedback: Arc<dyn Feedback>,
    confirm: Arc<dyn Confirm>,
    permissions: Option<Arc<PermissionResolver>>,
    filter: Mutex<BoardFilter>,
    columns: watch::Sender<Vec<BoardColumn>>,
}

impl TaskBoard {
    /// Create a board and build its columns from the store
    #[must_use]
    pub fn new(
        api: Arc<dyn CaseApi>,
        store: Arc<CaseContextStore>,
        sync: Arc<AssignmentSync>,
        feedback: Arc<dyn Feedback>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let columns = build_columns(&store.tasks_snapshot(), &BoardFilter::default());
        Self {
            api,
            store,
            sync,
            feedback,
            confirm,
            permissions: None,
            filter: Mutex::new(BoardFilter::default()),
            columns: watch::Sender::new(columns),
        }
    }

    /// Gate moves on the acting user's task permissions
    #[must_use]
    pub fn with_permissions(mut self, resolver: Arc<PermissionResolver>) -> Self {
        self.permissions = Some(resolver);
        self
    }

    /// Current columns
    #[must_use]
    pub fn columns(&self) -> Vec<BoardColumn> {
        self.columns.borrow().clone()
    }

    /// Watch the columns
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Vec<BoardColumn>> {
        self.columns.subscribe()
    }

    /// Cards in one column
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> Vec<CaseTask> {
        self.columns
            .borrow()
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.tasks.clone())
            .unwrap_or_default()
    }

    /// Replace the filter and rebuild
    pub fn set_filter(&self, filter: BoardFilter) {
        *self.filter.lock() = filter;
        self.refresh();
    }

    /// Rebuild columns from the store
    pub fn refresh(&self) {
        let filter = self.filter.lock().clone();
        self.columns
            .send_replace(build_columns(&self.store.tasks_snapshot(), &filter));
    }

    /// Rebuild whenever the store's task list changes
    pub fn bind(self: &Arc<Self>) -> JoinHandle<()> {
        let mut tasks = self.store.watch_tasks();
        let board = Arc::downgrade(self);
        tokio::spawn(async move {
            while tasks.changed().await.is_ok() {
                let Some(board) = board.upgrade() else {
                    break;
                };
                board.refresh();
            }
        })
    }

    /// Drop a card into `to` at `index` (end of column when `None`)
    ///
    /// Moving within a column only reorders. Moving across columns persists
    /// the new status; on failure the board is restored and the error shown.
    pub async fn move_task(
        &self,
        task_id: TaskId,
        to: TaskStatus,
        index: Option<usize>,
    ) -> SyncResult {
        let Some(case_id) = self.store.current_case_id() else {
            return SyncResult::failed(CaseflowError::NoCurrentCase.to_string());
        };
        if to == TaskStatus::Cancelled {
            return SyncResult::failed("cancelled tasks are not shown on the board");
        }

        let snapshot = self.columns();
        let Some(task) = snapshot
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| t.id == task_id)
            .cloned()
        else {
            return SyncResult::failed(format!("task {task_id} is not on the board"));
        };

        if let Some(resolver) = &self.permissions {
            let allowed = task_permissions(&resolver.summary(), &task, self.store.current_user());
            if task.status != to && !allowed.can_update_status {
                let message = "You do not have permission to change this task's status";
                self.feedback.error(message);
                return SyncResult::failed(message);
            }
        }

        let from = task.status;
        self.columns.send_modify(|columns| {
            for column in columns.iter_mut() {
                column.tasks.retain(|t| t.id != task_id);
            }
            if let Some(column) = columns.iter_mut().find(|c| c.status == to) {
                let mut moved = task.clone();
                moved.status = to;
                let at = index.unwrap_or(column.tasks.len()).min(column.tasks.len());
                column.tasks.insert(at, moved);
            }
        });

        if from == to {
            return SyncResult::ok(Vec::new(), None);
        }

        let result = self.sync.update_task_status(task_id, to, case_id).await;
        if result.success {
            self.feedback
                .success(&format!("Task moved to {}", to.as_str().replace('_', " ")));
        } else {
            tracing::warn!("reverting move of task {} to {}", task_id, to.as_str());
            self.columns.send_replace(snapshot);
            self.feedback.error(
                result
                    .error
                    .as_deref()
                    .unwrap_or("Failed to update task status"),
            );
        }
        result
    }

    /// Create a task on the current case
    ///
    /// # Errors
    /// `NoCurrentCase`, or the REST error (also shown as a toast).
    pub async fn create_task(&self, draft: TaskDraft) -> Result<CaseTask, CaseflowError> {
        if self.store.current_case_id() != Some(draft.case_id) {
            return Err(CaseflowError::NoCurrentCase);
        }
        match self.api.create_task(&draft).await {
            Ok(task) => {
                self.store.add_task(task.clone(), Origin::Local);
                self.refresh();
                self.feedback.success("Task created");
                Ok(task)
            }
            Err(e) => {
                self.feedback.error(&e.user_message());
                Err(e.into())
            }
        }
    }

    /// Delete a task after confirmation
    ///
    /// # Errors
    /// `Cancelled` when the user declines (no request is made), or the REST
    /// error.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<(), CaseflowError> {
        let title = self
            .store
            .find_task(task_id)
            .map_or_else(|| format!("task {task_id}"), |t| t.title);
        if !self
            .confirm
            .confirm("Delete task", &format!("Delete \"{title}\"? This cannot be undone."))
            .await
        {
            return Err(CaseflowError::Cancelled);
        }

        match self.api.delete_task(task_id).await {
            Ok(()) => {
                self.store.remove_task(task_id, Origin::Local);
                self.refresh();
                self.feedback.success("Task deleted");
                Ok(())
            }
            Err(e) => {
                self.feedback.error(&e.user_message());
                Err(e.into())
            }
        }
    }
}
