//! Case task records and the task status state machine

use crate::ids::{CaseId, TaskId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Task status
///
/// `TODO -> IN_PROGRESS -> REVIEW -> COMPLETED`, with `CANCELLED` reachable
/// from any non-terminal state. Transitions are not checked here; the backend
/// is authoritative and any status may be set to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started
    #[default]
    Todo,
    /// Being worked
    InProgress,
    /// Awaiting review
    Review,
    /// Done
    Completed,
    /// Abandoned
    Cancelled,
}

impl TaskStatus {
    /// Every status
    pub const ALL: [TaskStatus; 5] = [
        Self::Todo,
        Self::InProgress,
        Self::Review,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Statuses shown as Kanban columns, left to right
    pub const BOARD_COLUMNS: [TaskStatus; 4] =
        [Self::Todo, Self::InProgress, Self::Review, Self::Completed];

    /// Whether no further work happens in this state
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Wire name, e.g. `IN_PROGRESS`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task status: {s}"))
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
    /// Urgent
    Urgent,
}

impl TaskPriority {
    /// Every priority, lowest first
    pub const ALL: [TaskPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    /// High or urgent
    #[inline]
    #[must_use]
    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Legal research
    Research,
    /// Document drafting
    Drafting,
    /// Filing with a court
    Filing,
    /// Court appearance
    CourtAppearance,
    /// Client meeting
    ClientMeeting,
    /// Document review
    Review,
    /// Discovery
    Discovery,
    /// Anything else
    #[default]
    #[serde(other)]
    Other,
}

/// A unit of work on a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseTask {
    /// Backend id
    pub id: TaskId,
    /// Owning case
    pub case_id: CaseId,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Task kind
    #[serde(default)]
    pub task_type: TaskType,
    /// Priority
    #[serde(default)]
    pub priority: TaskPriority,
    /// Status
    #[serde(default)]
    pub status: TaskStatus,
    /// Due date
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Assignee
    #[serde(default)]
    pub assigned_to_id: Option<UserId>,
    /// Assignee display name
    #[serde(default)]
    pub assigned_to_name: Option<String>,
    /// Created at
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Updated at
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CaseTask {
    /// Create an unassigned `TODO` task
    #[inline]
    #[must_use]
    pub fn new(id: TaskId, case_id: CaseId, title: impl Into<String>) -> Self {
        Self {
            id,
            case_id,
            title: title.into(),
            description: None,
            task_type: TaskType::Other,
            priority: TaskPriority::Medium,
            status: TaskStatus::Todo,
            due_date: None,
            estimated_hours: None,
            tags: Vec::new(),
            assigned_to_id: None,
            assigned_to_name: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// With due date
    #[inline]
    #[must_use]
    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// With assignee
    #[inline]
    #[must_use]
    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.assigned_to_id = Some(user);
        self
    }

    /// With estimate
    #[inline]
    #[must_use]
    pub fn with_estimate(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    /// Still open for work
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Past due and not finished
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_date.is_some_and(|due| due < now)
    }

    /// Due on the same calendar day (UTC) and not finished
    #[must_use]
    pub fn is_due_today(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self
                .due_date
                .is_some_and(|due| due.date_naive() == now.date_naive())
    }

    /// Due between now and `days` from now, and not finished
    #[must_use]
    pub fn is_due_within(&self, now: DateTime<Utc>, days: i64) -> bool {
        let horizon = now + Duration::days(days);
        self.is_active()
            && self
                .due_date
                .is_some_and(|due| due >= now && due <= horizon)
    }
}

/// Partial task update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New priority
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// New due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// New assignee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<UserId>,
    /// New assignee display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_name: Option<String>,
}

impl TaskPatch {
    /// Patch that only sets the status
    #[inline]
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that only sets the assignee
    #[inline]
    #[must_use]
    pub fn assignee(user: UserId) -> Self {
        Self {
            assigned_to_id: Some(user),
            ..Self::default()
        }
    }

    /// Apply onto a task record in place
    pub fn apply_to(&self, task: &mut CaseTask) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(user) = self.assigned_to_id {
            task.assigned_to_id = Some(user);
        }
        if let Some(name) = &self.assigned_to_name {
            task.assigned_to_name = Some(name.clone());
        }
    }
}

/// Body of a create-task request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Owning case
    pub case_id: CaseId,
    /// Title
    pub title: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Task kind
    pub task_type: TaskType,
    /// Priority
    pub priority: TaskPriority,
    /// Due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Estimated effort in hours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    /// Initial assignee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<UserId>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskDraft {
    /// Minimal draft
    #[inline]
    #[must_use]
    pub fn new(case_id: CaseId, title: impl Into<String>) -> Self {
        Self {
            case_id,
            title: title.into(),
            description: None,
            task_type: TaskType::Other,
            priority: TaskPriority::Medium,
            due_date: None,
            estimated_hours: None,
            assigned_to_id: None,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn overdue_ignores_finished_tasks() {
        let past = now() - Duration::days(2);
        let task = CaseTask::new(TaskId(1), CaseId(1), "brief").with_due(past);
        assert!(task.is_overdue(now()));

        let done = task.with_status(TaskStatus::Completed);
        assert!(!done.is_overdue(now()));
    }

    #[test]
    fn due_today_and_due_soon() {
        let later_today = now() + Duration::hours(3);
        let task = CaseTask::new(TaskId(1), CaseId(1), "file").with_due(later_today);
        assert!(task.is_due_today(now()));
        assert!(task.is_due_within(now(), 3));

        let next_week =
            CaseTask::new(TaskId(2), CaseId(1), "x").with_due(now() + Duration::days(7));
        assert!(!next_week.is_due_within(now(), 3));
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut task = CaseTask::new(TaskId(1), CaseId(1), "draft motion")
            .with_priority(TaskPriority::High);
        TaskPatch::status(TaskStatus::Review).apply_to(&mut task);

        assert_eq!(task.status, TaskStatus::Review);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.title, "draft motion");
    }

    #[test]
    fn patch_serializes_sparse() {
        let json = serde_json::to_value(TaskPatch::status(TaskStatus::Completed)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "COMPLETED"}));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }
}
