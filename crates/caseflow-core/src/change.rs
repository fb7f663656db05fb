//! Assignment change commands and sync results

use caseflow_model::{CaseId, UserId};
use caseflow_realtime::ChangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Entity an assignment change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A case team
    Case,
    /// A task
    Task,
}

/// Who asked for a change, when, and from where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetadata {
    /// Acting user
    pub initiated_by: Option<UserId>,
    /// When the change was constructed
    pub timestamp: DateTime<Utc>,
    /// Free-form reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Originating component, e.g. `task-board`
    pub component: String,
}

impl ChangeMetadata {
    /// Metadata stamped now
    #[must_use]
    pub fn new(initiated_by: Option<UserId>, component: impl Into<String>) -> Self {
        Self {
            initiated_by,
            timestamp: Utc::now(),
            reason: None,
            component: component.into(),
        }
    }

    /// With reason
    #[inline]
    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// One unit of work for the sync orchestrator
///
/// Lives for the duration of one sync call and is broadcast to peers
/// alongside the server's returned entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentChange {
    /// Correlation id for logs
    pub id: Uuid,
    /// Kind of change
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Target entity id (case or task)
    pub entity_id: i64,
    /// Target entity type
    pub entity_type: EntityType,
    /// Case the change belongs to
    pub case_id: CaseId,
    /// User the change is for
    pub user_id: Option<UserId>,
    /// Displaced user, for reassignments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_user_id: Option<UserId>,
    /// Extra request data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_data: Option<Value>,
    /// Metadata
    pub metadata: ChangeMetadata,
}

impl AssignmentChange {
    /// Create a change
    #[must_use]
    pub fn new(
        kind: ChangeKind,
        entity_id: i64,
        case_id: CaseId,
        user_id: Option<UserId>,
        metadata: ChangeMetadata,
    ) -> Self {
        let entity_type = if kind.is_task_change() {
            EntityType::Task
        } else {
            EntityType::Case
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            entity_id,
            entity_type,
            case_id,
            user_id,
            previous_user_id: None,
            assignment_data: None,
            metadata,
        }
    }

    /// With displaced user
    #[inline]
    #[must_use]
    pub fn with_previous_user(mut self, previous: UserId) -> Self {
        self.previous_user_id = Some(previous);
        self
    }

    /// With request data
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.assignment_data = Some(data);
        self
    }

    /// Users touched by the change: the target, then the displaced user
    #[must_use]
    pub fn affected_users(&self) -> Vec<UserId> {
        self.user_id
            .into_iter()
            .chain(self.previous_user_id)
            .collect()
    }
}

/// Outcome of an orchestrator operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Whether the change was applied
    pub success: bool,
    /// User-facing failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Users the change touched; empty on failure
    pub affected_users: Vec<UserId>,
    /// Entity returned by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SyncResult {
    /// Success
    #[must_use]
    pub fn ok(affected_users: Vec<UserId>, data: Option<Value>) -> Self {
        Self {
            success: true,
            error: None,
            affected_users,
            data,
        }
    }

    /// Failure
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            affected_users: Vec::new(),
            data: None,
        }
    }
}
