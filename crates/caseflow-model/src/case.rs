//! Case records

use crate::ids::CaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a legal matter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    /// Newly opened
    #[default]
    Open,
    /// Actively worked
    InProgress,
    /// Waiting on an external party
    Pending,
    /// Closed out
    Closed,
    /// Archived
    Archived,
    /// A status this client does not know about
    #[serde(other)]
    Unknown,
}

/// Case priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CasePriority {
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

/// The central legal-matter record that assignments and tasks attach to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    /// Backend id
    pub id: CaseId,
    /// Human-facing case number
    #[serde(default)]
    pub case_number: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Client display name
    #[serde(default)]
    pub client_name: String,
    /// Status
    #[serde(default)]
    pub status: CaseStatus,
    /// Priority
    #[serde(default)]
    pub priority: CasePriority,
    /// Practice area, free-form
    #[serde(rename = "type", default)]
    pub case_type: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Created at
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Updated at
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Case {
    /// Create a case with only the fields a caller cares about
    #[inline]
    #[must_use]
    pub fn new(id: CaseId, title: impl Into<String>) -> Self {
        Self {
            id,
            case_number: String::new(),
            title: title.into(),
            client_name: String::new(),
            status: CaseStatus::Open,
            priority: CasePriority::Medium,
            case_type: None,
            description: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// With case number
    #[inline]
    #[must_use]
    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.case_number = number.into();
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: CaseStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the case still accepts work
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !matches!(self.status, CaseStatus::Closed | CaseStatus::Archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_shape() {
        let case: Case = serde_json::from_value(serde_json::json!({
            "id": 10,
            "caseNumber": "2024-CR-001",
            "title": "State v. Doe",
            "clientName": "John Doe",
            "status": "IN_PROGRESS",
            "priority": "HIGH",
            "type": "CRIMINAL",
            "createdAt": "2024-01-02T03:04:05Z"
        }))
        .unwrap();

        assert_eq!(case.id, CaseId(10));
        assert_eq!(case.status, CaseStatus::InProgress);
        assert_eq!(case.priority, CasePriority::High);
        assert_eq!(case.case_type.as_deref(), Some("CRIMINAL"));
        assert!(case.updated_at.is_none());
    }

    #[test]
    fn unknown_status_does_not_fail_decode() {
        let case: Case =
            serde_json::from_value(serde_json::json!({"id": 1, "status": "ON_HOLD"})).unwrap();
        assert_eq!(case.status, CaseStatus::Unknown);
        assert!(case.is_open());
    }
}
