//! Transfer requests: asking to move a case from one assignee to another

use crate::ids::{CaseId, TransferId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transfer request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Awaiting a decision
    #[default]
    Pending,
    /// Approved and applied
    Approved,
    /// Rejected
    Rejected,
    /// Withdrawn by the requester
    Cancelled,
}

/// How soon a transfer must be decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferUrgency {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
    /// Critical
    Critical,
}

/// A request to move a case between assignees, optionally requiring approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Backend id
    pub id: TransferId,
    /// Case being moved
    pub case_id: CaseId,
    /// Case title for display
    #[serde(default)]
    pub case_title: Option<String>,
    /// Current holder
    pub from_user_id: UserId,
    /// Current holder name
    #[serde(default)]
    pub from_user_name: Option<String>,
    /// Proposed holder
    pub to_user_id: UserId,
    /// Proposed holder name
    #[serde(default)]
    pub to_user_name: Option<String>,
    /// Justification
    #[serde(default)]
    pub reason: String,
    /// Urgency
    #[serde(default)]
    pub urgency: TransferUrgency,
    /// State
    #[serde(default)]
    pub status: TransferStatus,
    /// When it was raised
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

impl TransferRequest {
    /// Whether a decision is still outstanding
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }
}
