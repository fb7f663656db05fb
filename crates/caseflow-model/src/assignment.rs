//! Case team membership records

use crate::ids::{AssignmentId, CaseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a user plays on a case team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseRoleType {
    /// Lead attorney
    LeadAttorney,
    /// Supporting attorney
    SupportingAttorney,
    /// Co-counsel
    CoCounsel,
    /// Associate
    Associate,
    /// Paralegal
    Paralegal,
    /// Legal assistant
    LegalAssistant,
    /// Secretary
    Secretary,
    /// Consultant
    Consultant,
    /// Case manager
    CaseManager,
}

impl CaseRoleType {
    /// Every role, in display order
    pub const ALL: [CaseRoleType; 9] = [
        Self::LeadAttorney,
        Self::SupportingAttorney,
        Self::CoCounsel,
        Self::Associate,
        Self::Paralegal,
        Self::LegalAssistant,
        Self::Secretary,
        Self::Consultant,
        Self::CaseManager,
    ];

    /// Human-readable name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::LeadAttorney => "Lead Attorney",
            Self::SupportingAttorney => "Supporting Attorney",
            Self::CoCounsel => "Co-Counsel",
            Self::Associate => "Associate",
            Self::Paralegal => "Paralegal",
            Self::LegalAssistant => "Legal Assistant",
            Self::Secretary => "Secretary",
            Self::Consultant => "Consultant",
            Self::CaseManager => "Case Manager",
        }
    }

    /// Whether the role is held by a licensed attorney
    #[must_use]
    pub fn is_attorney(self) -> bool {
        matches!(
            self,
            Self::LeadAttorney | Self::SupportingAttorney | Self::CoCounsel | Self::Associate
        )
    }

    /// Wire name, e.g. `LEAD_ATTORNEY`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeadAttorney => "LEAD_ATTORNEY",
            Self::SupportingAttorney => "SUPPORTING_ATTORNEY",
            Self::CoCounsel => "CO_COUNSEL",
            Self::Associate => "ASSOCIATE",
            Self::Paralegal => "PARALEGAL",
            Self::LegalAssistant => "LEGAL_ASSISTANT",
            Self::Secretary => "SECRETARY",
            Self::Consultant => "CONSULTANT",
            Self::CaseManager => "CASE_MANAGER",
        }
    }
}

impl std::str::FromStr for CaseRoleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown case role: {s}"))
    }
}

/// How a membership was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    /// Primary responsibility
    #[default]
    Primary,
    /// Secondary responsibility
    Secondary,
    /// Temporary cover
    Temporary,
    /// Oversight only
    Oversight,
}

/// A (case, user, role) membership record with a workload weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseAssignment {
    /// Backend id
    pub id: AssignmentId,
    /// Case
    pub case_id: CaseId,
    /// Member
    pub user_id: UserId,
    /// Member display name
    #[serde(default)]
    pub user_name: Option<String>,
    /// Member email
    #[serde(default)]
    pub user_email: Option<String>,
    /// Role on the case
    pub role_type: CaseRoleType,
    /// Assignment kind
    #[serde(default)]
    pub assignment_type: AssignmentType,
    /// Whether the membership is current
    #[serde(default = "default_active")]
    pub active: bool,
    /// Heuristic load figure, 0-100+
    #[serde(default)]
    pub workload_weight: Option<u32>,
    /// Effective from
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl CaseAssignment {
    /// Create an active primary assignment
    #[inline]
    #[must_use]
    pub fn new(
        id: AssignmentId,
        case_id: CaseId,
        user_id: UserId,
        role_type: CaseRoleType,
    ) -> Self {
        Self {
            id,
            case_id,
            user_id,
            user_name: None,
            user_email: None,
            role_type,
            assignment_type: AssignmentType::Primary,
            active: true,
            workload_weight: None,
            effective_from: None,
        }
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// With workload weight
    #[inline]
    #[must_use]
    pub fn with_workload(mut self, weight: u32) -> Self {
        self.workload_weight = Some(weight);
        self
    }

    /// Workload weight, zero when the backend sent none
    #[inline]
    #[must_use]
    pub fn workload(&self) -> u32 {
        self.workload_weight.unwrap_or(0)
    }

    /// Name to show, falling back to the user id
    #[must_use]
    pub fn display_name(&self) -> String {
        self.user_name
            .clone()
            .unwrap_or_else(|| format!("User {}", self.user_id))
    }
}

/// Body of an assign-user-to-case request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseAssignmentRequest {
    /// Case
    pub case_id: CaseId,
    /// User to add
    pub user_id: UserId,
    /// Role on the case
    pub role_type: CaseRoleType,
    /// Assignment kind
    pub assignment_type: AssignmentType,
    /// Initial workload weight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_weight: Option<u32>,
    /// Free-form notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Body of a case transfer (reassignment) request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseTransferRequest {
    /// Case
    pub case_id: CaseId,
    /// Current holder
    pub from_user_id: UserId,
    /// New holder
    pub to_user_id: UserId,
    /// Why the case moves
    pub reason: String,
    /// Role the new holder takes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_type: Option<CaseRoleType>,
}
