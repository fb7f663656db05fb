//! Role-based access control collaborator

use crate::api::HttpBackend;
use crate::error::RbacError;
use async_trait::async_trait;
use caseflow_model::{unwrap_flag, CaseId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-scoped capabilities checked against the RBAC service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// View the case
    ViewCase,
    /// Edit case metadata
    EditCase,
    /// Delete the case
    DeleteCase,
    /// Add and remove team members
    ManageTeam,
    /// Assign the case to users
    AssignCase,
    /// View tasks
    ViewTasks,
    /// Create tasks
    CreateTasks,
    /// Edit tasks
    EditTasks,
    /// Delete tasks
    DeleteTasks,
    /// Assign tasks to users
    AssignTasks,
    /// Blanket task rights, including tasks owned by others
    ManageTasks,
    /// View documents
    ViewDocuments,
    /// Upload documents
    UploadDocuments,
    /// View billing
    ViewBilling,
}

impl Capability {
    /// Every capability, in summary order
    pub const ALL: [Capability; 14] = [
        Self::ViewCase,
        Self::EditCase,
        Self::DeleteCase,
        Self::ManageTeam,
        Self::AssignCase,
        Self::ViewTasks,
        Self::CreateTasks,
        Self::EditTasks,
        Self::DeleteTasks,
        Self::AssignTasks,
        Self::ManageTasks,
        Self::ViewDocuments,
        Self::UploadDocuments,
        Self::ViewBilling,
    ];

    /// `(resource, action)` pair understood by the RBAC service
    #[must_use]
    pub fn resource_action(self) -> (&'static str, &'static str) {
        match self {
            Self::ViewCase => ("CASE", "VIEW"),
            Self::EditCase => ("CASE", "EDIT"),
            Self::DeleteCase => ("CASE", "DELETE"),
            Self::ManageTeam => ("CASE", "MANAGE_TEAM"),
            Self::AssignCase => ("CASE", "ASSIGN"),
            Self::ViewTasks => ("TASK", "VIEW"),
            Self::CreateTasks => ("TASK", "CREATE"),
            Self::EditTasks => ("TASK", "EDIT"),
            Self::DeleteTasks => ("TASK", "DELETE"),
            Self::AssignTasks => ("TASK", "ASSIGN"),
            Self::ManageTasks => ("TASK", "MANAGE"),
            Self::ViewDocuments => ("DOCUMENT", "VIEW"),
            Self::UploadDocuments => ("DOCUMENT", "UPLOAD"),
            Self::ViewBilling => ("BILLING", "VIEW"),
        }
    }
}

/// The acting user's global permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissions {
    /// System administrators hold every capability
    #[serde(default)]
    pub is_admin: bool,
    /// Global roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Global `RESOURCE:ACTION` grants
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserPermissions {
    /// Administrator
    #[must_use]
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::default()
        }
    }

    /// With a global grant
    #[must_use]
    pub fn with_grant(mut self, resource: &str, action: &str) -> Self {
        self.permissions.push(format!("{resource}:{action}"));
        self
    }

    /// Whether a global grant covers `(resource, action)`
    #[must_use]
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.is_admin
            || self.permissions.iter().any(|p| {
                p.split_once(':').is_some_and(|(r, a)| {
                    r.eq_ignore_ascii_case(resource) && (a == "*" || a.eq_ignore_ascii_case(action))
                })
            })
    }
}

/// Permission checks against the RBAC service
#[async_trait]
pub trait RbacService: Send + Sync + fmt::Debug {
    /// Whether the acting user may perform `action` on `resource` within a case
    async fn has_case_permission(
        &self,
        case_id: CaseId,
        resource: &str,
        action: &str,
    ) -> Result<bool, RbacError>;
}

/// [`RbacService`] over the backend permission endpoint
#[derive(Debug, Clone)]
pub struct HttpRbac {
    backend: HttpBackend,
}

impl HttpRbac {
    /// Create over a shared backend client
    #[must_use]
    pub fn new(backend: HttpBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RbacService for HttpRbac {
    async fn has_case_permission(
        &self,
        case_id: CaseId,
        resource: &str,
        action: &str,
    ) -> Result<bool, RbacError> {
        let body = self
            .backend
            .get(&format!(
                "rbac/cases/{case_id}/check?resource={resource}&action={action}"
            ))
            .await?;
        Ok(unwrap_flag(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourteen_distinct_capabilities() {
        let pairs: std::collections::HashSet<_> =
            Capability::ALL.iter().map(|c| c.resource_action()).collect();
        assert_eq!(pairs.len(), 14);
    }

    #[test]
    fn grants_match_resource_and_action() {
        let perms = UserPermissions::default()
            .with_grant("task", "edit")
            .with_grant("BILLING", "*");
        assert!(perms.grants("TASK", "EDIT"));
        assert!(perms.grants("BILLING", "VIEW"));
        assert!(!perms.grants("TASK", "DELETE"));
        assert!(UserPermissions::admin().grants("CASE", "DELETE"));
    }
}
