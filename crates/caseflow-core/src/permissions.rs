//! Permission resolver
//!
//! Keeps one [`CasePermissionSummary`] for the acting user on the current
//! case. The summary is recomputed only when the (case, case role, global
//! permissions) triple changes; recomputation fans out one RBAC check per
//! [`Capability`] in parallel, skipping checks a global grant already
//! answers. One-off [`PermissionResolver::can_perform_action`] queries go
//! through a separate short-lived cache.

use crate::config::PermissionConfig;
use crate::context::CaseContextStore;
use crate::rbac::{Capability, RbacService, UserPermissions};
use caseflow_model::{Case, CaseId, CaseRoleType, CaseTask, TaskStatus, UserId};
use futures::future::join_all;
use moka::future::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Capabilities of the acting user on the current case
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct CasePermissionSummary {
    /// View the case
    pub can_view: bool,
    /// Edit case metadata
    pub can_edit: bool,
    /// Delete the case
    pub can_delete: bool,
    /// Add and remove team members
    pub can_manage_team: bool,
    /// Assign the case
    pub can_assign: bool,
    /// View tasks
    pub can_view_tasks: bool,
    /// Create tasks
    pub can_create_tasks: bool,
    /// Edit tasks
    pub can_edit_tasks: bool,
    /// Delete tasks
    pub can_delete_tasks: bool,
    /// Assign tasks
    pub can_assign_tasks: bool,
    /// Blanket task rights
    pub can_manage_tasks: bool,
    /// View documents
    pub can_view_documents: bool,
    /// Upload documents
    pub can_upload_documents: bool,
    /// View billing
    pub can_view_billing: bool,
    /// Lead attorney on the case
    pub is_lead_attorney: bool,
    /// Case manager on the case
    pub is_case_manager: bool,
}

impl CasePermissionSummary {
    /// Build from per-capability results and the case role
    #[must_use]
    pub fn from_checks(granted: &[(Capability, bool)], role: Option<CaseRoleType>) -> Self {
        let mut summary = Self {
            is_lead_attorney: role == Some(CaseRoleType::LeadAttorney),
            is_case_manager: role == Some(CaseRoleType::CaseManager),
            ..Self::default()
        };
        for (capability, allowed) in granted {
            *summary.slot(*capability) = *allowed;
        }
        summary
    }

    /// Whether `capability` is held
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewCase => self.can_view,
            Capability::EditCase => self.can_edit,
            Capability::DeleteCase => self.can_delete,
            Capability::ManageTeam => self.can_manage_team,
            Capability::AssignCase => self.can_assign,
            Capability::ViewTasks => self.can_view_tasks,
            Capability::CreateTasks => self.can_create_tasks,
            Capability::EditTasks => self.can_edit_tasks,
            Capability::DeleteTasks => self.can_delete_tasks,
            Capability::AssignTasks => self.can_assign_tasks,
            Capability::ManageTasks => self.can_manage_tasks,
            Capability::ViewDocuments => self.can_view_documents,
            Capability::UploadDocuments => self.can_upload_documents,
            Capability::ViewBilling => self.can_view_billing,
        }
    }

    fn slot(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::ViewCase => &mut self.can_view,
            Capability::EditCase => &mut self.can_edit,
            Capability::DeleteCase => &mut self.can_delete,
            Capability::ManageTeam => &mut self.can_manage_team,
            Capability::AssignCase => &mut self.can_assign,
            Capability::ViewTasks => &mut self.can_view_tasks,
            Capability::CreateTasks => &mut self.can_create_tasks,
            Capability::EditTasks => &mut self.can_edit_tasks,
            Capability::DeleteTasks => &mut self.can_delete_tasks,
            Capability::AssignTasks => &mut self.can_assign_tasks,
            Capability::ManageTasks => &mut self.can_manage_tasks,
            Capability::ViewDocuments => &mut self.can_view_documents,
            Capability::UploadDocuments => &mut self.can_upload_documents,
            Capability::ViewBilling => &mut self.can_view_billing,
        }
    }
}

/// What the acting user may do with one task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct TaskPermissions {
    /// View the task
    pub can_view: bool,
    /// Edit the task
    pub can_edit: bool,
    /// Delete the task
    pub can_delete: bool,
    /// Change the task's status
    pub can_update_status: bool,
    /// Reassign the task
    pub can_assign: bool,
}

/// Derive task-level permissions
///
/// - edit: blanket task rights, or assignee with edit rights
/// - delete: delete rights, or lead attorney who is also the assignee
/// - status: blocked only for a completed task when the user has neither
///   blanket rights nor the assignment
/// - view: whenever the case is viewable
#[must_use]
pub fn task_permissions(
    summary: &CasePermissionSummary,
    task: &CaseTask,
    user: Option<UserId>,
) -> TaskPermissions {
    let is_assignee = user.is_some() && task.assigned_to_id == user;
    let blanket = summary.can_manage_tasks;

    TaskPermissions {
        can_view: summary.can_view,
        can_edit: blanket || (is_assignee && summary.can_edit_tasks),
        can_delete: summary.can_delete_tasks || (summary.is_lead_attorney && is_assignee),
        can_update_status: !(!blanket && task.status == TaskStatus::Completed && !is_assignee),
        can_assign: summary.can_assign_tasks,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolutionKey {
    case_id: Option<CaseId>,
    role: Option<CaseRoleType>,
    permissions: UserPermissions,
}

/// Releases a claimed key when its refresh is dropped before publishing
struct KeyClaim<'a> {
    slot: &'a Mutex<Option<ResolutionKey>>,
    key: Option<ResolutionKey>,
}

impl Drop for KeyClaim<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut slot = self.slot.lock();
        if slot.as_ref() == Some(&key) {
            *slot = None;
        }
    }
}

/// Resolves and caches the acting user's case permissions
#[derive(Debug)]
pub struct PermissionResolver {
    rbac: Arc<dyn RbacService>,
    summary: watch::Sender<CasePermissionSummary>,
    last_key: Mutex<Option<ResolutionKey>>,
    action_cache: Cache<String, bool>,
}

impl PermissionResolver {
    /// Create a resolver with an empty (deny-all) summary
    #[must_use]
    pub fn new(rbac: Arc<dyn RbacService>, config: PermissionConfig) -> Self {
        Self {
            rbac,
            summary: watch::Sender::new(CasePermissionSummary::default()),
            last_key: Mutex::new(None),
            action_cache: Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(config.cache_ttl())
                .build(),
        }
    }

    /// Recompute the summary for a (case, role, permissions) triple
    ///
    /// Returns `false` without any RBAC call when the triple is unchanged.
    /// A failed check counts as denied.
    pub async fn refresh(
        &self,
        case: Option<&Case>,
        role: Option<CaseRoleType>,
        permissions: &UserPermissions,
    ) -> bool {
        let key = ResolutionKey {
            case_id: case.map(|c| c.id),
            role,
            permissions: permissions.clone(),
        };
        {
            let mut last = self.last_key.lock();
            if last.as_ref() == Some(&key) {
                return false;
            }
            *last = Some(key.clone());
        }
        let mut claim = KeyClaim {
            slot: &self.last_key,
            key: Some(key.clone()),
        };

        let summary = match key.case_id {
            None => CasePermissionSummary::default(),
            Some(case_id) => self.resolve(case_id, role, permissions).await,
        };

        // A newer triple may have been requested while checks were in flight
        if self.last_key.lock().as_ref() != Some(&key) {
            return false;
        }
        tracing::debug!("permissions resolved for case {:?}: {:?}", key.case_id, summary);
        self.summary.send_replace(summary);
        claim.key = None;
        true
    }

    async fn resolve(
        &self,
        case_id: CaseId,
        role: Option<CaseRoleType>,
        permissions: &UserPermissions,
    ) -> CasePermissionSummary {
        if permissions.is_admin {
            let all: Vec<_> = Capability::ALL.iter().map(|c| (*c, true)).collect();
            return CasePermissionSummary::from_checks(&all, role);
        }

        let checks = Capability::ALL.iter().map(|capability| async move {
            let (resource, action) = capability.resource_action();
            if permissions.grants(resource, action) {
                return (*capability, true);
            }
            let allowed = self
                .rbac
                .has_case_permission(case_id, resource, action)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("permission check {}:{} failed: {}", resource, action, e);
                    false
                });
            (*capability, allowed)
        });

        let granted = join_all(checks).await;
        CasePermissionSummary::from_checks(&granted, role)
    }

    /// Current summary
    #[must_use]
    pub fn summary(&self) -> CasePermissionSummary {
        *self.summary.borrow()
    }

    /// Watch the summary
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CasePermissionSummary> {
        self.summary.subscribe()
    }

    /// One-off check, cached per `caseId_resource_action`
    ///
    /// Failed checks are denied and not cached.
    pub async fn can_perform_action(&self, case_id: CaseId, resource: &str, action: &str) -> bool {
        let key = format!("{case_id}_{resource}_{action}");
        if let Some(allowed) = self.action_cache.get(&key).await {
            return allowed;
        }

        match self.rbac.has_case_permission(case_id, resource, action).await {
            Ok(allowed) => {
                self.action_cache.insert(key, allowed).await;
                allowed
            }
            Err(e) => {
                tracing::warn!("permission check {} failed: {}", key, e);
                false
            }
        }
    }

    /// Drop all cached one-off results
    pub fn invalidate_actions(&self) {
        self.action_cache.invalidate_all();
    }

    /// Keep the summary in step with a context store and a permissions source
    ///
    /// The returned task runs until aborted or until every source closes.
    pub fn bind(
        self: &Arc<Self>,
        store: &CaseContextStore,
        mut permissions: watch::Receiver<UserPermissions>,
    ) -> JoinHandle<()> {
        let mut case_rx = store.watch_case();
        let mut role_rx = store.watch_user_role();
        let resolver = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let case = case_rx.borrow_and_update().clone();
                let role = *role_rx.borrow_and_update();
                let perms = permissions.borrow_and_update().clone();
                resolver.refresh(case.as_ref(), role, &perms).await;

                let open = tokio::select! {
                    r = case_rx.changed() => r.is_ok(),
                    r = role_rx.changed() => r.is_ok(),
                    r = permissions.changed() => r.is_ok(),
                };
                if !open {
                    break;
                }
            }
        })
    }
}
