//! Caseflow core - case and task assignment synchronization
//!
//! Keeps every open session's view of a case consistent while users assign,
//! reassign and update work on it:
//! - A case context store holding the open case, its team and its tasks
//! - An assignment orchestrator that persists changes, notifies affected
//!   users and broadcasts to peer sessions
//! - Per-case permission resolution with a short-lived action cache
//! - Dashboard and Kanban view-models over the store
//! - Advisory workload heuristics
//!
//! # Example
//!
//! ```rust,ignore
//! use caseflow_core::prelude::*;
//! use caseflow_realtime::MemoryTokenStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaseflowConfig::default();
//! let tokens = Arc::new(MemoryTokenStore::new(Some("jwt".into())));
//! let session = CaseSession::new(&config, Collaborators::http(&config, tokens)?);
//! session.start();
//! session.connect().await?;
//! session.open_case(CaseId(10)).await?;
//!
//! let result = session.sync().assign_task_to_user(5, 7, 10).await;
//! println!("ok: {}", result.success);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod api;
pub mod board;
pub mod change;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod heuristics;
pub mod notify;
pub mod permissions;
pub mod rbac;
pub mod session;
pub mod summary;
pub mod sync;

pub use api::{CaseApi, HttpBackend, HttpCaseApi};
pub use board::{BoardColumn, BoardFilter, TaskBoard};
pub use change::{AssignmentChange, ChangeMetadata, EntityType, SyncResult};
pub use config::{ApiConfig, CaseflowConfig, PermissionConfig, WorkloadConfig};
pub use context::{CaseContextStore, ContextEvent, NavigationContext, Origin};
pub use dashboard::{AssignmentDashboard, DashboardState};
pub use error::{ApiError, CaseflowError, ConfigError, NotifyError, RbacError, DEFAULT_SYNC_ERROR};
pub use notify::{
    AutoConfirm, Confirm, Feedback, HttpNotifier, NotificationKind, NotificationPriority,
    Notifier, TracingFeedback, UserNotification,
};
pub use permissions::{task_permissions, CasePermissionSummary, PermissionResolver, TaskPermissions};
pub use rbac::{Capability, HttpRbac, RbacService, UserPermissions};
pub use session::{CaseSession, Collaborators, TaskGuard};
pub use summary::{TaskSummary, TeamSummary, WorkloadBand};
pub use sync::{AssignmentOptions, AssignmentSync};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Caseflow core
    pub use crate::{
        AssignmentOptions, AssignmentSync, CaseContextStore, CaseSession, CaseflowConfig,
        CaseflowError, Collaborators, Origin, PermissionResolver, SyncResult, TaskBoard,
    };
    pub use caseflow_model::{CaseId, CaseRoleType, CaseTask, IdInput, TaskId, TaskStatus, UserId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
