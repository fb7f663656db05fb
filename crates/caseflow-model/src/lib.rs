//! Caseflow data model
//!
//! Plain records for the case-management backend:
//! - Backend-issued ids and the raw-id validator
//! - Cases, team assignments, tasks and transfer requests
//! - Users and workload figures
//! - Response envelope normalization shared by every REST consumer
//!
//! None of these records own a persistent identity beyond the ids the
//! backend issues; everything here is rebuilt from the backend on reload.

#![warn(unreachable_pub)]

pub mod assignment;
pub mod case;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod task;
pub mod transfer;
pub mod user;

pub use assignment::{
    AssignmentType, CaseAssignment, CaseAssignmentRequest, CaseRoleType, CaseTransferRequest,
};
pub use case::{Case, CasePriority, CaseStatus};
pub use envelope::{unwrap_entity, unwrap_flag, unwrap_list};
pub use error::ModelError;
pub use ids::{AssignmentId, CaseId, IdInput, TaskId, TransferId, UserId};
pub use task::{CaseTask, TaskDraft, TaskPatch, TaskPriority, TaskStatus, TaskType};
pub use transfer::{TransferRequest, TransferStatus, TransferUrgency};
pub use user::{User, UserWorkload};
