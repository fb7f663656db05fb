//! Assignment dashboard view-model
//!
//! Loads everything the dashboard shows in one fan-out join. Each branch
//! falls back to an empty default on failure so one broken endpoint never
//! blanks the whole screen.

use crate::api::CaseApi;
use crate::change::SyncResult;
use crate::error::CaseflowError;
use crate::heuristics::{rank_candidates, Candidate, RankedCandidate};
use crate::notify::{Confirm, Feedback};
use crate::sync::{AssignmentOptions, AssignmentSync};
use caseflow_model::{
    Case, CaseAssignment, CaseId, CaseRoleType, IdInput, TransferId, TransferRequest, User,
    UserId, UserWorkload,
};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the dashboard renders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// Cases
    pub cases: Vec<Case>,
    /// Assignable attorneys
    pub attorneys: Vec<User>,
    /// Every assignment
    pub all_assignments: Vec<CaseAssignment>,
    /// The acting user's assignments
    pub my_assignments: Vec<CaseAssignment>,
    /// The acting user's workload figures
    pub workload: UserWorkload,
    /// Transfer requests awaiting a decision
    pub pending_transfers: Vec<TransferRequest>,
    /// Initial load in progress
    pub loading: bool,
}

async fn or_default<T, F>(what: &str, call: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, crate::error::ApiError>>,
{
    call.await.unwrap_or_else(|e| {
        tracing::warn!("dashboard: failed to load {}: {}", what, e);
        T::default()
    })
}

/// Replace the record for the same (case, user) pair, else append
fn upsert_assignment(list: &mut Vec<CaseAssignment>, assignment: CaseAssignment) {
    match list
        .iter_mut()
        .find(|a| a.case_id == assignment.case_id && a.user_id == assignment.user_id)
    {
        Some(existing) => *existing = assignment,
        None => list.push(assignment),
    }
}

/// Assignment dashboard for one acting user
#[derive(Debug)]
pub struct AssignmentDashboard {
    api: Arc<dyn CaseApi>,
    sync: Arc<AssignmentSync>,
    feedback: Arc<dyn Feedback>,
    confirm: Arc<dyn Confirm>,
    current_user: UserId,
    state: watch::Sender<DashboardState>,
}

impl AssignmentDashboard {
    /// Create an empty dashboard
    #[must_use]
    pub fn new(
        api: Arc<dyn CaseApi>,
        sync: Arc<AssignmentSync>,
        feedback: Arc<dyn Feedback>,
        confirm: Arc<dyn Confirm>,
        current_user: UserId,
    ) -> Self {
        Self {
            api,
            sync,
            feedback,
            confirm,
            current_user,
            state: watch::Sender::new(DashboardState::default()),
        }
    }

    /// Load cases, attorneys, all assignments, my assignments and my
    /// workload in parallel
    ///
    /// When the backend returns no assignments for the acting user, they are
    /// derived by filtering all assignments.
    pub async fn load_initial_data(&self) {
        self.state.send_modify(|s| s.loading = true);
        let me = self.current_user;

        let (cases, attorneys, all_assignments, mut my_assignments, workload) = futures::join!(
            or_default("cases", self.api.list_cases()),
            or_default("attorneys", self.api.attorneys()),
            or_default("assignments", self.api.all_assignments()),
            or_default("my assignments", self.api.user_assignments(me)),
            or_default("workload", self.api.user_workload(me)),
        );

        if my_assignments.is_empty() {
            my_assignments = all_assignments
                .iter()
                .filter(|a| a.user_id == me)
                .cloned()
                .collect();
        }

        tracing::info!(
            "dashboard loaded: {} cases, {} assignments ({} mine)",
            cases.len(),
            all_assignments.len(),
            my_assignments.len()
        );
        self.state.send_modify(|s| {
            s.cases = cases;
            s.attorneys = attorneys;
            s.all_assignments = all_assignments;
            s.my_assignments = my_assignments;
            s.workload = workload;
            s.loading = false;
        });
    }

    /// Load pending transfer requests
    pub async fn load_pending_transfers(&self) {
        let pending = or_default("pending transfers", self.api.pending_transfers()).await;
        self.state.send_modify(|s| s.pending_transfers = pending);
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Watch the state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// The acting user's assignments
    #[must_use]
    pub fn my_assignments(&self) -> Vec<CaseAssignment> {
        self.state.borrow().my_assignments.clone()
    }

    /// Sum of the acting user's assignment weights; a missing weight is 0
    #[must_use]
    pub fn my_total_workload(&self) -> u32 {
        self.state
            .borrow()
            .my_assignments
            .iter()
            .map(CaseAssignment::workload)
            .sum()
    }

    /// Attorneys ranked for a role, weighted by their current assignments
    #[must_use]
    pub fn recommend_attorneys(&self, role: Option<CaseRoleType>) -> Vec<RankedCandidate> {
        let state = self.state.borrow();
        let mut load: HashMap<UserId, u32> = HashMap::new();
        let mut roles: HashMap<UserId, CaseRoleType> = HashMap::new();
        for a in state.all_assignments.iter().filter(|a| a.active) {
            *load.entry(a.user_id).or_default() += a.workload();
            roles.entry(a.user_id).or_insert(a.role_type);
        }

        let candidates: Vec<Candidate> = state
            .attorneys
            .iter()
            .map(|user| {
                let mut candidate = Candidate::from_user(user, None);
                candidate.workload_weight = load.get(&user.id).copied().unwrap_or(0).min(100);
                if let Some(r) = roles.get(&user.id) {
                    candidate = candidate.with_role(*r);
                }
                candidate
            })
            .collect();
        rank_candidates(&candidates, role)
    }

    /// Assign a user to a case
    pub async fn assign(
        &self,
        case_id: impl Into<IdInput>,
        user_id: impl Into<IdInput>,
        role: CaseRoleType,
        options: AssignmentOptions,
    ) -> SyncResult {
        let options = options.from_component("assignment-dashboard");
        let result = self
            .sync
            .assign_user_to_case(case_id, user_id, role, options)
            .await;
        if result.success {
            if let Some(assignment) = result
                .data
                .clone()
                .and_then(|d| serde_json::from_value::<CaseAssignment>(d).ok())
            {
                let me = self.current_user;
                self.state.send_modify(|s| {
                    if assignment.user_id == me {
                        upsert_assignment(&mut s.my_assignments, assignment.clone());
                    }
                    upsert_assignment(&mut s.all_assignments, assignment);
                });
            }
        }
        result
    }

    /// Transfer a case between users
    pub async fn transfer(
        &self,
        case_id: CaseId,
        from: UserId,
        to: UserId,
        reason: &str,
    ) -> SyncResult {
        let result = self.sync.reassign_case(case_id, from, to, reason, None).await;
        if result.success {
            self.load_initial_data().await;
        }
        result
    }

    /// Remove a user from a case after confirmation
    ///
    /// # Errors
    /// `CaseflowError::Cancelled` when the user declines; no request is made.
    pub async fn unassign(
        &self,
        case_id: CaseId,
        user_id: UserId,
        reason: &str,
    ) -> Result<SyncResult, CaseflowError> {
        if !self
            .confirm
            .confirm("Remove assignment", &format!("Remove user {user_id} from case {case_id}?"))
            .await
        {
            return Err(CaseflowError::Cancelled);
        }

        let result = self.sync.unassign_user_from_case(case_id, user_id, reason).await;
        if result.success {
            self.state.send_modify(|s| {
                let gone = |a: &CaseAssignment| a.case_id == case_id && a.user_id == user_id;
                s.all_assignments.retain(|a| !gone(a));
                s.my_assignments.retain(|a| !gone(a));
            });
        }
        Ok(result)
    }

    /// Approve a transfer request
    ///
    /// # Errors
    /// The REST error; it is also surfaced as a toast.
    pub async fn approve_transfer(&self, transfer_id: TransferId) -> Result<(), CaseflowError> {
        match self.api.approve_transfer(transfer_id, None).await {
            Ok(()) => {
                self.drop_transfer(transfer_id);
                self.feedback.success("Transfer approved");
                self.load_initial_data().await;
                Ok(())
            }
            Err(e) => {
                self.feedback.error(&e.user_message());
                Err(e.into())
            }
        }
    }

    /// Reject a transfer request after confirmation
    ///
    /// # Errors
    /// `CaseflowError::Cancelled` when the user declines, else the REST error.
    pub async fn reject_transfer(
        &self,
        transfer_id: TransferId,
        reason: &str,
    ) -> Result<(), CaseflowError> {
        if !self
            .confirm
            .confirm("Reject transfer", "Reject this transfer request?")
            .await
        {
            return Err(CaseflowError::Cancelled);
        }

        match self.api.reject_transfer(transfer_id, reason).await {
            Ok(()) => {
                self.drop_transfer(transfer_id);
                self.feedback.success("Transfer rejected");
                Ok(())
            }
            Err(e) => {
                self.feedback.error(&e.user_message());
                Err(e.into())
            }
        }
    }

    fn drop_transfer(&self, transfer_id: TransferId) {
        self.state
            .send_modify(|s| s.pending_transfers.retain(|t| t.id != transfer_id));
    }
}
