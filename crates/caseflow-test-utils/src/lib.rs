//! Testing utilities for the caseflow workspace
//!
//! In-memory stand-ins for every collaborator seam, plus fixtures.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate, clippy::missing_panics_doc)]

use async_trait::async_trait;
use caseflow_core::{
    ApiError, AssignmentSync, CaseApi, CaseContextStore, Confirm, Feedback, Notifier, NotifyError,
    RbacError, RbacService, UserNotification, WorkloadConfig,
};
use caseflow_model::{
    AssignmentId, Case, CaseAssignment, CaseAssignmentRequest, CaseId, CaseRoleType, CaseTask,
    CaseTransferRequest, TaskDraft, TaskId, TaskPatch, TransferId, TransferRequest, TransferStatus,
    TransferUrgency, User, UserId, UserWorkload,
};
use caseflow_realtime::{
    Broadcaster, Connection, Connector, Frame, OutboundMessage, TransportError,
};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn case(id: i64) -> Case {
    Case::new(CaseId(id), format!("Case {id}")).with_number(format!("CV-{id:04}"))
}

pub fn task(id: i64, case_id: i64) -> CaseTask {
    CaseTask::new(TaskId(id), CaseId(case_id), format!("Task {id}"))
}

pub fn member(id: i64, case_id: i64, user_id: i64, role: CaseRoleType) -> CaseAssignment {
    CaseAssignment::new(AssignmentId(id), CaseId(case_id), UserId(user_id), role)
        .with_name(format!("User {user_id}"))
}

pub fn user(id: i64, first: &str, last: &str) -> User {
    User::new(UserId(id), first, last)
}

/// Task due `days` from now (negative for overdue)
pub fn task_due_in(id: i64, case_id: i64, days: i64) -> CaseTask {
    task(id, case_id).with_due(Utc::now() + Duration::days(days))
}

pub fn pending_transfer(id: i64, case_id: i64, from: i64, to: i64) -> TransferRequest {
    TransferRequest {
        id: TransferId(id),
        case_id: CaseId(case_id),
        case_title: Some(format!("Case {case_id}")),
        from_user_id: UserId(from),
        from_user_name: None,
        to_user_id: UserId(to),
        to_user_name: None,
        reason: "rebalancing".to_string(),
        urgency: TransferUrgency::default(),
        status: TransferStatus::Pending,
        requested_at: Some(Utc::now()),
    }
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ApiState {
    cases: BTreeMap<CaseId, Case>,
    teams: BTreeMap<CaseId, Vec<CaseAssignment>>,
    tasks: BTreeMap<CaseId, Vec<CaseTask>>,
    attorneys: Vec<User>,
    workloads: HashMap<UserId, UserWorkload>,
    transfers: Vec<TransferRequest>,
    next_id: i64,
}

impl ApiState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn task_mut(&mut self, task_id: TaskId) -> Option<&mut CaseTask> {
        self.tasks
            .values_mut()
            .flat_map(|tasks| tasks.iter_mut())
            .find(|t| t.id == task_id)
    }
}

/// In-memory backend with per-method call counts and injectable failures
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<ApiState>,
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, (u16, Option<String>)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case(self, case: Case) -> Self {
        self.state.lock().cases.insert(case.id, case);
        self
    }

    pub fn with_member(self, member: CaseAssignment) -> Self {
        self.state
            .lock()
            .teams
            .entry(member.case_id)
            .or_default()
            .push(member);
        self
    }

    pub fn with_task(self, task: CaseTask) -> Self {
        self.state
            .lock()
            .tasks
            .entry(task.case_id)
            .or_default()
            .push(task);
        self
    }

    pub fn with_attorney(self, user: User) -> Self {
        self.state.lock().attorneys.push(user);
        self
    }

    pub fn with_workload(self, user_id: UserId, workload: UserWorkload) -> Self {
        self.state.lock().workloads.insert(user_id, workload);
        self
    }

    pub fn with_transfer(self, transfer: TransferRequest) -> Self {
        self.state.lock().transfers.push(transfer);
        self
    }

    /// Make `method` fail with `status` and an optional server message
    pub fn fail(&self, method: &'static str, status: u16, message: Option<&str>) {
        self.failures
            .lock()
            .insert(method, (status, message.map(str::to_string)));
    }

    pub fn heal(&self, method: &'static str) {
        self.failures.lock().remove(method);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|m| **m == method).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn server_tasks(&self, case_id: CaseId) -> Vec<CaseTask> {
        self.state.lock().tasks.get(&case_id).cloned().unwrap_or_default()
    }

    pub fn server_team(&self, case_id: CaseId) -> Vec<CaseAssignment> {
        self.state.lock().teams.get(&case_id).cloned().unwrap_or_default()
    }

    pub fn transfer_status(&self, transfer_id: TransferId) -> Option<TransferStatus> {
        self.state
            .lock()
            .transfers
            .iter()
            .find(|t| t.id == transfer_id)
            .map(|t| t.status)
    }

    fn enter(&self, method: &'static str) -> Result<(), ApiError> {
        self.calls.lock().push(method);
        match self.failures.lock().get(method) {
            Some((status, message)) => Err(ApiError::Status {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: Some(format!("{what} not found")),
    }
}

#[async_trait]
impl CaseApi for FakeApi {
    async fn get_case(&self, case_id: CaseId) -> Result<Case, ApiError> {
        self.enter("get_case")?;
        self.state
            .lock()
            .cases
            .get(&case_id)
            .cloned()
            .ok_or_else(|| not_found("case"))
    }

    async fn list_cases(&self) -> Result<Vec<Case>, ApiError> {
        self.enter("list_cases")?;
        Ok(self.state.lock().cases.values().cloned().collect())
    }

    async fn case_team(&self, case_id: CaseId) -> Result<Vec<CaseAssignment>, ApiError> {
        self.enter("case_team")?;
        Ok(self.server_team(case_id))
    }

    async fn case_tasks(&self, case_id: CaseId) -> Result<Vec<CaseTask>, ApiError> {
        self.enter("case_tasks")?;
        Ok(self.server_tasks(case_id))
    }

    async fn all_assignments(&self) -> Result<Vec<CaseAssignment>, ApiError> {
        self.enter("all_assignments")?;
        Ok(self.state.lock().teams.values().flatten().cloned().collect())
    }

    async fn user_assignments(&self, user_id: UserId) -> Result<Vec<CaseAssignment>, ApiError> {
        self.enter("user_assignments")?;
        Ok(self
            .state
            .lock()
            .teams
            .values()
            .flatten()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn attorneys(&self) -> Result<Vec<User>, ApiError> {
        self.enter("attorneys")?;
        Ok(self.state.lock().attorneys.clone())
    }

    async fn user_workload(&self, user_id: UserId) -> Result<UserWorkload, ApiError> {
        self.enter("user_workload")?;
        Ok(self
            .state
            .lock()
            .workloads
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn assign_case(
        &self,
        request: &CaseAssignmentRequest,
    ) -> Result<CaseAssignment, ApiError> {
        self.enter("assign_case")?;
        let mut state = self.state.lock();
        let id = state.next_id();
        let mut assignment = CaseAssignment::new(
            AssignmentId(id),
            request.case_id,
            request.user_id,
            request.role_type,
        );
        assignment.assignment_type = request.assignment_type;
        assignment.workload_weight = request.workload_weight;
        state
            .teams
            .entry(request.case_id)
            .or_default()
            .push(assignment.clone());
        Ok(assignment)
    }

    async fn transfer_case(
        &self,
        request: &CaseTransferRequest,
    ) -> Result<CaseAssignment, ApiError> {
        self.enter("transfer_case")?;
        let mut state = self.state.lock();
        let id = state.next_id();
        let team = state.teams.entry(request.case_id).or_default();
        let role = team
            .iter()
            .find(|m| m.user_id == request.from_user_id)
            .map(|m| m.role_type);
        team.retain(|m| m.user_id != request.from_user_id);
        let role = request
            .role_type
            .or(role)
            .unwrap_or(CaseRoleType::Associate);
        let assignment =
            CaseAssignment::new(AssignmentId(id), request.case_id, request.to_user_id, role);
        team.push(assignment.clone());
        Ok(assignment)
    }

    async fn unassign_case(
        &self,
        case_id: CaseId,
        user_id: UserId,
        _reason: &str,
    ) -> Result<(), ApiError> {
        self.enter("unassign_case")?;
        if let Some(team) = self.state.lock().teams.get_mut(&case_id) {
            team.retain(|m| m.user_id != user_id);
        }
        Ok(())
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<CaseTask, ApiError> {
        self.enter("create_task")?;
        let mut state = self.state.lock();
        let id = state.next_id();
        let mut task = CaseTask::new(TaskId(id), draft.case_id, draft.title.clone());
        task.description.clone_from(&draft.description);
        task.task_type = draft.task_type;
        task.priority = draft.priority;
        task.due_date = draft.due_date;
        task.estimated_hours = draft.estimated_hours;
        task.assigned_to_id = draft.assigned_to_id;
        task.tags.clone_from(&draft.tags);
        state.tasks.entry(draft.case_id).or_default().push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<CaseTask, ApiError> {
        self.enter("update_task")?;
        let mut state = self.state.lock();
        let task = state.task_mut(task_id).ok_or_else(|| not_found("task"))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn assign_task(&self, task_id: TaskId, user_id: UserId) -> Result<CaseTask, ApiError> {
        self.enter("assign_task")?;
        let mut state = self.state.lock();
        let task = state.task_mut(task_id).ok_or_else(|| not_found("task"))?;
        task.assigned_to_id = Some(user_id);
        Ok(task.clone())
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.enter("delete_task")?;
        for tasks in self.state.lock().tasks.values_mut() {
            tasks.retain(|t| t.id != task_id);
        }
        Ok(())
    }

    async fn pending_transfers(&self) -> Result<Vec<TransferRequest>, ApiError> {
        self.enter("pending_transfers")?;
        Ok(self
            .state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.is_pending())
            .cloned()
            .collect())
    }

    async fn approve_transfer(
        &self,
        transfer_id: TransferId,
        _notes: Option<&str>,
    ) -> Result<(), ApiError> {
        self.enter("approve_transfer")?;
        self.decide(transfer_id, TransferStatus::Approved)
    }

    async fn reject_transfer(
        &self,
        transfer_id: TransferId,
        _reason: &str,
    ) -> Result<(), ApiError> {
        self.enter("reject_transfer")?;
        self.decide(transfer_id, TransferStatus::Rejected)
    }
}

impl FakeApi {
    fn decide(&self, transfer_id: TransferId, status: TransferStatus) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        let transfer = state
            .transfers
            .iter_mut()
            .find(|t| t.id == transfer_id)
            .ok_or_else(|| not_found("transfer request"))?;
        transfer.status = status;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifications, RBAC, feedback
// ---------------------------------------------------------------------------

/// Records every delivery attempt; fails for chosen users
#[derive(Debug, Default)]
pub struct FakeNotifier {
    attempts: Mutex<Vec<UserNotification>>,
    failing: Mutex<HashSet<UserId>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, user_id: UserId) {
        self.failing.lock().insert(user_id);
    }

    pub fn attempts(&self) -> Vec<UserNotification> {
        self.attempts.lock().clone()
    }

    pub fn recipients(&self) -> Vec<UserId> {
        self.attempts.lock().iter().map(|n| n.user_id).collect()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, notification: &UserNotification) -> Result<(), NotifyError> {
        self.attempts.lock().push(notification.clone());
        if self.failing.lock().contains(&notification.user_id) {
            return Err(NotifyError::Delivery(format!(
                "user {} unreachable",
                notification.user_id
            )));
        }
        Ok(())
    }
}

/// Grant table with a call counter
#[derive(Debug, Default)]
pub struct FakeRbac {
    grants: Mutex<HashSet<(String, String)>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
    stalled: AtomicBool,
}

impl FakeRbac {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn granting(grants: &[(&str, &str)]) -> Self {
        let rbac = Self::new();
        for (resource, action) in grants {
            rbac.grant(resource, action);
        }
        rbac
    }

    pub fn grant(&self, resource: &str, action: &str) {
        self.grants
            .lock()
            .insert((resource.to_string(), action.to_string()));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// While stalled, checks never answer
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RbacService for FakeRbac {
    async fn has_case_permission(
        &self,
        _case_id: CaseId,
        resource: &str,
        action: &str,
    ) -> Result<bool, RbacError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RbacError::Unavailable("rbac offline".to_string()));
        }
        Ok(self
            .grants
            .lock()
            .contains(&(resource.to_string(), action.to_string())))
    }
}

/// Collects toasts
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Feedback for RecordingFeedback {
    fn success(&self, message: &str) {
        self.successes.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

/// Fixed answer; counts prompts
#[derive(Debug, Default)]
pub struct StaticConfirm {
    answer: bool,
    prompts: AtomicUsize,
}

impl StaticConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirm for StaticConfirm {
    async fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

// ---------------------------------------------------------------------------
// Realtime
// ---------------------------------------------------------------------------

/// Records outbound messages; reports sends as delivered while "connected"
#[derive(Debug)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<OutboundMessage>>,
    connected: AtomicBool,
}

impl Default for RecordingBroadcaster {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.kind.clone()).collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, message: OutboundMessage) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(message);
        true
    }
}

/// Server end of one fake socket
#[derive(Debug)]
pub struct ServerSocket {
    pub url: String,
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

impl ServerSocket {
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(Frame::Text(text.to_string()));
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(Frame::Close(Some(code)));
    }

    /// Next frame from the client, decoded when it is text
    pub async fn next_message(&mut self) -> Option<Value> {
        match self.from_client.recv().await? {
            Frame::Text(text) => serde_json::from_str(&text).ok(),
            Frame::Close(code) => Some(serde_json::json!({ "type": "__close", "code": code })),
        }
    }

    /// Frames already sent by the client, without waiting
    pub fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            if let Frame::Text(text) = frame {
                if let Ok(value) = serde_json::from_str(&text) {
                    out.push(value);
                }
            }
        }
        out
    }
}

/// Accepts or refuses connections; hands accepted sockets to a [`FakeServer`]
#[derive(Debug)]
pub struct FakeConnector {
    accept_limit: Mutex<Option<usize>>,
    accepted: AtomicUsize,
    calls: AtomicUsize,
    sockets: mpsc::UnboundedSender<ServerSocket>,
}

/// Receives sockets opened through a [`FakeConnector`]
#[derive(Debug)]
pub struct FakeServer {
    sockets: mpsc::UnboundedReceiver<ServerSocket>,
}

impl FakeServer {
    pub async fn accept(&mut self) -> Option<ServerSocket> {
        self.sockets.recv().await
    }

    pub fn try_accept(&mut self) -> Option<ServerSocket> {
        self.sockets.try_recv().ok()
    }
}

impl FakeConnector {
    /// Connector accepting every connection
    pub fn new() -> (Arc<Self>, FakeServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accept_limit: Mutex::new(None),
            accepted: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            sockets: tx,
        });
        (connector, FakeServer { sockets: rx })
    }

    /// Accept only the next `n` connections, refuse the rest
    pub fn accept_only(&self, n: usize) {
        *self.accept_limit.lock() = Some(self.accepted.load(Ordering::SeqCst) + n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = *self.accept_limit.lock() {
            if self.accepted.load(Ordering::SeqCst) >= limit {
                return Err(TransportError::Connect("connection refused".to_string()));
            }
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let socket = ServerSocket {
            url: url.to_string(),
            to_client: server_tx,
            from_client: server_rx,
        };
        self.sockets
            .send(socket)
            .map_err(|_| TransportError::Connect("fake server gone".to_string()))?;

        Ok(Connection {
            sink: client_tx,
            stream: client_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Store and orchestrator over fakes
#[derive(Debug)]
pub struct SyncHarness {
    pub api: Arc<FakeApi>,
    pub store: Arc<CaseContextStore>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub notifier: Arc<FakeNotifier>,
    pub feedback: Arc<RecordingFeedback>,
    pub sync: Arc<AssignmentSync>,
}

impl SyncHarness {
    pub fn new(api: FakeApi) -> Self {
        let api = Arc::new(api);
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let notifier = Arc::new(FakeNotifier::new());
        let feedback = Arc::new(RecordingFeedback::new());
        let store = Arc::new(
            CaseContextStore::new(api.clone(), WorkloadConfig::default())
                .with_broadcaster(broadcaster.clone()),
        );
        let sync = Arc::new(AssignmentSync::new(
            api.clone(),
            store.clone(),
            broadcaster.clone(),
            notifier.clone(),
            feedback.clone(),
        ));
        Self {
            api,
            store,
            broadcaster,
            notifier,
            feedback,
            sync,
        }
    }

    /// Harness with case `case_id` loaded as the current case
    pub async fn with_open_case(api: FakeApi, case_id: i64) -> Self {
        let harness = Self::new(api);
        harness
            .store
            .load_case(CaseId(case_id))
            .await
            .expect("fixture case loads");
        harness
    }
}
