//! Session wiring
//!
//! Builds the store, resolver and orchestrator over one set of
//! collaborators, pumps realtime messages into the store, and owns every
//! background task so that dropping the session stops them.

use crate::api::{CaseApi, HttpBackend, HttpCaseApi};
use crate::board::TaskBoard;
use crate::config::CaseflowConfig;
use crate::context::CaseContextStore;
use crate::dashboard::AssignmentDashboard;
use crate::error::{ApiError, CaseflowError};
use crate::notify::{AutoConfirm, Confirm, Feedback, HttpNotifier, Notifier, TracingFeedback};
use crate::permissions::PermissionResolver;
use crate::rbac::{HttpRbac, RbacService, UserPermissions};
use crate::sync::AssignmentSync;
use caseflow_model::{Case, CaseId, UserId};
use caseflow_realtime::{
    Broadcaster, Connector, RealtimeClient, TokenStore, TransportError, WsConnector,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Aborts its tasks when dropped
#[derive(Debug, Default)]
pub struct TaskGuard {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskGuard {
    /// Empty guard
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a task
    pub fn push(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Abort every owned task
    pub fn abort_all(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    /// Tasks still running
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Whether no task is running
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// External collaborators a session runs against
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// REST backend
    pub api: Arc<dyn CaseApi>,
    /// Permission service
    pub rbac: Arc<dyn RbacService>,
    /// Notification delivery
    pub notifier: Arc<dyn Notifier>,
    /// Toasts
    pub feedback: Arc<dyn Feedback>,
    /// Confirmation prompts
    pub confirm: Arc<dyn Confirm>,
    /// Socket factory
    pub connector: Arc<dyn Connector>,
    /// Bearer token source
    pub tokens: Arc<dyn TokenStore>,
}

impl Collaborators {
    /// HTTP and WebSocket collaborators, logging feedback, declining prompts
    ///
    /// # Errors
    /// `ApiError::Transport` if the HTTP client cannot be built.
    pub fn http(config: &CaseflowConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let backend = HttpBackend::new(config.api.clone(), Arc::clone(&tokens))?;
        Ok(Self {
            api: Arc::new(HttpCaseApi::new(backend.clone())),
            rbac: Arc::new(HttpRbac::new(backend.clone())),
            notifier: Arc::new(HttpNotifier::new(backend)),
            feedback: Arc::new(TracingFeedback),
            confirm: Arc::new(AutoConfirm(false)),
            connector: Arc::new(WsConnector),
            tokens,
        })
    }
}

/// One user's live view of one case
#[derive(Debug)]
pub struct CaseSession {
    collaborators: Collaborators,
    realtime: RealtimeClient,
    store: Arc<CaseContextStore>,
    permissions: Arc<PermissionResolver>,
    sync: Arc<AssignmentSync>,
    user_permissions: watch::Sender<UserPermissions>,
    tasks: TaskGuard,
}

impl CaseSession {
    /// Wire a session; nothing runs until [`start`](Self::start)
    #[must_use]
    pub fn new(config: &CaseflowConfig, collaborators: Collaborators) -> Self {
        let realtime = RealtimeClient::new(
            config.realtime.clone(),
            Arc::clone(&collaborators.connector),
            Arc::clone(&collaborators.tokens),
        );
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(realtime.clone());

        let store = Arc::new(
            CaseContextStore::new(Arc::clone(&collaborators.api), config.workload)
                .with_broadcaster(Arc::clone(&broadcaster)),
        );
        let permissions = Arc::new(PermissionResolver::new(
            Arc::clone(&collaborators.rbac),
            config.permissions,
        ));
        let sync = Arc::new(AssignmentSync::new(
            Arc::clone(&collaborators.api),
            Arc::clone(&store),
            broadcaster,
            Arc::clone(&collaborators.notifier),
            Arc::clone(&collaborators.feedback),
        ));

        Self {
            collaborators,
            realtime,
            store,
            permissions,
            sync,
            user_permissions: watch::Sender::new(UserPermissions::default()),
            tasks: TaskGuard::new(),
        }
    }

    /// Start the realtime pump, the permission pump and the token watch
    pub fn start(&self) {
        let mut messages = self.realtime.messages();
        let store = Arc::clone(&self.store);
        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                store.apply_realtime(&message).await;
            }
        }));

        self.tasks.push(
            self.permissions
                .bind(&self.store, self.user_permissions.subscribe()),
        );
        self.realtime.start_token_watch();
        tracing::debug!("session started");
    }

    /// Open the realtime connection
    ///
    /// # Errors
    /// See [`RealtimeClient::connect`].
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.realtime.connect().await
    }

    /// Set the acting user and their global permissions
    pub fn set_user(&self, user_id: UserId, permissions: UserPermissions) {
        self.store.set_current_user(Some(user_id));
        self.realtime.subscribe_to_user(user_id);
        self.user_permissions.send_replace(permissions);
    }

    /// Load a case into the store and follow its realtime events
    ///
    /// # Errors
    /// The REST error when the case cannot be fetched.
    pub async fn open_case(&self, case_id: CaseId) -> Result<Case, CaseflowError> {
        let case = self.store.load_case(case_id).await?;
        self.realtime.subscribe_to_case(case_id);
        Ok(case)
    }

    /// Kanban board over the open case, kept in step with the store
    #[must_use]
    pub fn board(&self) -> Arc<TaskBoard> {
        let board = Arc::new(
            TaskBoard::new(
                Arc::clone(&self.collaborators.api),
                Arc::clone(&self.store),
                Arc::clone(&self.sync),
                Arc::clone(&self.collaborators.feedback),
                Arc::clone(&self.collaborators.confirm),
            )
            .with_permissions(Arc::clone(&self.permissions)),
        );
        self.tasks.push(board.bind());
        board
    }

    /// Assignment dashboard for the acting user
    ///
    /// # Errors
    /// `PermissionDenied` when no acting user has been set.
    pub fn dashboard(&self) -> Result<AssignmentDashboard, CaseflowError> {
        let user = self
            .store
            .current_user()
            .ok_or_else(|| CaseflowError::PermissionDenied("no acting user".to_string()))?;
        Ok(AssignmentDashboard::new(
            Arc::clone(&self.collaborators.api),
            Arc::clone(&self.sync),
            Arc::clone(&self.collaborators.feedback),
            Arc::clone(&self.collaborators.confirm),
            user,
        ))
    }

    /// Context store
    #[must_use]
    pub fn store(&self) -> &Arc<CaseContextStore> {
        &self.store
    }

    /// Permission resolver
    #[must_use]
    pub fn permissions(&self) -> &Arc<PermissionResolver> {
        &self.permissions
    }

    /// Sync orchestrator
    #[must_use]
    pub fn sync(&self) -> &Arc<AssignmentSync> {
        &self.sync
    }

    /// Realtime client
    #[must_use]
    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    /// Stop background work and close the socket
    pub fn close(&self) {
        self.tasks.abort_all();
        self.realtime.stop_token_watch();
        self.realtime.disconnect();
    }
}

impl Drop for CaseSession {
    fn drop(&mut self) {
        self.close();
    }
}
