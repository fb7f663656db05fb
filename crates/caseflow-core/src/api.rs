//! REST collaborator
//!
//! [`CaseApi`] is the backend surface the store, orchestrator and view-models
//! consume. [`HttpCaseApi`] implements it over `reqwest`; every list response
//! goes through the shared envelope normalizer.

use crate::config::ApiConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use caseflow_model::{
    unwrap_entity, unwrap_list, Case, CaseAssignment, CaseAssignmentRequest, CaseId,
    CaseTask, CaseTransferRequest, TaskDraft, TaskId, TaskPatch, TransferId, TransferRequest, User,
    UserId, UserWorkload,
};
use caseflow_realtime::TokenStore;
use reqwest::{header, Client, Method, RequestBuilder};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Backend REST surface
#[async_trait]
pub trait CaseApi: Send + Sync + fmt::Debug {
    /// Fetch one case
    async fn get_case(&self, case_id: CaseId) -> Result<Case, ApiError>;

    /// List cases visible to the caller
    async fn list_cases(&self) -> Result<Vec<Case>, ApiError>;

    /// Team roster for a case
    async fn case_team(&self, case_id: CaseId) -> Result<Vec<CaseAssignment>, ApiError>;

    /// Tasks for a case
    async fn case_tasks(&self, case_id: CaseId) -> Result<Vec<CaseTask>, ApiError>;

    /// Every case assignment
    async fn all_assignments(&self) -> Result<Vec<CaseAssignment>, ApiError>;

    /// Assignments held by one user
    async fn user_assignments(&self, user_id: UserId) -> Result<Vec<CaseAssignment>, ApiError>;

    /// Users who can be assigned as attorneys
    async fn attorneys(&self) -> Result<Vec<User>, ApiError>;

    /// Workload figures for one user
    async fn user_workload(&self, user_id: UserId) -> Result<UserWorkload, ApiError>;

    /// Add a user to a case team
    async fn assign_case(
        &self,
        request: &CaseAssignmentRequest,
    ) -> Result<CaseAssignment, ApiError>;

    /// Move a case from one user to another
    async fn transfer_case(
        &self,
        request: &CaseTransferRequest,
    ) -> Result<CaseAssignment, ApiError>;

    /// Remove a user from a case team
    async fn unassign_case(
        &self,
        case_id: CaseId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), ApiError>;

    /// Create a task
    async fn create_task(&self, draft: &TaskDraft) -> Result<CaseTask, ApiError>;

    /// Partially update a task
    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<CaseTask, ApiError>;

    /// Give a task to a user
    async fn assign_task(&self, task_id: TaskId, user_id: UserId) -> Result<CaseTask, ApiError>;

    /// Delete a task
    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError>;

    /// Transfer requests awaiting a decision
    async fn pending_transfers(&self) -> Result<Vec<TransferRequest>, ApiError>;

    /// Approve a transfer request
    async fn approve_transfer(
        &self,
        transfer_id: TransferId,
        notes: Option<&str>,
    ) -> Result<(), ApiError>;

    /// Reject a transfer request
    async fn reject_transfer(&self, transfer_id: TransferId, reason: &str) -> Result<(), ApiError>;
}

/// Authenticated JSON requests against the backend
///
/// Shared by the REST, notification and permission clients.
#[derive(Clone)]
pub struct HttpBackend {
    config: ApiConfig,
    client: Client,
    tokens: Arc<dyn TokenStore>,
}

impl HttpBackend {
    /// Create a backend client
    ///
    /// # Errors
    /// `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.tokens.token().ok_or(ApiError::Unauthenticated)?;
        Ok(self
            .client
            .request(method, self.config.endpoint(path))
            .bearer_auth(token))
    }

    /// Send a request and return the JSON body (`null` for an empty body)
    ///
    /// # Errors
    /// `ApiError::Status` for non-success responses, carrying the server's
    /// `message` field when present.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let mut request = self.request(method.clone(), path)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("response read failed: {e}")))?;

        let parsed = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            let message = parsed
                .get("message")
                .or_else(|| parsed.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string);
            tracing::warn!("{} {} failed with status {}", method, path, status);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(parsed)
    }

    /// GET
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, path, None).await
    }

    /// POST with a JSON body
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::Transport(format!("failed to encode request: {e}")))
}

/// [`CaseApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpCaseApi {
    backend: HttpBackend,
}

impl HttpCaseApi {
    /// Create over a shared backend client
    #[must_use]
    pub fn new(backend: HttpBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CaseApi for HttpCaseApi {
    async fn get_case(&self, case_id: CaseId) -> Result<Case, ApiError> {
        let body = self.backend.get(&format!("legal-cases/{case_id}")).await?;
        Ok(unwrap_entity(&body, "case")?)
    }

    async fn list_cases(&self) -> Result<Vec<Case>, ApiError> {
        let body = self.backend.get("legal-cases?page=0&size=100").await?;
        Ok(unwrap_list(&body, &["cases", "items"]))
    }

    async fn case_team(&self, case_id: CaseId) -> Result<Vec<CaseAssignment>, ApiError> {
        let body = self.backend.get(&format!("case-assignments/case/{case_id}")).await?;
        Ok(unwrap_list(&body, &["assignments", "team"]))
    }

    async fn case_tasks(&self, case_id: CaseId) -> Result<Vec<CaseTask>, ApiError> {
        let body = self.backend.get(&format!("legal-cases/{case_id}/tasks")).await?;
        Ok(unwrap_list(&body, &["tasks"]))
    }

    async fn all_assignments(&self) -> Result<Vec<CaseAssignment>, ApiError> {
        let body = self.backend.get("case-assignments?page=0&size=500").await?;
        Ok(unwrap_list(&body, &["assignments"]))
    }

    async fn user_assignments(&self, user_id: UserId) -> Result<Vec<CaseAssignment>, ApiError> {
        let body = self.backend.get(&format!("case-assignments/user/{user_id}")).await?;
        Ok(unwrap_list(&body, &["assignments"]))
    }

    async fn attorneys(&self) -> Result<Vec<User>, ApiError> {
        let body = self.backend.get("users/attorneys").await?;
        Ok(unwrap_list(&body, &["users", "attorneys"]))
    }

    async fn user_workload(&self, user_id: UserId) -> Result<UserWorkload, ApiError> {
        let body = self
            .backend
            .get(&format!("case-assignments/workload/{user_id}"))
            .await?;
        Ok(unwrap_entity(&body, "workload")?)
    }

    async fn assign_case(
        &self,
        request: &CaseAssignmentRequest,
    ) -> Result<CaseAssignment, ApiError> {
        let body = self
            .backend
            .post("case-assignments/assign", &to_body(request)?)
            .await?;
        Ok(unwrap_entity(&body, "assignment")?)
    }

    async fn transfer_case(
        &self,
        request: &CaseTransferRequest,
    ) -> Result<CaseAssignment, ApiError> {
        let body = self
            .backend
            .post("case-assignments/transfer", &to_body(request)?)
            .await?;
        Ok(unwrap_entity(&body, "assignment")?)
    }

    async fn unassign_case(
        &self,
        case_id: CaseId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), ApiError> {
        self.backend
            .send(
                Method::DELETE,
                &format!("case-assignments/case/{case_id}/user/{user_id}"),
                Some(&json!({ "reason": reason })),
            )
            .await?;
        Ok(())
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<CaseTask, ApiError> {
        let body = self.backend.post("tasks", &to_body(draft)?).await?;
        Ok(unwrap_entity(&body, "task")?)
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<CaseTask, ApiError> {
        let body = self
            .backend
            .send(Method::PUT, &format!("tasks/{task_id}"), Some(&to_body(patch)?))
            .await?;
        Ok(unwrap_entity(&body, "task")?)
    }

    async fn assign_task(&self, task_id: TaskId, user_id: UserId) -> Result<CaseTask, ApiError> {
        let body = self
            .backend
            .post(&format!("tasks/{task_id}/assign"), &json!({ "userId": user_id }))
            .await?;
        Ok(unwrap_entity(&body, "task")?)
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.backend
            .send(Method::DELETE, &format!("tasks/{task_id}"), None)
            .await?;
        Ok(())
    }

    async fn pending_transfers(&self) -> Result<Vec<TransferRequest>, ApiError> {
        let body = self
            .backend
            .get("case-assignments/transfer-requests/pending")
            .await?;
        Ok(unwrap_list(&body, &["requests", "transfers"]))
    }

    async fn approve_transfer(
        &self,
        transfer_id: TransferId,
        notes: Option<&str>,
    ) -> Result<(), ApiError> {
        self.backend
            .post(
                &format!("case-assignments/transfer-requests/{transfer_id}/approve"),
                &json!({ "notes": notes }),
            )
            .await?;
        Ok(())
    }

    async fn reject_transfer(&self, transfer_id: TransferId, reason: &str) -> Result<(), ApiError> {
        self.backend
            .post(
                &format!("case-assignments/transfer-requests/{transfer_id}/reject"),
                &json!({ "reason": reason }),
            )
            .await?;
        Ok(())
    }
}

