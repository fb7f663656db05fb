//! Notifications and user feedback
//!
//! Three seams, all best-effort:
//! - [`Notifier`]: targeted notifications to other users
//! - [`Feedback`]: success/error toasts for the acting user
//! - [`Confirm`]: confirmation prompt before destructive actions

use crate::api::HttpBackend;
use crate::error::NotifyError;
use async_trait::async_trait;
use caseflow_model::{CaseId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Added to a case team
    CaseAssigned,
    /// Removed from a case team
    CaseUnassigned,
    /// Case moved to or from the recipient
    CaseTransferred,
    /// Task given to the recipient
    TaskAssigned,
    /// Task taken from the recipient
    TaskReassigned,
    /// Task status changed
    TaskStatusChanged,
}

/// Notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    /// Low
    Low,
    /// Normal
    #[default]
    Normal,
    /// High
    High,
}

/// A notification for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    /// Recipient
    pub user_id: UserId,
    /// Category
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Headline
    pub title: String,
    /// Body
    pub message: String,
    /// Priority
    pub priority: NotificationPriority,
    /// Related case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
}

impl UserNotification {
    /// Create a normal-priority notification
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            priority: NotificationPriority::Normal,
            case_id: None,
        }
    }

    /// With related case
    #[inline]
    #[must_use]
    pub fn for_case(mut self, case_id: CaseId) -> Self {
        self.case_id = Some(case_id);
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Delivers notifications to users
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Deliver one notification
    async fn notify(&self, notification: &UserNotification) -> Result<(), NotifyError>;
}

/// [`Notifier`] over the backend notification endpoint
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    backend: HttpBackend,
}

impl HttpNotifier {
    /// Create over a shared backend client
    #[must_use]
    pub fn new(backend: HttpBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &UserNotification) -> Result<(), NotifyError> {
        let body = serde_json::to_value(notification)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        self.backend.post("notifications", &body).await?;
        Ok(())
    }
}

/// User-facing toasts
pub trait Feedback: Send + Sync + fmt::Debug {
    /// Report success
    fn success(&self, message: &str);

    /// Report failure
    fn error(&self, message: &str);
}

/// [`Feedback`] that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFeedback;

impl Feedback for TracingFeedback {
    fn success(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Confirmation prompt for destructive actions
#[async_trait]
pub trait Confirm: Send + Sync + fmt::Debug {
    /// `true` to proceed
    async fn confirm(&self, title: &str, message: &str) -> bool;
}

/// [`Confirm`] with a fixed answer, for non-interactive front ends
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, title: &str, _message: &str) -> bool {
        tracing::debug!("auto-answering {:?} with {}", title, self.0);
        self.0
    }
}
