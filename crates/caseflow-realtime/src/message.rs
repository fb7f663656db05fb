//! Wire protocol
//!
//! JSON text frames shaped `{type, data, timestamp?, caseId?, userId?}`.
//! Inbound `type` strings are parsed into the closed [`MessageKind`] set;
//! anything outside it is dropped at decode time.

use caseflow_model::{CaseId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::fmt;

/// Prefix of the sync orchestrator's own broadcasts
pub const ASSIGNMENT_PREFIX: &str = "assignment.";

/// Kind of change funnelled through the sync orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// User added to a case team
    CaseAssignment,
    /// Case moved from one user to another
    CaseReassignment,
    /// User removed from a case team
    CaseUnassignment,
    /// Task given to a user
    TaskAssignment,
    /// Task moved from one user to another
    TaskReassignment,
    /// Task status changed
    TaskStatusUpdate,
}

impl ChangeKind {
    /// Every change kind
    pub const ALL: [ChangeKind; 6] = [
        Self::CaseAssignment,
        Self::CaseReassignment,
        Self::CaseUnassignment,
        Self::TaskAssignment,
        Self::TaskReassignment,
        Self::TaskStatusUpdate,
    ];

    /// Upper-case name, e.g. `TASK_ASSIGNMENT`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CaseAssignment => "CASE_ASSIGNMENT",
            Self::CaseReassignment => "CASE_REASSIGNMENT",
            Self::CaseUnassignment => "CASE_UNASSIGNMENT",
            Self::TaskAssignment => "TASK_ASSIGNMENT",
            Self::TaskReassignment => "TASK_REASSIGNMENT",
            Self::TaskStatusUpdate => "TASK_STATUS_UPDATE",
        }
    }

    /// Broadcast type, e.g. `assignment.task_assignment`
    #[must_use]
    pub fn wire_type(self) -> String {
        format!("{ASSIGNMENT_PREFIX}{}", self.as_str().to_ascii_lowercase())
    }

    /// Whether the change targets a task rather than a case team
    #[inline]
    #[must_use]
    pub fn is_task_change(self) -> bool {
        matches!(
            self,
            Self::TaskAssignment | Self::TaskReassignment | Self::TaskStatusUpdate
        )
    }

    fn from_wire_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(suffix))
    }
}

/// Sub-stream a message is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Case metadata
    Case,
    /// Case tasks
    Task,
    /// Team membership
    Assignment,
    /// User-facing notifications
    Notification,
    /// Protocol chatter (pong)
    Control,
    /// Synthetic decode failures
    Error,
}

impl Category {
    /// Whether messages of this category concern a single case
    #[inline]
    #[must_use]
    pub fn is_case_scoped(self) -> bool {
        matches!(self, Self::Case | Self::Task | Self::Assignment)
    }
}

/// Every inbound message type this client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `CASE_UPDATED`
    CaseUpdated,
    /// `CASE_ASSIGNED`
    CaseAssigned,
    /// `CASE_STATUS_CHANGED`
    CaseStatusChanged,
    /// `TASK_CREATED`
    TaskCreated,
    /// `TASK_UPDATED`
    TaskUpdated,
    /// `TASK_ASSIGNED`
    TaskAssigned,
    /// `TASK_STATUS_CHANGED`
    TaskStatusChanged,
    /// `TASK_DELETED`
    TaskDeleted,
    /// `ASSIGNMENT_CREATED`
    AssignmentCreated,
    /// `ASSIGNMENT_UPDATED`
    AssignmentUpdated,
    /// `ASSIGNMENT_REMOVED`
    AssignmentRemoved,
    /// `MEMBER_ADDED`
    MemberAdded,
    /// `MEMBER_REMOVED`
    MemberRemoved,
    /// `assignment.<change>` from a peer session's sync orchestrator
    AssignmentSync(ChangeKind),
    /// `NOTIFICATION`
    Notification,
    /// `ALERT`
    Alert,
    /// `REMINDER`
    Reminder,
    /// `DEADLINE_ALERT`
    DeadlineAlert,
    /// `SYSTEM_MESSAGE`
    SystemMessage,
    /// `PONG`
    Pong,
    /// `error`: synthetic, produced for malformed frames
    Error,
}

impl MessageKind {
    /// Parse a wire `type`; `None` for anything unrecognized
    #[must_use]
    pub fn parse(wire: &str) -> Option<Self> {
        if let Some(suffix) = wire.strip_prefix(ASSIGNMENT_PREFIX) {
            return ChangeKind::from_wire_suffix(suffix).map(Self::AssignmentSync);
        }

        let kind = match wire {
            "CASE_UPDATED" => Self::CaseUpdated,
            "CASE_ASSIGNED" => Self::CaseAssigned,
            "CASE_STATUS_CHANGED" => Self::CaseStatusChanged,
            "TASK_CREATED" => Self::TaskCreated,
            "TASK_UPDATED" => Self::TaskUpdated,
            "TASK_ASSIGNED" => Self::TaskAssigned,
            "TASK_STATUS_CHANGED" => Self::TaskStatusChanged,
            "TASK_DELETED" => Self::TaskDeleted,
            "ASSIGNMENT_CREATED" => Self::AssignmentCreated,
            "ASSIGNMENT_UPDATED" => Self::AssignmentUpdated,
            "ASSIGNMENT_REMOVED" => Self::AssignmentRemoved,
            "MEMBER_ADDED" => Self::MemberAdded,
            "MEMBER_REMOVED" => Self::MemberRemoved,
            "NOTIFICATION" => Self::Notification,
            "ALERT" => Self::Alert,
            "REMINDER" => Self::Reminder,
            "DEADLINE_ALERT" => Self::DeadlineAlert,
            "SYSTEM_MESSAGE" => Self::SystemMessage,
            "PONG" => Self::Pong,
            "error" | "ERROR" => Self::Error,
            _ => return None,
        };
        Some(kind)
    }

    /// Wire `type` string
    #[must_use]
    pub fn as_wire(self) -> Cow<'static, str> {
        let s = match self {
            Self::CaseUpdated => "CASE_UPDATED",
            Self::CaseAssigned => "CASE_ASSIGNED",
            Self::CaseStatusChanged => "CASE_STATUS_CHANGED",
            Self::TaskCreated => "TASK_CREATED",
            Self::TaskUpdated => "TASK_UPDATED",
            Self::TaskAssigned => "TASK_ASSIGNED",
            Self::TaskStatusChanged => "TASK_STATUS_CHANGED",
            Self::TaskDeleted => "TASK_DELETED",
            Self::AssignmentCreated => "ASSIGNMENT_CREATED",
            Self::AssignmentUpdated => "ASSIGNMENT_UPDATED",
            Self::AssignmentRemoved => "ASSIGNMENT_REMOVED",
            Self::MemberAdded => "MEMBER_ADDED",
            Self::MemberRemoved => "MEMBER_REMOVED",
            Self::AssignmentSync(change) => return Cow::Owned(change.wire_type()),
            Self::Notification => "NOTIFICATION",
            Self::Alert => "ALERT",
            Self::Reminder => "REMINDER",
            Self::DeadlineAlert => "DEADLINE_ALERT",
            Self::SystemMessage => "SYSTEM_MESSAGE",
            Self::Pong => "PONG",
            Self::Error => "error",
        };
        Cow::Borrowed(s)
    }

    /// Sub-stream for this kind
    #[must_use]
    pub fn category(self) -> Category {
        match self {
            Self::CaseUpdated | Self::CaseAssigned | Self::CaseStatusChanged => Category::Case,
            Self::TaskCreated
            | Self::TaskUpdated
            | Self::TaskAssigned
            | Self::TaskStatusChanged
            | Self::TaskDeleted => Category::Task,
            Self::AssignmentCreated
            | Self::AssignmentUpdated
            | Self::AssignmentRemoved
            | Self::MemberAdded
            | Self::MemberRemoved
            | Self::AssignmentSync(_) => Category::Assignment,
            Self::Notification
            | Self::Alert
            | Self::Reminder
            | Self::DeadlineAlert
            | Self::SystemMessage => Category::Notification,
            Self::Pong => Category::Control,
            Self::Error => Category::Error,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    case_id: Option<CaseId>,
    #[serde(default)]
    user_id: Option<UserId>,
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Kind
    pub kind: MessageKind,
    /// Payload
    pub data: Value,
    /// Sender timestamp, epoch millis
    pub timestamp: Option<i64>,
    /// Case the message is about
    pub case_id: Option<CaseId>,
    /// User the message is about
    pub user_id: Option<UserId>,
}

impl InboundMessage {
    /// Create a message
    #[inline]
    #[must_use]
    pub fn new(kind: MessageKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: None,
            case_id: None,
            user_id: None,
        }
    }

    /// Scope to a case
    #[inline]
    #[must_use]
    pub fn for_case(mut self, case_id: CaseId) -> Self {
        self.case_id = Some(case_id);
        self
    }

    /// Scope to a user
    #[inline]
    #[must_use]
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Synthetic error message for a frame that could not be decoded
    #[must_use]
    pub fn error(reason: impl Into<String>, raw: &str) -> Self {
        Self::new(
            MessageKind::Error,
            json!({ "message": reason.into(), "raw": raw }),
        )
    }

    /// Decode a text frame
    ///
    /// Malformed JSON becomes a synthetic [`MessageKind::Error`] message.
    /// Unrecognized types return `None` after a log line.
    #[must_use]
    pub fn decode(text: &str) -> Option<Self> {
        let wire: WireMessage = match serde_json::from_str(text) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::warn!("malformed realtime frame: {}", e);
                return Some(Self::error(format!("malformed message: {e}"), text));
            }
        };

        let Some(kind) = MessageKind::parse(&wire.kind) else {
            tracing::debug!("dropping realtime message of unrecognized type {:?}", wire.kind);
            return None;
        };

        Some(Self {
            kind,
            data: wire.data,
            timestamp: wire.timestamp,
            case_id: wire.case_id,
            user_id: wire.user_id,
        })
    }

    /// Read an integer field from the payload, accepting `id`-style aliases
    #[must_use]
    pub fn data_i64(&self, keys: &[&str]) -> Option<i64> {
        keys.iter()
            .find_map(|key| self.data.get(*key).and_then(Value::as_i64))
    }
}

/// An outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Wire type
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload
    pub data: Value,
    /// Epoch millis at creation
    pub timestamp: i64,
    /// Case scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    /// User scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl OutboundMessage {
    /// Create a message stamped with the current time
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            case_id: None,
            user_id: None,
        }
    }

    /// Create from a known inbound kind (store re-broadcasts)
    #[must_use]
    pub fn of_kind(kind: MessageKind, data: Value) -> Self {
        Self::new(kind.as_wire(), data)
    }

    /// Scope to a case
    #[inline]
    #[must_use]
    pub fn for_case(mut self, case_id: CaseId) -> Self {
        self.case_id = Some(case_id);
        self
    }

    /// Scope to a user
    #[inline]
    #[must_use]
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Client-to-server control messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Start receiving a case's events
    SubscribeCase(CaseId),
    /// Stop receiving a case's events
    UnsubscribeCase(CaseId),
    /// Start receiving a user's events
    SubscribeUser(UserId),
    /// Stop receiving a user's events
    UnsubscribeUser(UserId),
    /// Keepalive
    Ping(i64),
}

impl From<ControlMessage> for OutboundMessage {
    fn from(control: ControlMessage) -> Self {
        match control {
            ControlMessage::SubscribeCase(id) => {
                OutboundMessage::new("SUBSCRIBE_CASE", json!({ "caseId": id })).for_case(id)
            }
            ControlMessage::UnsubscribeCase(id) => {
                OutboundMessage::new("UNSUBSCRIBE_CASE", json!({ "caseId": id })).for_case(id)
            }
            ControlMessage::SubscribeUser(id) => {
                OutboundMessage::new("SUBSCRIBE_USER", json!({ "userId": id })).for_user(id)
            }
            ControlMessage::UnsubscribeUser(id) => {
                OutboundMessage::new("UNSUBSCRIBE_USER", json!({ "userId": id })).for_user(id)
            }
            ControlMessage::Ping(ts) => OutboundMessage::new("PING", json!({ "timestamp": ts })),
        }
    }
}
