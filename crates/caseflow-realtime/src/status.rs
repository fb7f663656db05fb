//! Socket lifecycle status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status text once the retry budget is spent
pub const MAX_RETRIES_REACHED: &str = "Max reconnection attempts reached";

/// Lifecycle state of the realtime socket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Socket open
    pub connected: bool,
    /// A reconnection attempt is scheduled
    pub reconnecting: bool,
    /// Last successful open
    pub last_connected: Option<DateTime<Utc>>,
    /// Reconnection attempts since the last successful open
    pub retry_count: u32,
    /// Last error, if any
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// Status right after a successful open
    #[must_use]
    pub fn open(now: DateTime<Utc>) -> Self {
        Self {
            connected: true,
            reconnecting: false,
            last_connected: Some(now),
            retry_count: 0,
            error: None,
        }
    }

    /// Whether the retry budget is spent and nothing else will be attempted
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.connected && !self.reconnecting && self.error.as_deref() == Some(MAX_RETRIES_REACHED)
    }
}
