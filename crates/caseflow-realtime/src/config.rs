//! Realtime transport configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Realtime transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Socket endpoint, without the token parameter
    pub url: String,
    /// Delay before each reconnection attempt
    pub reconnect_interval_ms: u64,
    /// Reconnection attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Period of the token/connection reconciliation timer
    pub token_check_interval_ms: u64,
    /// Capacity of each event sub-stream
    pub channel_capacity: usize,
}

impl RealtimeConfig {
    /// Default configuration for `url`
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// With max reconnect attempts
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// With reconnect interval
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Reconnect interval
    #[inline]
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Token check interval
    #[inline]
    #[must_use]
    pub fn token_check_interval(&self) -> Duration {
        Duration::from_millis(self.token_check_interval_ms)
    }

    /// Endpoint with the bearer token as a query parameter
    #[must_use]
    pub fn url_with_token(&self, token: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", self.url, separator, token)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8085/ws".to_string(),
            reconnect_interval_ms: 5_000,
            max_reconnect_attempts: 5,
            token_check_interval_ms: 30_000,
            channel_capacity: 256,
        }
    }
}
