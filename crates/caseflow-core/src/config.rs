//! Caseflow configuration
//!
//! Every field has a default, so an empty TOML file is a valid
//! configuration. Sections:
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8085"
//! token_file = "~/.caseflow/token"
//!
//! [realtime]
//! url = "ws://localhost:8085/ws"
//! reconnect_interval_ms = 5000
//! max_reconnect_attempts = 5
//!
//! [permissions]
//! cache_ttl_secs = 300
//!
//! [workload]
//! due_soon_days = 3
//! ```

use crate::error::ConfigError;
use caseflow_realtime::RealtimeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseflowConfig {
    /// REST backend
    pub api: ApiConfig,
    /// Realtime transport
    pub realtime: RealtimeConfig,
    /// Permission resolver
    pub permissions: PermissionConfig,
    /// Summaries and workload bands
    pub workload: WorkloadConfig,
}

impl CaseflowConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` when the text is not valid TOML for this shape.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Read` when the file cannot be read, `ConfigError::Parse`
    /// when it is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// With REST base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// With realtime configuration
    #[inline]
    #[must_use]
    pub fn with_realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.realtime = realtime;
        self
    }

    /// With permission cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.permissions.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// With due-soon horizon in days
    #[inline]
    #[must_use]
    pub fn with_due_soon_days(mut self, days: i64) -> Self {
        self.workload.due_soon_days = days;
        self
    }

    /// With token file
    #[inline]
    #[must_use]
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.api.token_file = Some(path.into());
        self
    }
}

/// REST backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; endpoints live under `{base_url}/api`
    pub base_url: String,
    /// File holding the bearer token
    pub token_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8085".to_string(),
            token_file: None,
        }
    }
}

impl ApiConfig {
    /// Absolute URL for an `/api`-relative path
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Permission resolver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Lifetime of one-off action check results
    pub cache_ttl_secs: u64,
    /// Maximum cached action checks
    pub cache_capacity: u64,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            cache_capacity: 1_000,
        }
    }
}

impl PermissionConfig {
    /// Cache TTL
    #[inline]
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Summary and workload band thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Tasks due within this many days count as due soon
    pub due_soon_days: i64,
    /// Team members below this weight are lightly loaded
    pub light_threshold: u32,
    /// Team members at or above this weight are heavily loaded
    pub heavy_threshold: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            due_soon_days: 3,
            light_threshold: 40,
            heavy_threshold: 80,
        }
    }
}
