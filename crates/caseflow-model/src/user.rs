//! Users and per-user workload figures

use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// A firm user (attorney, paralegal, staff)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend id
    pub id: UserId,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Email
    #[serde(default)]
    pub email: String,
    /// Job title, e.g. "Senior Associate"
    #[serde(default)]
    pub title: Option<String>,
    /// Global role names
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Create a user
    #[inline]
    #[must_use]
    pub fn new(id: UserId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            title: None,
            roles: Vec::new(),
        }
    }

    /// With job title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// "First Last"
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Backend-computed workload for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWorkload {
    /// User
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Active case count
    #[serde(default)]
    pub active_cases: u32,
    /// Sum of workload weights
    #[serde(default)]
    pub total_workload_points: f64,
    /// Capacity used, 0-100+
    #[serde(default)]
    pub capacity_percentage: f64,
}
