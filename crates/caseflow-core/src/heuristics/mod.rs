//! Advisory scoring over a roster/task snapshot
//!
//! Pure, deterministic functions. Nothing here writes to the context store;
//! outputs are recommendations a user or the orchestrator may act on.

pub mod analytics;
pub mod distribution;
pub mod predictive;
pub mod rules;
pub mod workload;

pub use analytics::{AssigneeStats, TaskAnalytics};
pub use distribution::{distribute, Placement};
pub use predictive::{forecast, MemberForecast};
pub use rules::{rank_candidates, suitability, Candidate, RankedCandidate};
pub use workload::{workload_score, LoadBand, MemberLoad, RebalanceSuggestion, WorkloadBalancer};
