//! Derived summaries over a case's tasks and team
//!
//! Recomputed from scratch on every write to the task or roster slot.

use caseflow_model::{CaseAssignment, CaseRoleType, CaseTask, TaskPriority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Task counts for the current case
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// All tasks
    pub total: usize,
    /// Count per status
    pub by_status: BTreeMap<TaskStatus, usize>,
    /// Count per priority
    pub by_priority: BTreeMap<TaskPriority, usize>,
    /// Active tasks past their due date
    pub overdue: usize,
    /// Active tasks due today
    pub due_today: usize,
    /// Active tasks due within the due-soon horizon
    pub due_soon: usize,
    /// Completed share of non-cancelled tasks, 0..=100
    pub completion_rate: f64,
}

impl TaskSummary {
    /// Summarize `tasks` as of `now`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(tasks: &[CaseTask], now: DateTime<Utc>, due_soon_days: i64) -> Self {
        let mut summary = Self {
            total: tasks.len(),
            ..Self::default()
        };

        for task in tasks {
            *summary.by_status.entry(task.status).or_default() += 1;
            *summary.by_priority.entry(task.priority).or_default() += 1;
            if task.is_overdue(now) {
                summary.overdue += 1;
            }
            if task.is_due_today(now) {
                summary.due_today += 1;
            }
            if task.is_due_within(now, due_soon_days) {
                summary.due_soon += 1;
            }
        }

        let completed = summary.count(TaskStatus::Completed);
        let countable = summary.total - summary.count(TaskStatus::Cancelled);
        if countable > 0 {
            summary.completion_rate = completed as f64 * 100.0 / countable as f64;
        }
        summary
    }

    /// Tasks in `status`
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// High and urgent tasks
    #[must_use]
    pub fn high_priority(&self) -> usize {
        self.by_priority
            .iter()
            .filter(|(priority, _)| priority.is_high())
            .map(|(_, n)| n)
            .sum()
    }
}

/// Workload band of one team member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkloadBand {
    /// Below the light threshold
    Light,
    /// Between the thresholds
    Moderate,
    /// At or above the heavy threshold
    Heavy,
}

impl WorkloadBand {
    /// Classify a workload weight
    #[must_use]
    pub fn classify(weight: u32, light: u32, heavy: u32) -> Self {
        if weight < light {
            Self::Light
        } else if weight < heavy {
            Self::Moderate
        } else {
            Self::Heavy
        }
    }
}

/// Team counts for the current case
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    /// Active members
    pub total_members: usize,
    /// Members per role
    pub by_role: BTreeMap<CaseRoleType, usize>,
    /// Members in an attorney role
    pub attorneys: usize,
    /// Lightly loaded members
    pub light: usize,
    /// Moderately loaded members
    pub moderate: usize,
    /// Heavily loaded members
    pub heavy: usize,
    /// Sum of workload weights
    pub total_workload: u32,
}

impl TeamSummary {
    /// Summarize the active members of `team`
    #[must_use]
    pub fn compute(team: &[CaseAssignment], light: u32, heavy: u32) -> Self {
        let mut summary = Self::default();

        for member in team.iter().filter(|m| m.active) {
            summary.total_members += 1;
            *summary.by_role.entry(member.role_type).or_default() += 1;
            if member.role_type.is_attorney() {
                summary.attorneys += 1;
            }
            let weight = member.workload();
            summary.total_workload = summary.total_workload.saturating_add(weight);
            match WorkloadBand::classify(weight, light, heavy) {
                WorkloadBand::Light => summary.light += 1,
                WorkloadBand::Moderate => summary.moderate += 1,
                WorkloadBand::Heavy => summary.heavy += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_model::{AssignmentId, CaseId, TaskId, UserId};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn task(id: i64, status: TaskStatus) -> CaseTask {
        CaseTask::new(TaskId(id), CaseId(1), format!("task {id}")).with_status(status)
    }

    #[test]
    fn counts_statuses_and_deadlines() {
        let tasks = vec![
            task(1, TaskStatus::Todo).with_due(now() - Duration::days(1)),
            task(2, TaskStatus::InProgress).with_due(now() + Duration::hours(2)),
            task(3, TaskStatus::Completed).with_due(now() - Duration::days(5)),
            task(4, TaskStatus::Cancelled),
            task(5, TaskStatus::Review).with_priority(TaskPriority::Urgent),
        ];

        let summary = TaskSummary::compute(&tasks, now(), 3);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.count(TaskStatus::Todo), 1);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.due_today, 1);
        assert_eq!(summary.due_soon, 1);
        assert_eq!(summary.high_priority(), 1);
        assert!((summary.completion_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_task_list() {
        let summary = TaskSummary::compute(&[], now(), 3);
        assert_eq!(summary, TaskSummary::default());
    }

    #[test]
    fn team_bands_use_thresholds() {
        let member = |id: i64, role, weight| {
            CaseAssignment::new(AssignmentId(id), CaseId(1), UserId(id), role).with_workload(weight)
        };
        let mut inactive = member(4, CaseRoleType::Secretary, 10);
        inactive.active = false;

        let team = vec![
            member(1, CaseRoleType::LeadAttorney, 39),
            member(2, CaseRoleType::Paralegal, 40),
            member(3, CaseRoleType::Associate, 80),
            inactive,
        ];

        let summary = TeamSummary::compute(&team, 40, 80);
        assert_eq!(summary.total_members, 3);
        assert_eq!(summary.attorneys, 2);
        assert_eq!((summary.light, summary.moderate, summary.heavy), (1, 1, 1));
        assert_eq!(summary.total_workload, 159);
        assert_eq!(summary.by_role.get(&CaseRoleType::Paralegal), Some(&1));
    }
}
