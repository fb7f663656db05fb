//! Task analytics for a case

use caseflow_model::{CaseTask, TaskStatus, TaskType, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-assignee task figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeStats {
    /// Tasks assigned
    pub total: usize,
    /// Completed
    pub completed: usize,
    /// Active and overdue
    pub overdue: usize,
}

/// Aggregate task figures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalytics {
    /// Figures per assignee
    pub by_assignee: BTreeMap<UserId, AssigneeStats>,
    /// Active tasks nobody owns
    pub unassigned_active: usize,
    /// Tasks per type
    pub by_type: BTreeMap<String, usize>,
    /// Mean estimate of estimated tasks, in hours
    pub average_estimate_hours: Option<f64>,
    /// Overdue share of active tasks, 0..=100
    pub overdue_rate: f64,
}

impl TaskAnalytics {
    /// Analyze `tasks` as of `now`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(tasks: &[CaseTask], now: DateTime<Utc>) -> Self {
        let mut report = Self::default();
        let mut active = 0_usize;
        let mut overdue = 0_usize;
        let mut estimates = Vec::new();

        for task in tasks {
            *report.by_type.entry(type_label(task.task_type)).or_default() += 1;
            if let Some(hours) = task.estimated_hours {
                estimates.push(hours);
            }
            if task.is_active() {
                active += 1;
                if task.assigned_to_id.is_none() {
                    report.unassigned_active += 1;
                }
            }
            let late = task.is_overdue(now);
            if late {
                overdue += 1;
            }

            if let Some(user) = task.assigned_to_id {
                let stats = report.by_assignee.entry(user).or_default();
                stats.total += 1;
                if task.status == TaskStatus::Completed {
                    stats.completed += 1;
                }
                if late {
                    stats.overdue += 1;
                }
            }
        }

        if !estimates.is_empty() {
            report.average_estimate_hours =
                Some(estimates.iter().sum::<f64>() / estimates.len() as f64);
        }
        if active > 0 {
            report.overdue_rate = overdue as f64 * 100.0 / active as f64;
        }
        report
    }

    /// Assignee with the most overdue work, if anyone is behind
    #[must_use]
    pub fn most_behind(&self) -> Option<UserId> {
        self.by_assignee
            .iter()
            .filter(|(_, s)| s.overdue > 0)
            .max_by_key(|(user, s)| (s.overdue, std::cmp::Reverse(**user)))
            .map(|(user, _)| *user)
    }
}

fn type_label(task_type: TaskType) -> String {
    serde_json::to_value(task_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "OTHER".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_model::{CaseId, TaskId};
    use chrono::{Duration, TimeZone};

    #[test]
    fn aggregates_per_assignee() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let late = now - Duration::days(2);
        let mut filing = CaseTask::new(TaskId(3), CaseId(1), "file").with_estimate(2.0);
        filing.task_type = TaskType::Filing;

        let tasks = vec![
            CaseTask::new(TaskId(1), CaseId(1), "a").assigned_to(UserId(1)).with_due(late),
            CaseTask::new(TaskId(2), CaseId(1), "b")
                .assigned_to(UserId(1))
                .with_status(TaskStatus::Completed)
                .with_estimate(6.0),
            filing,
        ];

        let report = TaskAnalytics::compute(&tasks, now);
        let stats = report.by_assignee[&UserId(1)];
        assert_eq!((stats.total, stats.completed, stats.overdue), (2, 1, 1));
        assert_eq!(report.unassigned_active, 1);
        assert_eq!(report.by_type.get("FILING"), Some(&1));
        assert_eq!(report.average_estimate_hours, Some(4.0));
        assert!((report.overdue_rate - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.most_behind(), Some(UserId(1)));
    }

    #[test]
    fn empty_report() {
        let report = TaskAnalytics::compute(&[], Utc::now());
        assert_eq!(report.most_behind(), None);
        assert!(report.average_estimate_hours.is_none());
    }
}
