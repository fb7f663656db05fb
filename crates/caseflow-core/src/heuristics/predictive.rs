//! Completion forecasts
//!
//! Works each member's active tasks in due-date order against a fixed daily
//! capacity and flags the tasks that would finish after their due date.

use caseflow_model::{CaseAssignment, CaseTask, TaskId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Hours assumed for a task without an estimate
pub const DEFAULT_TASK_HOURS: f64 = 4.0;

/// Forecast for one member
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberForecast {
    /// Member
    pub user_id: UserId,
    /// Estimated hours of open work
    pub remaining_hours: f64,
    /// Working days to clear it
    pub days_to_clear: f64,
    /// Tasks projected to finish late
    pub at_risk: Vec<TaskId>,
}

/// Forecast every active member's open work
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn forecast(
    team: &[CaseAssignment],
    tasks: &[CaseTask],
    now: DateTime<Utc>,
    hours_per_day: f64,
) -> Vec<MemberForecast> {
    let hours_per_day = if hours_per_day > 0.0 { hours_per_day } else { 8.0 };

    team.iter()
        .filter(|m| m.active)
        .map(|member| {
            let mut mine: Vec<&CaseTask> = tasks
                .iter()
                .filter(|t| t.is_active() && t.assigned_to_id == Some(member.user_id))
                .collect();
            mine.sort_by(|a, b| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.id.cmp(&b.id),
            });

            let mut elapsed = 0.0;
            let mut at_risk = Vec::new();
            for task in mine {
                elapsed += task.estimated_hours.unwrap_or(DEFAULT_TASK_HOURS).max(0.0);
                let minutes = (elapsed / hours_per_day * 24.0 * 60.0) as i64;
                let finish = now + Duration::minutes(minutes);
                if task.due_date.is_some_and(|due| finish > due) {
                    at_risk.push(task.id);
                }
            }

            MemberForecast {
                user_id: member.user_id,
                remaining_hours: elapsed,
                days_to_clear: elapsed / hours_per_day,
                at_risk,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_model::{AssignmentId, CaseId, CaseRoleType};
    use chrono::TimeZone;

    #[test]
    fn flags_tasks_that_cannot_finish_in_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
        let team = [CaseAssignment::new(
            AssignmentId(1),
            CaseId(1),
            UserId(1),
            CaseRoleType::Paralegal,
        )];
        let tasks = vec![
            CaseTask::new(TaskId(1), CaseId(1), "big")
                .assigned_to(UserId(1))
                .with_estimate(16.0)
                .with_due(now + Duration::days(3)),
            CaseTask::new(TaskId(2), CaseId(1), "tight")
                .assigned_to(UserId(1))
                .with_estimate(8.0)
                .with_due(now + Duration::days(2)),
        ];

        let forecasts = forecast(&team, &tasks, now, 8.0);
        assert_eq!(forecasts.len(), 1);
        assert!((forecasts[0].remaining_hours - 24.0).abs() < f64::EPSILON);
        assert!((forecasts[0].days_to_clear - 3.0).abs() < f64::EPSILON);
        // tight (1 day) first, then big finishes at day 3, exactly on its due date
        assert!(forecasts[0].at_risk.is_empty());

        let slow = forecast(&team, &tasks, now, 4.0);
        assert_eq!(slow[0].at_risk, vec![TaskId(1)]);
    }

    #[test]
    fn unestimated_tasks_use_default_hours() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
        let team = [CaseAssignment::new(
            AssignmentId(1),
            CaseId(1),
            UserId(1),
            CaseRoleType::Paralegal,
        )];
        let tasks = vec![CaseTask::new(TaskId(1), CaseId(1), "x").assigned_to(UserId(1))];
        let forecasts = forecast(&team, &tasks, now, 8.0);
        assert!((forecasts[0].remaining_hours - DEFAULT_TASK_HOURS).abs() < f64::EPSILON);
    }
}
