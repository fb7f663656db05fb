//! Workload balancing
//!
//! `score = min(100, active * 10 + overdue * 15)`, banded as:
//!
//! | score   | band          |
//! |---------|---------------|
//! | < 40    | underutilized |
//! | 40..60  | available     |
//! | 60..80  | balanced      |
//! | >= 80   | overloaded    |
//!
//! Members below 60 can take work from overloaded members.

use caseflow_model::{CaseAssignment, CaseRoleType, CaseTask, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Points per active task
pub const ACTIVE_TASK_POINTS: u32 = 10;
/// Extra points per overdue task
pub const OVERDUE_TASK_POINTS: u32 = 15;
/// Scores below this can receive rebalanced work
pub const REBALANCE_TARGET_BELOW: u32 = 60;

/// Workload score, capped at 100
#[must_use]
pub fn workload_score(active: u32, overdue: u32) -> u32 {
    active
        .saturating_mul(ACTIVE_TASK_POINTS)
        .saturating_add(overdue.saturating_mul(OVERDUE_TASK_POINTS))
        .min(100)
}

/// Workload band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBand {
    /// Below 40
    Underutilized,
    /// 40 to 59
    Available,
    /// 60 to 79
    Balanced,
    /// 80 and above
    Overloaded,
}

impl LoadBand {
    /// Band for a score
    #[must_use]
    pub fn of(score: u32) -> Self {
        match score {
            0..=39 => Self::Underutilized,
            40..=59 => Self::Available,
            60..=79 => Self::Balanced,
            _ => Self::Overloaded,
        }
    }
}

/// One member's computed load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLoad {
    /// Member
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// Case role
    pub role: CaseRoleType,
    /// Active tasks assigned
    pub active_tasks: u32,
    /// Of which overdue
    pub overdue_tasks: u32,
    /// Score
    pub score: u32,
    /// Band
    pub band: LoadBand,
}

impl MemberLoad {
    /// Build from counts
    #[must_use]
    pub fn new(member: &CaseAssignment, active_tasks: u32, overdue_tasks: u32) -> Self {
        let score = workload_score(active_tasks, overdue_tasks);
        Self {
            user_id: member.user_id,
            name: member.display_name(),
            role: member.role_type,
            active_tasks,
            overdue_tasks,
            score,
            band: LoadBand::of(score),
        }
    }
}

/// Proposal to move one task between members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSuggestion {
    /// Task to move
    pub task_id: TaskId,
    /// Overloaded member
    pub from_user: UserId,
    /// Receiving member
    pub to_user: UserId,
    /// Human-readable reason
    pub reason: String,
}

/// Workload scoring over a case's team and tasks
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadBalancer;

impl WorkloadBalancer {
    /// Load of every active team member
    #[must_use]
    pub fn member_loads(
        team: &[CaseAssignment],
        tasks: &[CaseTask],
        now: DateTime<Utc>,
    ) -> Vec<MemberLoad> {
        team.iter()
            .filter(|m| m.active)
            .map(|member| {
                let mine = tasks
                    .iter()
                    .filter(|t| t.is_active() && t.assigned_to_id == Some(member.user_id));
                let (active, overdue) = mine.fold((0_u32, 0_u32), |(a, o), t| {
                    (a + 1, o + u32::from(t.is_overdue(now)))
                });
                MemberLoad::new(member, active, overdue)
            })
            .collect()
    }

    /// Members who should shed work
    #[must_use]
    pub fn overloaded(loads: &[MemberLoad]) -> Vec<&MemberLoad> {
        loads.iter().filter(|l| l.band == LoadBand::Overloaded).collect()
    }

    /// Suggest moving tasks from overloaded members to members below 60
    ///
    /// Lowest-priority, latest-due tasks move first. Projected scores are
    /// updated as suggestions accumulate; a source stops once it would drop
    /// below 80 and a target stops once it would reach 60.
    #[must_use]
    pub fn suggest_rebalancing(
        loads: &[MemberLoad],
        tasks: &[CaseTask],
        now: DateTime<Utc>,
    ) -> Vec<RebalanceSuggestion> {
        let mut projected: Vec<(UserId, u32, u32)> = loads
            .iter()
            .map(|l| (l.user_id, l.active_tasks, l.overdue_tasks))
            .collect();
        let score_of = |p: &(UserId, u32, u32)| workload_score(p.1, p.2);

        let mut suggestions = Vec::new();
        for source in Self::overloaded(loads) {
            let mut movable: Vec<&CaseTask> = tasks
                .iter()
                .filter(|t| t.is_active() && t.assigned_to_id == Some(source.user_id))
                .collect();
            movable.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.due_date.cmp(&a.due_date))
                    .then_with(|| a.id.cmp(&b.id))
            });

            for task in movable {
                let Some(src) = projected.iter().position(|p| p.0 == source.user_id) else {
                    break;
                };
                if score_of(&projected[src]) < 80 {
                    break;
                }
                let target = projected
                    .iter()
                    .enumerate()
                    .filter(|(i, p)| *i != src && score_of(p) < REBALANCE_TARGET_BELOW)
                    .min_by_key(|(_, p)| (score_of(p), p.0))
                    .map(|(i, _)| i);
                let Some(dst) = target else {
                    break;
                };

                let overdue = u32::from(task.is_overdue(now));
                projected[src].1 = projected[src].1.saturating_sub(1);
                projected[src].2 = projected[src].2.saturating_sub(overdue);
                projected[dst].1 += 1;
                projected[dst].2 += overdue;

                suggestions.push(RebalanceSuggestion {
                    task_id: task.id,
                    from_user: source.user_id,
                    to_user: projected[dst].0,
                    reason: format!(
                        "{} is overloaded (score {}); user {} has capacity",
                        source.name, source.score, projected[dst].0
                    ),
                });
            }
        }
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_model::{AssignmentId, CaseId, TaskPriority};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn member(id: i64) -> CaseAssignment {
        CaseAssignment::new(AssignmentId(id), CaseId(1), UserId(id), CaseRoleType::Associate)
    }

    fn tasks_for(user: i64, active: usize, overdue: usize, first_id: i64) -> Vec<CaseTask> {
        (0..active)
            .map(|i| {
                let id = first_id + i64::try_from(i).unwrap();
                let task = CaseTask::new(TaskId(id), CaseId(1), "t").assigned_to(UserId(user));
                if i < overdue {
                    task.with_due(now() - Duration::days(1))
                } else {
                    task
                }
            })
            .collect()
    }

    #[test]
    fn score_boundaries() {
        assert_eq!(workload_score(6, 0), 60);
        assert_eq!(workload_score(6, 1), 75);
        assert_eq!(LoadBand::of(workload_score(7, 0)), LoadBand::Balanced);
        assert_eq!(LoadBand::of(workload_score(8, 0)), LoadBand::Overloaded);
        assert_eq!(workload_score(20, 5), 100);
    }

    #[test]
    fn loads_count_only_active_tasks() {
        let mut tasks = tasks_for(1, 6, 1, 1);
        tasks.push(
            CaseTask::new(TaskId(99), CaseId(1), "done")
                .assigned_to(UserId(1))
                .with_status(caseflow_model::TaskStatus::Completed),
        );

        let loads = WorkloadBalancer::member_loads(&[member(1)], &tasks, now());
        assert_eq!(loads[0].active_tasks, 6);
        assert_eq!(loads[0].overdue_tasks, 1);
        assert_eq!(loads[0].score, 75);
        assert_eq!(loads[0].band, LoadBand::Balanced);
    }

    #[test]
    fn rebalancing_moves_low_priority_work_to_idle_member() {
        let mut tasks = tasks_for(1, 9, 0, 1);
        tasks[0].priority = TaskPriority::Urgent;
        tasks[8].priority = TaskPriority::Low;
        let team = [member(1), member(2)];
        let loads = WorkloadBalancer::member_loads(&team, &tasks, now());

        let suggestions = WorkloadBalancer::suggest_rebalancing(&loads, &tasks, now());
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].task_id, TaskId(9));
        assert!(suggestions.iter().all(|s| s.to_user == UserId(2)));
    }

    #[test]
    fn no_targets_no_suggestions() {
        let mut tasks = tasks_for(1, 9, 0, 1);
        tasks.extend(tasks_for(2, 6, 0, 100));
        let loads = WorkloadBalancer::member_loads(&[member(1), member(2)], &tasks, now());
        assert!(WorkloadBalancer::suggest_rebalancing(&loads, &tasks, now()).is_empty());
    }

    #[test]
    fn loads_disagreeing_with_tasks_do_not_underflow() {
        let loads = [MemberLoad::new(&member(1), 0, 6), MemberLoad::new(&member(2), 0, 0)];
        let tasks = tasks_for(1, 3, 0, 1);

        let suggestions = WorkloadBalancer::suggest_rebalancing(&loads, &tasks, now());
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions.iter().all(|s| s.from_user == UserId(1)));
    }

    proptest! {
        #[test]
        fn score_is_capped_and_monotonic(active in 0_u32..50, overdue in 0_u32..50) {
            let score = workload_score(active, overdue);
            prop_assert!(score <= 100);
            prop_assert!(workload_score(active + 1, overdue) >= score);
            prop_assert!(workload_score(active, overdue + 1) >= score);
        }

        #[test]
        fn band_matches_thresholds(score in 0_u32..=100) {
            let band = LoadBand::of(score);
            prop_assert_eq!(band == LoadBand::Overloaded, score >= 80);
            prop_assert_eq!(band == LoadBand::Underutilized, score < 40);
        }
    }
}
