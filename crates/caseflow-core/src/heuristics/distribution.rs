//! Greedy task distribution
//!
//! Tasks are placed most urgent first, each on the member with the lowest
//! projected workload score. Every placement raises the receiver's projected
//! score by one active task.

use super::workload::{workload_score, MemberLoad};
use caseflow_model::{CaseTask, TaskId, UserId};
use serde::Serialize;

/// Proposed owner for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Task
    pub task_id: TaskId,
    /// Proposed assignee
    pub user_id: UserId,
    /// Assignee's projected score after taking the task
    pub projected_score: u32,
}

/// Distribute `tasks` across `members`
///
/// Returns no placements when there are no members.
#[must_use]
pub fn distribute(tasks: &[CaseTask], members: &[MemberLoad]) -> Vec<Placement> {
    let mut projected: Vec<(UserId, u32, u32)> = members
        .iter()
        .map(|m| (m.user_id, m.active_tasks, m.overdue_tasks))
        .collect();
    if projected.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<&CaseTask> = tasks.iter().filter(|t| t.is_active()).collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    ordered
        .into_iter()
        .filter_map(|task| {
            let slot = projected
                .iter_mut()
                .min_by_key(|(user, active, overdue)| {
                    (workload_score(*active, *overdue), *active, *user)
                })?;
            slot.1 += 1;
            Some(Placement {
                task_id: task.id,
                user_id: slot.0,
                projected_score: workload_score(slot.1, slot.2),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::workload::LoadBand;
    use caseflow_model::{CaseId, CaseRoleType, TaskPriority};

    fn load(user: i64, active: u32) -> MemberLoad {
        let score = workload_score(active, 0);
        MemberLoad {
            user_id: UserId(user),
            name: format!("user {user}"),
            role: CaseRoleType::Associate,
            active_tasks: active,
            overdue_tasks: 0,
            score,
            band: LoadBand::of(score),
        }
    }

    #[test]
    fn urgent_work_goes_to_least_loaded_first() {
        let tasks = vec![
            CaseTask::new(TaskId(1), CaseId(1), "low").with_priority(TaskPriority::Low),
            CaseTask::new(TaskId(2), CaseId(1), "urgent").with_priority(TaskPriority::Urgent),
        ];
        let placements = distribute(&tasks, &[load(1, 3), load(2, 1)]);

        assert_eq!(placements[0].task_id, TaskId(2));
        assert_eq!(placements[0].user_id, UserId(2));
        assert_eq!(placements[0].projected_score, 20);
        assert_eq!(placements[1].user_id, UserId(2));
    }

    #[test]
    fn load_spreads_evenly() {
        let tasks: Vec<_> = (1..=4)
            .map(|i| CaseTask::new(TaskId(i), CaseId(1), "t"))
            .collect();
        let placements = distribute(&tasks, &[load(1, 0), load(2, 0)]);
        let to_one = placements.iter().filter(|p| p.user_id == UserId(1)).count();
        assert_eq!(to_one, 2);
    }

    #[test]
    fn no_members_no_placements() {
        let tasks = vec![CaseTask::new(TaskId(1), CaseId(1), "t")];
        assert!(distribute(&tasks, &[]).is_empty());
    }
}
