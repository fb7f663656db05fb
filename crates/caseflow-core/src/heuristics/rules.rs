//! Assignment suitability rules
//!
//! Score per candidate, clamped to 0..=100:
//! - base 50
//! - +30 when the candidate already holds the required role
//! - +25 for a "partner" title, else +20 for a "senior" title
//! - minus every workload point above 70

use caseflow_model::{CaseAssignment, CaseRoleType, User, UserId, UserWorkload};
use serde::Serialize;

const BASE_SCORE: i64 = 50;
const ROLE_MATCH: i64 = 30;
const PARTNER_BONUS: i64 = 25;
const SENIOR_BONUS: i64 = 20;
const WORKLOAD_SOFT_CAP: i64 = 70;

/// Someone who could take an assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// User
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// Job title
    pub title: Option<String>,
    /// Role the candidate holds (on this or similar cases)
    pub role: Option<CaseRoleType>,
    /// Current workload weight, 0..=100
    pub workload_weight: u32,
}

impl Candidate {
    /// From a user and their workload figures
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_user(user: &User, workload: Option<&UserWorkload>) -> Self {
        Self {
            user_id: user.id,
            name: user.full_name(),
            title: user.title.clone(),
            role: None,
            workload_weight: workload.map_or(0, |w| {
                w.capacity_percentage.clamp(0.0, 100.0).round() as u32
            }),
        }
    }

    /// From an existing team record
    #[must_use]
    pub fn from_member(member: &CaseAssignment) -> Self {
        Self {
            user_id: member.user_id,
            name: member.display_name(),
            title: None,
            role: Some(member.role_type),
            workload_weight: member.workload(),
        }
    }

    /// With role
    #[inline]
    #[must_use]
    pub fn with_role(mut self, role: CaseRoleType) -> Self {
        self.role = Some(role);
        self
    }
}

/// A scored candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    /// Candidate
    pub candidate: Candidate,
    /// Score, 0..=100
    pub score: u32,
    /// Contributing factors
    pub reasons: Vec<String>,
}

/// Suitability score with its contributing factors
#[must_use]
pub fn suitability(
    candidate: &Candidate,
    required_role: Option<CaseRoleType>) -> (u32, Vec<String>,
) {
    let mut score = BASE_SCORE;
    let mut reasons = Vec::new();

    if required_role.is_some() && candidate.role == required_role {
        score += ROLE_MATCH;
        reasons.push("role match".to_string());
    }

    let title = candidate.title.as_deref().unwrap_or_default().to_lowercase();
    if title.contains("partner") {
        score += PARTNER_BONUS;
        reasons.push("partner".to_string());
    } else if title.contains("senior") {
        score += SENIOR_BONUS;
        reasons.push("senior".to_string());
    }

    let over = (i64::from(candidate.workload_weight) - WORKLOAD_SOFT_CAP).max(0);
    if over > 0 {
        score -= over;
        reasons.push(format!("high workload ({})", candidate.workload_weight));
    }

    let clamped = u32::try_from(score.clamp(0, 100)).unwrap_or(0);
    (clamped, reasons)
}

/// Candidates ordered best first; ties go to the lighter workload
#[must_use]
pub fn rank_candidates(
    candidates: &[Candidate],
    required_role: Option<CaseRoleType>,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .map(|candidate| {
            let (score, reasons) = suitability(candidate, required_role);
            RankedCandidate {
                candidate: candidate.clone(),
                score,
                reasons,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.candidate.workload_weight.cmp(&b.candidate.workload_weight))
            .then_with(|| a.candidate.user_id.cmp(&b.candidate.user_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        id: i64,
        title: Option<&str>,
        role: Option<CaseRoleType>,
        weight: u32,
    ) -> Candidate {
        Candidate {
            user_id: UserId(id),
            name: format!("user {id}"),
            title: title.map(str::to_string),
            role,
            workload_weight: weight,
        }
    }

    #[test]
    fn base_score_for_plain_candidate() {
        assert_eq!(suitability(&candidate(1, None, None, 0), None).0, 50);
    }

    #[test]
    fn bonuses_stack_and_clamp() {
        let lead = Some(CaseRoleType::LeadAttorney);
        let partner = candidate(1, Some("Managing Partner"), lead, 10);
        assert_eq!(suitability(&partner, lead).0, 100);

        let senior = candidate(2, Some("Senior Associate"), None, 0);
        assert_eq!(suitability(&senior, lead).0, 70);
    }

    #[test]
    fn workload_over_seventy_is_penalized() {
        let busy = candidate(1, None, None, 95);
        let (score, reasons) = suitability(&busy, None);
        assert_eq!(score, 25);
        assert!(reasons.iter().any(|r| r.contains("workload")));
    }

    #[test]
    fn ranking_prefers_score_then_lighter_load() {
        let ranked = rank_candidates(
            &[
                candidate(1, None, None, 60),
                candidate(2, None, None, 20),
                candidate(3, Some("Senior Counsel"), None, 0),
            ],
            None,
        );
        let order: Vec<_> = ranked.iter().map(|r| r.candidate.user_id).collect();
        assert_eq!(order, vec![UserId(3), UserId(2), UserId(1)]);
    }
}
