use super::{ComputedSubjectScore, LearnerOutcome};
use crate::config::{CategoryBand, PolicyConstants};
use crate::model::SubjectId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOutcome {
    pub aggregate_points: u32,
    /// False when the incomplete-load sentinel stands in for a real sum.
    pub complete: bool,
    pub category_code: String,
    pub category_label: String,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSelection {
    pub points: u32,
    pub complete: bool,
    pub selected: Vec<SubjectId>,
}

/// Picks the best-graded core and elective subjects and sums their points.
///
/// `scores` must already be ordered best score first; ties on grade value keep
/// that order. Too few core or elective subjects yields the policy sentinel
/// instead of a partial sum.
pub fn select_aggregate(scores: &[ComputedSubjectScore], policy: &PolicyConstants) -> AggregateSelection {
    let (core_count, elective_count) = (policy.core_count.get(), policy.elective_count.get());
    let core = best_graded(scores, true, core_count);
    let elective = best_graded(scores, false, elective_count);
    if core.len() < core_count || elective.len() < elective_count {
        return AggregateSelection {
            points: policy.incomplete_aggregate,
            complete: false,
            selected: Vec::new(),
        };
    }

    let picked: Vec<&ComputedSubjectScore> = core.into_iter().chain(elective).collect();
    AggregateSelection {
        points: picked
            .iter()
            .fold(0_u32, |acc, s| acc.saturating_add(s.grade_value)),
        complete: true,
        selected: picked.iter().map(|s| s.subject_id.clone()).collect(),
    }
}

fn best_graded(
    scores: &[ComputedSubjectScore],
    core: bool,
    take: usize,
) -> Vec<&ComputedSubjectScore> {
    let mut group: Vec<&ComputedSubjectScore> =
        scores.iter().filter(|s| s.is_core == core).collect();
    group.sort_by_key(|s| s.grade_value);
    group.truncate(take);
    group
}

pub fn categorize(points: u32, policy: &PolicyConstants) -> &CategoryBand {
    policy.category_bands.category_for(points)
}

/// Sorts ascending by aggregate (stable) and numbers ranks from 1.
pub fn rank_outcomes(outcomes: &mut [LearnerOutcome]) {
    outcomes.sort_by_key(|o| o.aggregate.aggregate_points);
    for (i, o) in outcomes.iter_mut().enumerate() {
        o.aggregate.rank = i + 1;
    }
}
