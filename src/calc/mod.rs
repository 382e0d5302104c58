mod aggregate;
mod class;
mod components;
mod grading;
mod stats;

pub use aggregate::{categorize, rank_outcomes, select_aggregate, AggregateOutcome, AggregateSelection};
pub use class::{compute_class, ClassComputation, ComputedSubjectScore, GradeCount, SubjectSummary};
pub use components::{component_breakdown, compute_weighted_subject_score, ComponentBreakdown};
pub use grading::{effective_z, resolve_grade, ResolvedGrade};
pub use stats::{compute_class_statistics, ClassStatistics};

use crate::config::EngineConfig;
use crate::model::{LearnerId, Roster, Subject};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

/// Round half up to a whole number: `Int(x + 0.5)`.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// 1-decimal rounding for displayed means: `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerOutcome {
    pub learner_id: LearnerId,
    pub name: String,
    pub serial: Option<String>,
    pub fees_cleared: bool,
    pub scores: Vec<ComputedSubjectScore>,
    pub aggregate: AggregateOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterReport {
    pub class_name: String,
    pub class_size: usize,
    pub subjects: Vec<SubjectSummary>,
    /// Ordered by rank, best first.
    pub learners: Vec<LearnerOutcome>,
}

/// Full pipeline for one class: weighted scores, class statistics, grades,
/// best-N aggregates and ranks.
pub fn process_roster(
    roster: &Roster,
    config: &EngineConfig,
    subjects: &[Subject],
) -> Result<RosterReport, CalcError> {
    config.validate_roster(roster, subjects)?;

    let computation = compute_class(roster, config, subjects);

    let mut outcomes: Vec<LearnerOutcome> = roster
        .learners
        .iter()
        .zip(computation.per_learner)
        .map(|(learner, scores)| {
            let selection = select_aggregate(&scores, &config.policy);
            let band = categorize(selection.points, &config.policy);
            tracing::trace!(
                learner = %learner.id,
                points = selection.points,
                selected = ?selection.selected,
                "aggregate selected"
            );
            LearnerOutcome {
                learner_id: learner.id.clone(),
                name: learner.name.clone(),
                serial: learner.serial.clone(),
                fees_cleared: learner.fees_cleared,
                scores,
                aggregate: AggregateOutcome {
                    aggregate_points: selection.points,
                    complete: selection.complete,
                    category_code: band.code.clone(),
                    category_label: band.label.clone(),
                    rank: 0,
                },
            }
        })
        .collect();
    rank_outcomes(&mut outcomes);

    tracing::debug!(
        class = %roster.class_name,
        learners = outcomes.len(),
        subjects = subjects.len(),
        "processed roster"
    );

    Ok(RosterReport {
        class_name: roster.class_name.clone(),
        class_size: roster.learners.len(),
        subjects: computation.subjects,
        learners: outcomes,
    })
}
