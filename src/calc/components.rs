use super::round_half_up;
use crate::config::EngineConfig;
use crate::model::{Learner, Roster, Subject};
use serde::Serialize;

/// Weighted contributions before rounding; `total` is what grading sees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    pub exercises: f64,
    pub cats: f64,
    pub terminal: f64,
    pub total: i64,
}

pub fn component_breakdown(
    learner: &Learner,
    subject: &Subject,
    roster: &Roster,
    config: &EngineConfig,
) -> ComponentBreakdown {
    let weights = &config.weights;

    // Exercises: mean of per-entry ratios.
    let mut ratio_sum = 0.0_f64;
    let mut entries = 0_usize;
    for entry in roster.exercises_for(&subject.id) {
        ratio_sum += entry.ratio_for(&learner.id);
        entries += 1;
    }
    let exercise_pct = if entries > 0 {
        100.0 * ratio_sum / entries as f64
    } else {
        0.0
    };

    // CATs: mean of the three component ratios.
    let cat_pct = roster
        .cat_for(&subject.id)
        .map(|cat| {
            let sum: f64 = cat
                .components()
                .iter()
                .map(|c| c.ratio_for(&learner.id))
                .sum();
            100.0 * sum / 3.0
        })
        .unwrap_or(0.0);

    // Terminal: both sections against the applicable maxima.
    let denom = config.terminal_maxima_for(subject, roster).total();
    let terminal_pct = match learner.terminal.get(&subject.id) {
        Some(detail) if denom > 0.0 => 100.0 * detail.raw_total() / denom,
        _ => 0.0,
    };

    let exercises = exercise_pct * weights.exercises / 100.0;
    let cats = cat_pct * weights.cats / 100.0;
    let terminal = terminal_pct * weights.terminal / 100.0;

    ComponentBreakdown {
        exercises,
        cats,
        terminal,
        total: round_half_up(exercises + cats + terminal) as i64,
    }
}

/// Whole-number weighted percentage for one learner in one subject. Not capped
/// at 100: inconsistent weights or maxima pass straight through.
pub fn compute_weighted_subject_score(
    learner: &Learner,
    subject: &Subject,
    roster: &Roster,
    config: &EngineConfig,
) -> i64 {
    component_breakdown(learner, subject, roster, config).total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssessmentWeights, ScienceBasis};
    use crate::model::{
        CatConfig, CatSlot, ExerciseEntry, ExerciseKind, LearnerId, SubjectId, TerminalScoreDetail,
    };
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn weights(e: f64, c: f64, t: f64) -> EngineConfig {
        EngineConfig {
            weights: AssessmentWeights {
                exercises: e,
                cats: c,
                terminal: t,
            },
            ..EngineConfig::default()
        }
    }

    fn exercise(id: &str, subject: &str, max: f64, score: Option<f64>) -> ExerciseEntry {
        let mut scores = BTreeMap::new();
        if let Some(v) = score {
            scores.insert(LearnerId::new("l1"), v);
        }
        ExerciseEntry {
            id: id.to_string(),
            subject: SubjectId::new(subject),
            week: 1,
            kind: ExerciseKind::Classwork,
            max_score: max,
            scores,
        }
    }

    fn learner_with_terminal(subject: &str, objective: f64, theory: f64) -> Learner {
        let mut l = Learner::new("l1", "Akosua");
        l.terminal.insert(
            SubjectId::new(subject),
            TerminalScoreDetail {
                objective,
                theory,
                remark: String::new(),
            },
        );
        l
    }

    #[test]
    fn missing_exercises_contribute_nothing() {
        let subject = Subject::new("math", "Mathematics");
        let learner = learner_with_terminal("math", 30.0, 45.0);
        let mut cat = CatConfig::new(subject.id.clone(), 20.0, 20.0, 20.0);
        cat.record(CatSlot::Cat1, learner.id.clone(), 16.0);
        cat.record(CatSlot::Cat2, learner.id.clone(), 12.0);
        cat.record(CatSlot::Cat3, learner.id.clone(), 20.0);
        let roster = Roster {
            learners: vec![learner.clone()],
            cats: vec![cat],
            ..Roster::default()
        };

        let b = component_breakdown(&learner, &subject, &roster, &weights(20.0, 30.0, 50.0));
        assert_eq!(b.exercises, 0.0);
        // CAT: (0.8 + 0.6 + 1.0) / 3 = 0.8 -> 80% * 0.3 = 24
        assert!((b.cats - 24.0).abs() < 1e-9);
        // Terminal: 75 / 100 -> 75% * 0.5 = 37.5
        assert!((b.terminal - 37.5).abs() < 1e-9);
        assert_eq!(b.total, 62);
    }

    #[test]
    fn exercise_component_averages_entry_ratios() {
        let subject = Subject::new("eng", "English Language");
        let learner = Learner::new("l1", "Akosua");
        let roster = Roster {
            learners: vec![learner.clone()],
            exercises: vec![
                exercise("x1", "eng", 10.0, Some(10.0)),
                exercise("x2", "eng", 20.0, Some(5.0)),
                exercise("x3", "eng", 5.0, None),
                exercise("x4", "math", 10.0, Some(10.0)),
            ],
            ..Roster::default()
        };
        let cfg = weights(100.0, 0.0, 0.0);
        // (1.0 + 0.25 + 0) / 3 = 0.41666 -> 41.67 -> 42
        assert_eq!(compute_weighted_subject_score(&learner, &subject, &roster, &cfg), 42);
    }

    #[test]
    fn missing_cat_configuration_is_zero() {
        let subject = Subject::new("ict", "ICT");
        let learner = Learner::new("l1", "Akosua");
        let roster = Roster {
            learners: vec![learner.clone()],
            ..Roster::default()
        };
        let b = component_breakdown(&learner, &subject, &roster, &weights(0.0, 100.0, 0.0));
        assert_eq!(b.cats, 0.0);
        assert_eq!(b.total, 0);
    }

    #[test]
    fn science_alternate_basis_uses_fixed_denominator() {
        let subject = Subject::new("sci", "Integrated Science");
        let learner = learner_with_terminal("sci", 35.0, 70.0);
        let roster = Roster {
            learners: vec![learner.clone()],
            ..Roster::default()
        };
        let mut cfg = weights(0.0, 0.0, 100.0);
        assert_eq!(compute_weighted_subject_score(&learner, &subject, &roster, &cfg), 105);

        cfg.science.basis = ScienceBasis::Alternate;
        // 105 / 140 = 75%
        assert_eq!(compute_weighted_subject_score(&learner, &subject, &roster, &cfg), 75);
    }

    #[test]
    fn result_is_not_capped_at_one_hundred() {
        let subject = Subject::new("math", "Mathematics");
        let learner = learner_with_terminal("math", 40.0, 60.0);
        let roster = Roster {
            learners: vec![learner.clone()],
            ..Roster::default()
        };
        let cfg = weights(0.0, 0.0, 120.0);
        assert_eq!(compute_weighted_subject_score(&learner, &subject, &roster, &cfg), 120);
    }

    #[test]
    fn negative_raw_scores_count_as_zero() {
        let subject = Subject::new("math", "Mathematics");
        let learner = learner_with_terminal("math", -40.0, 30.0);
        let mut cat = CatConfig::new(subject.id.clone(), 20.0, 20.0, 20.0);
        cat.cat1.scores.insert(learner.id.clone(), -20.0);
        let roster = Roster {
            learners: vec![learner.clone()],
            exercises: vec![exercise("x1", "math", 10.0, Some(-5.0))],
            cats: vec![cat],
            ..Roster::default()
        };
        let b = component_breakdown(&learner, &subject, &roster, &weights(20.0, 30.0, 50.0));
        assert_eq!(b.exercises, 0.0);
        assert_eq!(b.cats, 0.0);
        // 30 / 100 of the terminal half.
        assert_eq!(b.total, 15);
    }

    proptest! {
        #[test]
        fn raising_any_component_never_lowers_the_score(
            ex in 0.0f64..10.0,
            cat in 0.0f64..20.0,
            obj in 0.0f64..40.0,
            theory in 0.0f64..60.0,
            bump in 0.0f64..5.0,
            which in 0usize..4,
        ) {
            let subject = Subject::new("math", "Mathematics");
            let build = |ex: f64, cat_score: f64, obj: f64, theory: f64| {
                let learner = learner_with_terminal("math", obj, theory);
                let mut c = CatConfig::new(subject.id.clone(), 20.0, 20.0, 20.0);
                c.cat1.scores.insert(learner.id.clone(), cat_score);
                let roster = Roster {
                    learners: vec![learner.clone()],
                    exercises: vec![exercise("x1", "math", 10.0, Some(ex))],
                    cats: vec![c],
                    ..Roster::default()
                };
                compute_weighted_subject_score(&learner, &subject, &roster, &weights(20.0, 30.0, 50.0))
            };

            let base = build(ex, cat, obj, theory);
            let raised = match which {
                0 => build(ex + bump, cat, obj, theory),
                1 => build(ex, cat + bump, obj, theory),
                2 => build(ex, cat, obj + bump, theory),
                _ => build(ex, cat, obj, theory + bump),
            };
            prop_assert!(raised >= base);
            prop_assert!(base >= 0);
        }

        #[test]
        fn score_is_never_negative(
            ex in -50.0f64..50.0,
            cat in -50.0f64..50.0,
            obj in -100.0f64..100.0,
            theory in -100.0f64..100.0,
        ) {
            let subject = Subject::new("math", "Mathematics");
            let learner = learner_with_terminal("math", obj, theory);
            let mut c = CatConfig::new(subject.id.clone(), 20.0, 20.0, 20.0);
            c.cat2.scores.insert(learner.id.clone(), cat);
            let roster = Roster {
                learners: vec![learner.clone()],
                exercises: vec![exercise("x1", "math", 10.0, Some(ex))],
                cats: vec![c],
                ..Roster::default()
            };
            let score =
                compute_weighted_subject_score(&learner, &subject, &roster, &weights(20.0, 30.0, 50.0));
            prop_assert!(score >= 0);
        }
    }
}
