use super::{
    compute_class_statistics, compute_weighted_subject_score, resolve_grade, round_off_1_decimal,
    ClassStatistics,
};
use crate::config::EngineConfig;
use crate::model::{Roster, Subject, SubjectId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedSubjectScore {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub weighted_score: i64,
    pub grade: String,
    pub grade_value: u32,
    pub remark: String,
    pub color: String,
    /// Class mean for the subject, rounded to one decimal for display.
    pub class_mean: f64,
    pub is_core: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub name: String,
    pub is_core: bool,
    pub mean: f64,
    pub std_dev: f64,
    /// One entry per scale band, best first.
    pub grade_counts: Vec<GradeCount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassComputation {
    pub subjects: Vec<SubjectSummary>,
    /// Indexed like `roster.learners`; each list best subject first.
    pub per_learner: Vec<Vec<ComputedSubjectScore>>,
}

pub fn compute_class(roster: &Roster, config: &EngineConfig, subjects: &[Subject]) -> ClassComputation {
    let class_size = roster.learners.len();

    // matrix[s][l]
    let matrix: Vec<Vec<i64>> = subjects
        .iter()
        .map(|subject| {
            roster
                .learners
                .iter()
                .map(|learner| compute_weighted_subject_score(learner, subject, roster, config))
                .collect()
        })
        .collect();

    let column_stats: Vec<ClassStatistics> = matrix
        .iter()
        .map(|column| {
            let values: Vec<f64> = column.iter().map(|v| *v as f64).collect();
            compute_class_statistics(&values)
        })
        .collect();

    let mut per_learner: Vec<Vec<ComputedSubjectScore>> =
        vec![Vec::with_capacity(subjects.len()); class_size];
    let mut summaries: Vec<SubjectSummary> = Vec::with_capacity(subjects.len());

    for (s_idx, subject) in subjects.iter().enumerate() {
        let stats = &column_stats[s_idx];
        let is_core = config.is_core(&subject.id);
        let mut grade_counts: Vec<GradeCount> = config
            .scale
            .entries()
            .iter()
            .map(|e| GradeCount {
                grade: e.grade.clone(),
                count: 0,
            })
            .collect();

        for (l_idx, score) in matrix[s_idx].iter().enumerate() {
            let resolved = resolve_grade(*score as f64, stats, config, class_size);
            if let Some(gc) = grade_counts.iter_mut().find(|gc| gc.grade == resolved.grade) {
                gc.count += 1;
            }
            per_learner[l_idx].push(ComputedSubjectScore {
                subject_id: subject.id.clone(),
                subject_name: subject.name.clone(),
                weighted_score: *score,
                grade: resolved.grade,
                grade_value: resolved.point_value,
                remark: resolved.remark,
                color: resolved.color,
                class_mean: round_off_1_decimal(stats.mean),
                is_core,
            });
        }

        summaries.push(SubjectSummary {
            subject_id: subject.id.clone(),
            name: subject.name.clone(),
            is_core,
            mean: stats.mean,
            std_dev: stats.std_dev,
            grade_counts,
        });
    }

    // Stable: equal scores keep subject enumeration order.
    for scores in &mut per_learner {
        scores.sort_by(|a, b| b.weighted_score.cmp(&a.weighted_score));
    }

    ClassComputation {
        subjects: summaries,
        per_learner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssessmentWeights;
    use crate::model::{Learner, TerminalScoreDetail};

    fn terminal_only() -> EngineConfig {
        EngineConfig {
            weights: AssessmentWeights {
                exercises: 0.0,
                cats: 0.0,
                terminal: 100.0,
            },
            core_subjects: [SubjectId::new("math")].into_iter().collect(),
            ..EngineConfig::default()
        }
    }

    fn learner(id: &str, marks: &[(&str, f64)]) -> Learner {
        let mut l = Learner::new(id, id);
        for (subject, theory) in marks {
            l.terminal.insert(
                SubjectId::new(*subject),
                TerminalScoreDetail {
                    objective: 0.0,
                    theory: *theory,
                    remark: String::new(),
                },
            );
        }
        l
    }

    #[test]
    fn uniform_subject_gives_everyone_the_middle_band() {
        let subjects = vec![Subject::new("math", "Mathematics"), Subject::new("art", "Art")];
        let roster = Roster {
            learners: vec![
                learner("a", &[("math", 50.0), ("art", 10.0)]),
                learner("b", &[("math", 50.0), ("art", 90.0)]),
                learner("c", &[("math", 50.0), ("art", 40.0)]),
            ],
            ..Roster::default()
        };
        let out = compute_class(&roster, &terminal_only(), &subjects);
        for scores in &out.per_learner {
            let math = scores
                .iter()
                .find(|s| s.subject_id.as_str() == "math")
                .expect("math");
            assert_eq!(math.grade, "C5");
            assert_eq!(math.class_mean, 50.0);
        }
        assert_eq!(out.subjects[0].std_dev, 0.0);
        let c5 = out.subjects[0]
            .grade_counts
            .iter()
            .find(|g| g.grade == "C5")
            .expect("c5");
        assert_eq!(c5.count, 3);
    }

    #[test]
    fn zero_weight_subject_is_zero_for_everyone_without_error() {
        let subjects = vec![Subject::new("math", "Mathematics")];
        let mut cfg = terminal_only();
        cfg.weights.terminal = 0.0;
        let roster = Roster {
            learners: vec![learner("a", &[("math", 80.0)]), learner("b", &[("math", 20.0)])],
            ..Roster::default()
        };
        let out = compute_class(&roster, &cfg, &subjects);
        assert!(out
            .per_learner
            .iter()
            .all(|s| s[0].weighted_score == 0 && s[0].grade == "C5"));
    }

    #[test]
    fn learner_lists_are_sorted_best_subject_first_with_stable_ties() {
        let subjects = vec![
            Subject::new("math", "Mathematics"),
            Subject::new("eng", "English"),
            Subject::new("art", "Art"),
        ];
        let roster = Roster {
            learners: vec![learner("a", &[("math", 40.0), ("eng", 70.0), ("art", 70.0)])],
            ..Roster::default()
        };
        let out = compute_class(&roster, &terminal_only(), &subjects);
        let order: Vec<&str> = out.per_learner[0]
            .iter()
            .map(|s| s.subject_id.as_str())
            .collect();
        assert_eq!(order, vec!["eng", "art", "math"]);
        assert!(out.per_learner[0][2].is_core);
    }
}
