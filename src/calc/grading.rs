use super::ClassStatistics;
use crate::config::{DistributionModel, EngineConfig, GradingScaleEntry};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGrade {
    pub grade: String,
    pub point_value: u32,
    pub remark: String,
    pub color: String,
}

impl ResolvedGrade {
    fn from_entry(entry: &GradingScaleEntry, config: &EngineConfig) -> Self {
        Self {
            grade: entry.grade.clone(),
            point_value: entry.point_value,
            remark: config.remark_for(entry).to_string(),
            color: entry.color.clone(),
        }
    }
}

/// Applies the small-class correction when the model asks for it.
///
/// The correction divides z by `sqrt(n / (n - 1))`, a flat variance-inflation
/// factor. It is not a Student's t quantile and must stay this way so grades
/// match previously issued reports.
pub fn effective_z(z: f64, class_size: usize, config: &EngineConfig) -> f64 {
    let corrected = match config.distribution {
        DistributionModel::TDist => true,
        DistributionModel::Auto => class_size < config.policy.small_sample_cutoff,
        DistributionModel::Normal => false,
    };
    if corrected && class_size > 1 {
        let n = class_size as f64;
        z / (n / (n - 1.0)).sqrt()
    } else {
        z
    }
}

/// Grade for one score against its subject's class distribution.
pub fn resolve_grade(
    score: f64,
    stats: &ClassStatistics,
    config: &EngineConfig,
    class_size: usize,
) -> ResolvedGrade {
    let scale = &config.scale;
    // Uniform class: z is undefined, fall back to the middle band.
    if !(stats.std_dev > 0.0) {
        return ResolvedGrade::from_entry(scale.middle(), config);
    }
    let z = (score - stats.mean) / stats.std_dev;
    let z = effective_z(z, class_size, config);
    ResolvedGrade::from_entry(scale.band_for(z), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stats(mean: f64, std_dev: f64) -> ClassStatistics {
        ClassStatistics { mean, std_dev }
    }

    #[test]
    fn z_of_one_and_a_half_is_b2() {
        let cfg = EngineConfig::default();
        let g = resolve_grade(85.0, &stats(70.0, 10.0), &cfg, 40);
        assert_eq!(g.grade, "B2");
        assert_eq!(g.point_value, 2);
        assert_eq!(g.remark, "Very Good");
    }

    #[test]
    fn z_exactly_on_a_cutoff_takes_the_better_band() {
        let cfg = EngineConfig::default();
        // z = 1.036 exactly with sd 1.
        let g = resolve_grade(1.036, &stats(0.0, 1.0), &cfg, 40);
        assert_eq!(g.grade, "B2");
        let g = resolve_grade(0.0, &stats(0.0, 1.0), &cfg, 40);
        assert_eq!(g.grade, "C4");
    }

    #[test]
    fn small_class_correction_moves_a1_down_to_b2() {
        let cfg = EngineConfig::default();
        let st = stats(0.0, 1.0);
        assert_eq!(resolve_grade(1.645, &st, &cfg, 40).grade, "A1");

        let corrected = effective_z(1.645, 10, &cfg);
        assert!((corrected - 1.5606).abs() < 1e-3);
        assert_eq!(resolve_grade(1.645, &st, &cfg, 10).grade, "B2");
    }

    #[test]
    fn normal_model_never_corrects_and_tdist_always_does() {
        let mut cfg = EngineConfig::default();
        cfg.distribution = DistributionModel::Normal;
        assert_eq!(effective_z(1.645, 10, &cfg), 1.645);

        cfg.distribution = DistributionModel::TDist;
        assert!(effective_z(1.645, 100, &cfg) < 1.645);
        // Single learner: nothing to correct.
        assert_eq!(effective_z(1.645, 1, &cfg), 1.645);
    }

    #[test]
    fn auto_model_corrects_only_below_the_small_sample_cutoff() {
        let mut cfg = EngineConfig::default();
        assert_eq!(cfg.policy.small_sample_cutoff, 30);
        let st = stats(0.0, 1.0);

        assert!(effective_z(1.645, 29, &cfg) < 1.645);
        assert_eq!(resolve_grade(1.645, &st, &cfg, 29).grade, "B2");
        assert_eq!(effective_z(1.645, 30, &cfg), 1.645);
        assert_eq!(resolve_grade(1.645, &st, &cfg, 30).grade, "A1");

        cfg.policy.small_sample_cutoff = 10;
        assert_eq!(effective_z(1.645, 10, &cfg), 1.645);
        assert!(effective_z(1.645, 9, &cfg) < 1.645);
    }

    #[test]
    fn zero_std_dev_returns_middle_band() {
        let cfg = EngineConfig::default();
        let g = resolve_grade(100.0, &stats(100.0, 0.0), &cfg, 25);
        assert_eq!(g.grade, "C5");
        let g = resolve_grade(3.0, &stats(100.0, 0.0), &cfg, 25);
        assert_eq!(g.grade, "C5");
    }

    #[test]
    fn far_below_every_cutoff_is_the_worst_band() {
        let cfg = EngineConfig::default();
        let g = resolve_grade(-40.0, &stats(60.0, 10.0), &cfg, 40);
        assert_eq!(g.grade, "F9");
        assert_eq!(g.point_value, 9);
    }

    #[test]
    fn remark_override_is_attached() {
        let mut cfg = EngineConfig::default();
        cfg.remark_overrides
            .insert("F9".to_string(), "See class teacher".to_string());
        let g = resolve_grade(0.0, &stats(60.0, 10.0), &cfg, 40);
        assert_eq!(g.remark, "See class teacher");
        assert_eq!(g.color, "#b71c1c");
    }

    proptest! {
        #[test]
        fn higher_score_never_gets_a_worse_grade(
            a in -20.0f64..120.0,
            b in -20.0f64..120.0,
            mean in 20.0f64..80.0,
            sd in 0.5f64..25.0,
            n in 1usize..80,
        ) {
            let cfg = EngineConfig::default();
            let st = stats(mean, sd);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let g_lo = resolve_grade(lo, &st, &cfg, n);
            let g_hi = resolve_grade(hi, &st, &cfg, n);
            prop_assert!(g_hi.point_value <= g_lo.point_value);
        }
    }
}
