use crate::calc::CalcError;
use crate::model::{Roster, Subject, SubjectId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::num::NonZeroUsize;

/// Largest point value a scale band may carry. Keeps aggregate sums well
/// inside `u32`.
pub const MAX_POINT_VALUE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentWeights {
    pub exercises: f64,
    pub cats: f64,
    pub terminal: f64,
}

impl Default for AssessmentWeights {
    fn default() -> Self {
        Self {
            exercises: 20.0,
            cats: 30.0,
            terminal: 50.0,
        }
    }
}

impl AssessmentWeights {
    pub fn total(&self) -> f64 {
        self.exercises + self.cats + self.terminal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScaleEntry {
    pub grade: String,
    pub point_value: u32,
    /// Lowest z-score that still earns this grade.
    pub z_cutoff: f64,
    pub remark: String,
    pub color: String,
}

impl GradingScaleEntry {
    fn new(grade: &str, point_value: u32, z_cutoff: f64, remark: &str, color: &str) -> Self {
        Self {
            grade: grade.to_string(),
            point_value,
            z_cutoff,
            remark: remark.to_string(),
            color: color.to_string(),
        }
    }
}

/// Grade bands ordered best to worst. Never empty; cut-offs strictly descend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GradingScaleEntry>", into = "Vec<GradingScaleEntry>")]
pub struct GradingScale(Vec<GradingScaleEntry>);

impl GradingScale {
    pub fn new(entries: Vec<GradingScaleEntry>) -> Result<Self, CalcError> {
        if entries.is_empty() {
            return Err(CalcError::new(
                "scale_empty",
                "grading scale must contain at least one entry",
            ));
        }
        if let Some(e) = entries
            .iter()
            .find(|e| e.point_value == 0 || e.point_value > MAX_POINT_VALUE)
        {
            let mut err = CalcError::new(
                "scale_points",
                format!(
                    "grade {} point value {} is outside 1..={}",
                    e.grade, e.point_value, MAX_POINT_VALUE
                ),
            );
            err.details = Some(json!({ "grade": e.grade, "pointValue": e.point_value }));
            return Err(err);
        }
        for pair in entries.windows(2) {
            if !(pair[0].z_cutoff > pair[1].z_cutoff) {
                return Err(CalcError::new(
                    "scale_order",
                    format!(
                        "grading scale cut-offs must strictly descend: {} ({}) then {} ({})",
                        pair[0].grade, pair[0].z_cutoff, pair[1].grade, pair[1].z_cutoff
                    ),
                ));
            }
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[GradingScaleEntry] {
        &self.0
    }

    pub fn middle(&self) -> &GradingScaleEntry {
        &self.0[self.0.len() / 2]
    }

    pub fn worst(&self) -> &GradingScaleEntry {
        &self.0[self.0.len() - 1]
    }

    /// First band (best to worst) whose cut-off the z-score reaches.
    pub fn band_for(&self, z: f64) -> &GradingScaleEntry {
        self.0
            .iter()
            .find(|e| e.z_cutoff <= z)
            .unwrap_or_else(|| self.worst())
    }
}

impl TryFrom<Vec<GradingScaleEntry>> for GradingScale {
    type Error = CalcError;

    fn try_from(entries: Vec<GradingScaleEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<GradingScale> for Vec<GradingScaleEntry> {
    fn from(scale: GradingScale) -> Self {
        scale.0
    }
}

impl Default for GradingScale {
    /// Nine WAEC-style bands. Cut-offs are the standard normal quantiles for
    /// cumulative shares 5/15/30/50/70/85/90/95 percent from the top.
    fn default() -> Self {
        Self(vec![
            GradingScaleEntry::new("A1", 1, 1.645, "Excellent", "#1b5e20"),
            GradingScaleEntry::new("B2", 2, 1.036, "Very Good", "#2e7d32"),
            GradingScaleEntry::new("B3", 3, 0.524, "Good", "#558b2f"),
            GradingScaleEntry::new("C4", 4, 0.0, "Credit", "#9e9d24"),
            GradingScaleEntry::new("C5", 5, -0.524, "Credit", "#f9a825"),
            GradingScaleEntry::new("C6", 6, -1.036, "Credit", "#ff8f00"),
            GradingScaleEntry::new("D7", 7, -1.282, "Pass", "#ef6c00"),
            GradingScaleEntry::new("E8", 8, -1.645, "Weak Pass", "#d84315"),
            GradingScaleEntry::new("F9", 9, -2.326, "Fail", "#b71c1c"),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistributionModel {
    #[default]
    Auto,
    TDist,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMaxima {
    pub section_a: f64,
    pub section_b: f64,
}

impl Default for SectionMaxima {
    fn default() -> Self {
        Self {
            section_a: 40.0,
            section_b: 60.0,
        }
    }
}

impl SectionMaxima {
    pub fn total(&self) -> f64 {
        self.section_a + self.section_b
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScienceBasis {
    /// Science uses the class's configured section maxima like any subject.
    #[default]
    Configured,
    /// Science sections are marked out of the fixed policy maxima (40/100).
    Alternate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScienceRule {
    pub pattern: String,
    pub basis: ScienceBasis,
}

impl Default for ScienceRule {
    fn default() -> Self {
        Self {
            pattern: "science".to_string(),
            basis: ScienceBasis::Configured,
        }
    }
}

impl ScienceRule {
    pub fn matches(&self, subject_name: &str) -> bool {
        let pattern = self.pattern.trim();
        !pattern.is_empty()
            && subject_name
                .to_ascii_lowercase()
                .contains(&pattern.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBand {
    /// Inclusive upper bound; `None` catches everything above the last bound.
    pub max_aggregate: Option<u32>,
    pub code: String,
    pub label: String,
}

impl CategoryBand {
    fn new(max_aggregate: Option<u32>, code: &str, label: &str) -> Self {
        Self {
            max_aggregate,
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

/// Aggregate categories ordered by ascending bound. Bounds strictly ascend and
/// the last band is the unbounded catch-all, so every aggregate has a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CategoryBand>", into = "Vec<CategoryBand>")]
pub struct CategoryBands(Vec<CategoryBand>);

impl CategoryBands {
    pub fn new(bands: Vec<CategoryBand>) -> Result<Self, CalcError> {
        let invalid = |msg: String| CalcError::new("policy_invalid", msg);
        let Some((last, bounded)) = bands.split_last() else {
            return Err(invalid("category bands must not be empty".to_string()));
        };
        if last.max_aggregate.is_some() {
            return Err(invalid(format!(
                "last category band {} must have no maxAggregate",
                last.code
            )));
        }
        let mut prev: Option<u32> = None;
        for band in bounded {
            let Some(max) = band.max_aggregate else {
                return Err(invalid(format!(
                    "only the last category band may be unbounded, not {}",
                    band.code
                )));
            };
            if prev.is_some_and(|p| max <= p) {
                return Err(invalid(format!(
                    "category band bounds must strictly ascend at {}",
                    band.code
                )));
            }
            prev = Some(max);
        }
        Ok(Self(bands))
    }

    /// First band whose inclusive bound covers the aggregate.
    pub fn category_for(&self, points: u32) -> &CategoryBand {
        let last = &self.0[self.0.len() - 1];
        self.0
            .iter()
            .find(|b| b.max_aggregate.is_some_and(|max| points <= max))
            .unwrap_or(last)
    }
}

impl TryFrom<Vec<CategoryBand>> for CategoryBands {
    type Error = CalcError;

    fn try_from(bands: Vec<CategoryBand>) -> Result<Self, Self::Error> {
        Self::new(bands)
    }
}

impl From<CategoryBands> for Vec<CategoryBand> {
    fn from(bands: CategoryBands) -> Self {
        bands.0
    }
}

impl Default for CategoryBands {
    fn default() -> Self {
        Self(vec![
            CategoryBand::new(Some(10), "DIST", "Distinction"),
            CategoryBand::new(Some(18), "VGOOD", "Very Good"),
            CategoryBand::new(Some(30), "CREDIT", "Credit"),
            CategoryBand::new(Some(45), "PASS", "Pass"),
            CategoryBand::new(None, "FAIL", "Fail"),
        ])
    }
}

/// Institutional policy numbers that would otherwise be scattered literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConstants {
    pub core_count: NonZeroUsize,
    pub elective_count: NonZeroUsize,
    /// Aggregate reported when a learner lacks enough core or elective
    /// subjects. Equals the worst real aggregate on the default scale.
    pub incomplete_aggregate: u32,
    pub small_sample_cutoff: usize,
    pub science_section_a_max: f64,
    pub science_section_b_max: f64,
    pub category_bands: CategoryBands,
}

impl Default for PolicyConstants {
    fn default() -> Self {
        Self {
            core_count: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            elective_count: NonZeroUsize::new(2).unwrap_or(NonZeroUsize::MIN),
            incomplete_aggregate: 54,
            small_sample_cutoff: 30,
            science_section_a_max: 40.0,
            science_section_b_max: 100.0,
            category_bands: CategoryBands::default(),
        }
    }
}

impl PolicyConstants {
    pub fn science_maxima(&self) -> SectionMaxima {
        SectionMaxima {
            section_a: self.science_section_a_max,
            section_b: self.science_section_b_max,
        }
    }
}

/// Everything the engine reads besides the roster itself. Passed explicitly to
/// every calc function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub weights: AssessmentWeights,
    pub scale: GradingScale,
    pub distribution: DistributionModel,
    pub terminal_max: SectionMaxima,
    pub science: ScienceRule,
    pub core_subjects: BTreeSet<SubjectId>,
    pub remark_overrides: BTreeMap<String, String>,
    pub policy: PolicyConstants,
}

impl EngineConfig {
    pub fn is_core(&self, subject: &SubjectId) -> bool {
        self.core_subjects.contains(subject)
    }

    /// Section maxima that apply to a subject's terminal exam. A class's own
    /// maxima replace the configured ones; the science rule overrides both.
    pub fn terminal_maxima_for(&self, subject: &Subject, roster: &Roster) -> SectionMaxima {
        if self.science.basis == ScienceBasis::Alternate && self.science.matches(&subject.name) {
            self.policy.science_maxima()
        } else {
            roster.terminal_max.unwrap_or(self.terminal_max)
        }
    }

    pub fn remark_for<'a>(&'a self, entry: &'a GradingScaleEntry) -> &'a str {
        self.remark_overrides
            .get(&entry.grade)
            .map(String::as_str)
            .unwrap_or(&entry.remark)
    }

    /// Checks that the subject list can ever satisfy the aggregate rule.
    pub fn validate_subjects(&self, subjects: &[Subject]) -> Result<(), CalcError> {
        let w = &self.weights;
        if [w.exercises, w.cats, w.terminal]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            let mut e = CalcError::new("weights_invalid", "assessment weights must be non-negative");
            e.details = Some(json!(w));
            return Err(e);
        }

        let mut seen = HashSet::new();
        for s in subjects {
            if !seen.insert(&s.id) {
                return Err(CalcError::new(
                    "subjects_duplicate",
                    format!("subject listed twice: {}", s.id),
                ));
            }
        }

        let core = subjects.iter().filter(|s| self.is_core(&s.id)).count();
        let elective = subjects.len() - core;
        if core == 0 || elective == 0 {
            let mut e = CalcError::new(
                "subjects_unsatisfiable",
                "subject list must contain at least one core and one elective subject",
            );
            e.details = Some(json!({ "core": core, "elective": elective }));
            return Err(e);
        }
        Ok(())
    }

    /// Checks that every subject the roster references is configured.
    pub fn validate_roster(&self, roster: &Roster, subjects: &[Subject]) -> Result<(), CalcError> {
        self.validate_subjects(subjects)?;

        let known: HashSet<&SubjectId> = subjects.iter().map(|s| &s.id).collect();
        let unknown = |id: &SubjectId, origin: String| {
            let mut e = CalcError::new("unknown_subject", format!("unknown subject: {}", id));
            e.details = Some(json!({ "subjectId": id.as_str(), "referencedBy": origin }));
            e
        };

        for entry in &roster.exercises {
            if !known.contains(&entry.subject) {
                return Err(unknown(&entry.subject, format!("exercise {}", entry.id)));
            }
        }
        let mut cat_subjects = HashSet::new();
        for cat in &roster.cats {
            if !known.contains(&cat.subject) {
                return Err(unknown(&cat.subject, "cat".to_string()));
            }
            if !cat_subjects.insert(&cat.subject) {
                return Err(CalcError::new(
                    "cat_duplicate",
                    format!("more than one CAT configuration for subject {}", cat.subject),
                ));
            }
        }
        for learner in &roster.learners {
            for subject in learner.terminal.keys() {
                if !known.contains(subject) {
                    return Err(unknown(subject, format!("learner {}", learner.id)));
                }
            }
        }

        if (self.weights.total() - 100.0).abs() > 1e-9 {
            tracing::warn!(
                exercises = self.weights.exercises,
                cats = self.weights.cats,
                terminal = self.weights.terminal,
                "assessment weights do not sum to 100"
            );
        }
        Ok(())
    }
}
