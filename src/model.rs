use crate::config::SectionMaxima;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerId(pub String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl LearnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

impl Subject {
    #[cfg(test)]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: SubjectId::new(id),
            name: name.to_string(),
        }
    }
}

/// Objective ("Section A") and theory ("Section B") marks for one learner in
/// one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalScoreDetail {
    pub objective: f64,
    pub theory: f64,
    pub remark: String,
}

impl TerminalScoreDetail {
    /// Builds a detail with each section clamped into `[0, max]`.
    pub fn clamped(objective: f64, theory: f64, remark: String, max_a: f64, max_b: f64) -> Self {
        Self {
            objective: clamp_score(objective, max_a),
            theory: clamp_score(theory, max_b),
            remark,
        }
    }

    /// Sum of both sections. Negative or non-finite sections count as 0; the
    /// upper bound is left to score entry.
    pub fn raw_total(&self) -> f64 {
        non_negative(self.objective) + non_negative(self.theory)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: LearnerId,
    pub name: String,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub fees_cleared: bool,
    #[serde(default)]
    pub terminal: BTreeMap<SubjectId, TerminalScoreDetail>,
    #[serde(default)]
    pub remarks: String,
}

impl Learner {
    #[cfg(test)]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: LearnerId::new(id),
            name: name.to_string(),
            serial: None,
            class_name: String::new(),
            fees_cleared: false,
            terminal: BTreeMap::new(),
            remarks: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExerciseKind {
    Classwork,
    Homework,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseEntry {
    pub id: String,
    pub subject: SubjectId,
    #[serde(default)]
    pub week: u32,
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub max_score: f64,
    #[serde(default)]
    pub scores: BTreeMap<LearnerId, f64>,
}

impl ExerciseEntry {
    /// Share of the entry's maximum the learner earned. Unrecorded learners and
    /// entries without a positive maximum count as 0.
    pub fn ratio_for(&self, learner: &LearnerId) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        self.scores.get(learner).copied().map(non_negative).unwrap_or(0.0) / self.max_score
    }

    pub fn clamp_scores(&mut self) {
        let max = self.max_score;
        for v in self.scores.values_mut() {
            *v = clamp_score(*v, max);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatComponent {
    pub max: f64,
    pub scores: BTreeMap<LearnerId, f64>,
}

impl CatComponent {
    pub fn ratio_for(&self, learner: &LearnerId) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        self.scores.get(learner).copied().map(non_negative).unwrap_or(0.0) / self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatSlot {
    Cat1,
    Cat2,
    Cat3,
}

impl CatSlot {
    pub fn from_index(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Cat1),
            2 => Some(Self::Cat2),
            3 => Some(Self::Cat3),
            _ => None,
        }
    }
}

/// Continuous-assessment tests for one subject of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatConfig {
    pub subject: SubjectId,
    #[serde(default)]
    pub cat1: CatComponent,
    #[serde(default)]
    pub cat2: CatComponent,
    #[serde(default)]
    pub cat3: CatComponent,
}

impl CatConfig {
    pub fn new(subject: SubjectId, max1: f64, max2: f64, max3: f64) -> Self {
        let component = |max| CatComponent {
            max,
            scores: BTreeMap::new(),
        };
        Self {
            subject,
            cat1: component(max1),
            cat2: component(max2),
            cat3: component(max3),
        }
    }

    pub fn components(&self) -> [&CatComponent; 3] {
        [&self.cat1, &self.cat2, &self.cat3]
    }

    pub fn component_mut(&mut self, slot: CatSlot) -> &mut CatComponent {
        match slot {
            CatSlot::Cat1 => &mut self.cat1,
            CatSlot::Cat2 => &mut self.cat2,
            CatSlot::Cat3 => &mut self.cat3,
        }
    }

    /// Records a score, clamped to the component maximum.
    pub fn record(&mut self, slot: CatSlot, learner: LearnerId, score: f64) -> f64 {
        let component = self.component_mut(slot);
        let clamped = clamp_score(score, component.max);
        component.scores.insert(learner, clamped);
        clamped
    }

    /// Changes a component maximum; scores already above it are pulled down.
    pub fn set_max(&mut self, slot: CatSlot, max: f64) {
        let component = self.component_mut(slot);
        component.max = max.max(0.0);
        let cap = component.max;
        for v in component.scores.values_mut() {
            *v = clamp_score(*v, cap);
        }
    }
}

/// Everything recorded for one class: learners plus the subject-tagged
/// exercise and CAT records that reference them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Roster {
    pub class_name: String,
    pub learners: Vec<Learner>,
    pub exercises: Vec<ExerciseEntry>,
    pub cats: Vec<CatConfig>,
    /// Terminal section maxima for this class when they differ from the
    /// institution's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_max: Option<SectionMaxima>,
}

impl Roster {
    pub fn learner(&self, id: &LearnerId) -> Option<&Learner> {
        self.learners.iter().find(|l| &l.id == id)
    }

    pub fn learner_mut(&mut self, id: &LearnerId) -> Option<&mut Learner> {
        self.learners.iter_mut().find(|l| &l.id == id)
    }

    pub fn cat_for(&self, subject: &SubjectId) -> Option<&CatConfig> {
        self.cats.iter().find(|c| &c.subject == subject)
    }

    pub fn exercises_for<'a>(
        &'a self,
        subject: &'a SubjectId,
    ) -> impl Iterator<Item = &'a ExerciseEntry> + 'a {
        self.exercises.iter().filter(move |e| &e.subject == subject)
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

pub fn clamp_score(score: f64, max: f64) -> f64 {
    if !score.is_finite() || score < 0.0 {
        return 0.0;
    }
    if max > 0.0 {
        score.min(max)
    } else {
        0.0
    }
}
