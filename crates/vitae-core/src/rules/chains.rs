//! Per-section extractor chains.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{FieldName, SectionKind};

/// Rule-based extractors available to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternRule {
    Email,
    Phone,
    /// LinkedIn, GitHub and other web links.
    Url,
    FullName,
    Headline,
    Location,
    /// Date ranges and single dates.
    DateRange,
    Duration,
    /// Job title and employer on one line.
    JobLine,
    Degree,
    Institution,
    Language,
    LanguageLevel,
    /// One candidate per list item, with the given field.
    ListItems(FieldName),
}

impl PatternRule {
    pub fn name(&self) -> String {
        match self {
            PatternRule::Email => "email".to_string(),
            PatternRule::Phone => "phone".to_string(),
            PatternRule::Url => "url".to_string(),
            PatternRule::FullName => "full_name".to_string(),
            PatternRule::Headline => "headline".to_string(),
            PatternRule::Location => "location".to_string(),
            PatternRule::DateRange => "date_range".to_string(),
            PatternRule::Duration => "duration".to_string(),
            PatternRule::JobLine => "job_line".to_string(),
            PatternRule::Degree => "degree".to_string(),
            PatternRule::Institution => "institution".to_string(),
            PatternRule::Language => "language".to_string(),
            PatternRule::LanguageLevel => "language_level".to_string(),
            PatternRule::ListItems(field) => format!("list_items:{}", field),
        }
    }
}

/// What to do with earlier candidates a step's candidate overlaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Lower the confidence of the less specific candidate.
    #[default]
    Demote,
    /// Remove earlier overlapping candidates of a different field.
    Veto,
}

fn default_ner_min_score() -> f32 {
    0.3
}

fn default_zero_shot_min_score() -> f32 {
    0.5
}

fn default_hypothesis() -> String {
    "This text is about {}.".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerStep {
    /// Entity label (PER, ORG, LOC, DATE) -> field. Unlisted labels map to
    /// the generic fields.
    #[serde(default)]
    pub labels: BTreeMap<String, FieldName>,
    #[serde(default = "default_ner_min_score")]
    pub min_score: f32,
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroShotStep {
    /// Candidate label -> field it produces.
    pub labels: BTreeMap<String, FieldName>,
    #[serde(default = "default_zero_shot_min_score")]
    pub min_score: f32,
    /// NLI hypothesis; `{}` is replaced by the label.
    #[serde(default = "default_hypothesis")]
    pub hypothesis: String,
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

/// One step of an extractor chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStep {
    Rule(PatternRule),
    Ner(NerStep),
    ZeroShot(ZeroShotStep),
}

impl ChainStep {
    pub fn is_ml(&self) -> bool {
        !matches!(self, ChainStep::Rule(_))
    }

    pub fn overlap(&self) -> OverlapPolicy {
        match self {
            ChainStep::Rule(_) => OverlapPolicy::Demote,
            ChainStep::Ner(step) => step.overlap,
            ChainStep::ZeroShot(step) => step.overlap,
        }
    }
}

/// Ordered chains keyed by section kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainTable(BTreeMap<SectionKind, Vec<ChainStep>>);

impl ChainTable {
    pub fn steps(&self, kind: SectionKind) -> &[ChainStep] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionKind, &Vec<ChainStep>)> {
        self.0.iter()
    }

    pub fn set(&mut self, kind: SectionKind, steps: Vec<ChainStep>) {
        self.0.insert(kind, steps);
    }

    pub fn uses_ner(&self) -> bool {
        self.0.values().flatten().any(|s| matches!(s, ChainStep::Ner(_)))
    }

    pub fn uses_zero_shot(&self) -> bool {
        self.0
            .values()
            .flatten()
            .any(|s| matches!(s, ChainStep::ZeroShot(_)))
    }
}
