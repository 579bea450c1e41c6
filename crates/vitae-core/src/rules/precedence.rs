//! Tie-break precedence and confidence thresholds.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{ExtractionMethod, FieldName, ValueKind};

/// Ordering used when candidates compete for the same slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePrecedence {
    /// Methods from most to least trusted.
    pub methods: Vec<ExtractionMethod>,
    /// Per-field method order overriding `methods`.
    pub fields: BTreeMap<FieldName, Vec<ExtractionMethod>>,
    /// Value kinds from most to least specific.
    pub value_kinds: Vec<ValueKind>,
}

impl Default for RulePrecedence {
    fn default() -> Self {
        Self {
            methods: vec![
                ExtractionMethod::Rule,
                ExtractionMethod::Ner,
                ExtractionMethod::ZeroShot,
            ],
            fields: BTreeMap::new(),
            value_kinds: vec![
                ValueKind::Range,
                ValueKind::Date,
                ValueKind::Duration,
                ValueKind::Level,
                ValueKind::Text,
            ],
        }
    }
}

impl RulePrecedence {
    /// Position of a method for a field; lower is preferred.
    pub fn method_rank(&self, field: FieldName, method: ExtractionMethod) -> usize {
        let order = self.fields.get(&field).unwrap_or(&self.methods);
        order
            .iter()
            .position(|m| *m == method)
            .unwrap_or(order.len())
    }

    /// Position of a value kind; lower is more specific.
    pub fn kind_rank(&self, kind: ValueKind) -> usize {
        self.value_kinds
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.value_kinds.len())
    }

    /// `Less` when `a` is preferred over `b`.
    pub fn compare_methods(
        &self,
        field: FieldName,
        a: ExtractionMethod,
        b: ExtractionMethod,
    ) -> Ordering {
        self.method_rank(field, a).cmp(&self.method_rank(field, b))
    }
}

fn default_hard_floor() -> f32 {
    0.05
}

fn default_threshold() -> f32 {
    0.5
}

fn default_high() -> f32 {
    0.8
}

/// Confidence thresholds used by the filter and the segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Candidates below this are dropped outright.
    #[serde(default = "default_hard_floor")]
    pub hard_floor: f32,
    /// Low-confidence threshold for fields without their own entry.
    #[serde(default = "default_threshold")]
    pub default: f32,
    #[serde(default = "default_high")]
    pub high_confidence: f32,
    /// Minimum heading score to accept a section heading.
    #[serde(default = "default_threshold")]
    pub section_label: f32,
    #[serde(default)]
    pub fields: BTreeMap<FieldName, f32>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hard_floor: default_hard_floor(),
            default: default_threshold(),
            high_confidence: default_high(),
            section_label: default_threshold(),
            fields: BTreeMap::new(),
        }
    }
}

impl Thresholds {
    pub fn for_field(&self, field: FieldName) -> f32 {
        self.fields.get(&field).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.hard_floor) || !in_unit(self.default) || !in_unit(self.section_label) {
            return Err(ConfigError::Invalid(
                "thresholds must lie within [0, 1]".to_string(),
            ));
        }
        if let Some((field, value)) = self.fields.iter().find(|(_, v)| !in_unit(**v)) {
            return Err(ConfigError::Invalid(format!(
                "threshold for {} is out of range: {}",
                field, value
            )));
        }
        if let Some((field, _)) = self.fields.iter().find(|(_, v)| **v < self.hard_floor) {
            return Err(ConfigError::Invalid(format!(
                "threshold for {} is below the hard floor",
                field
            )));
        }
        Ok(())
    }
}
