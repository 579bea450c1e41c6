//! Extraction results and run metadata.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::FieldCandidate;
use super::document::{DocumentFormat, TextBlock};
use super::section::{Section, SectionKind};
use crate::error::{PipelineWarning, Stage};

/// Which extractor families were available for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    /// Every routed model loaded.
    FullAi,
    /// Some routes fell back to heuristics.
    PartialAi,
    /// Rules and heuristics only.
    RulesOnly,
}

impl fmt::Display for AiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AiMode::FullAi => "full_ai",
            AiMode::PartialAi => "partial_ai",
            AiMode::RulesOnly => "rules_only",
        })
    }
}

/// Detected (or declared) document language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageGuess {
    pub code: String,
    pub confidence: f32,
    /// The code is the configured default, not a detection.
    #[serde(default)]
    pub fallback: bool,
}

/// Summary statistics over candidate confidences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub count: usize,
    pub mean: f32,
    pub min: f32,
    pub max: f32,
}

impl ConfidenceStats {
    pub fn from_scores(scores: impl IntoIterator<Item = f32>) -> Self {
        let mut stats = Self::default();
        let mut total = 0.0;
        for score in scores {
            if stats.count == 0 {
                stats.min = score;
                stats.max = score;
            } else {
                stats.min = stats.min.min(score);
                stats.max = stats.max.max(score);
            }
            total += score;
            stats.count += 1;
        }
        if stats.count > 0 {
            stats.mean = total / stats.count as f32;
        }
        stats
    }
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    pub sections_detected: usize,
    pub fields_extracted: usize,
    pub high_confidence_fields: usize,
    pub low_confidence_fields: usize,
    pub dropped_candidates: usize,
    pub collapsed_duplicates: usize,
    pub confidence: ConfidenceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub ai_mode: AiMode,
    pub ocr_used: bool,
    pub processing_time_ms: u64,
    pub stages_completed: Vec<Stage>,
    pub metrics: ExtractionMetrics,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_id: String,
    pub format: DocumentFormat,
    pub language: LanguageGuess,
    pub extracted_at: DateTime<Utc>,
    /// Normalized text that all spans index into.
    pub text: String,
    pub blocks: Vec<TextBlock>,
    pub sections: Vec<Section>,
    pub warnings: Vec<PipelineWarning>,
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// All candidates across sections, in document order.
    pub fn candidates(&self) -> impl Iterator<Item = &FieldCandidate> {
        self.sections.iter().flat_map(|s| s.candidates.iter())
    }

    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.sections.iter().any(|s| s.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_stats() {
        let stats = ConfidenceStats::from_scores([0.5, 0.9, 0.7]);
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 0.7).abs() < 1e-6);
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 0.9);
    }

    #[test]
    fn test_confidence_stats_empty() {
        assert_eq!(ConfidenceStats::from_scores([]), ConfidenceStats::default());
    }

    #[test]
    fn test_ai_mode_display() {
        assert_eq!(AiMode::PartialAi.to_string(), "partial_ai");
    }
}
