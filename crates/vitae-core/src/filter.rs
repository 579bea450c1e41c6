//! Confidence filtering and duplicate collapsing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::models::candidate::clamp_confidence;
use crate::models::{ConfidenceStats, FieldCandidate, FieldName, SourceSpan};
use crate::redact::redact;
use crate::rules::{RulePrecedence, Thresholds};
use crate::text::comparison_key;

/// Why a candidate left the candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterReason {
    BelowFloor { floor: f32 },
    DuplicateOf { extractor: String, span: SourceSpan },
}

/// A dropped or collapsed candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub field: FieldName,
    pub raw_value: String,
    pub confidence: f32,
    pub extractor: String,
    pub span: SourceSpan,
    pub reason: FilterReason,
}

impl FilterRecord {
    fn new(candidate: &FieldCandidate, reason: FilterReason) -> Self {
        Self {
            field: candidate.field,
            raw_value: candidate.raw_value.clone(),
            confidence: candidate.confidence,
            extractor: candidate.extractor.clone(),
            span: candidate.span,
            reason,
        }
    }

    fn duplicate(candidate: &FieldCandidate, winner: &FieldCandidate) -> Self {
        Self::new(
            candidate,
            FilterReason::DuplicateOf {
                extractor: winner.extractor.clone(),
                span: winner.span,
            },
        )
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.reason, FilterReason::DuplicateOf { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Retained candidates, in input order.
    pub kept: Vec<FieldCandidate>,
    pub dropped: Vec<FilterRecord>,
}

impl FilterOutcome {
    pub fn stats(&self) -> ConfidenceStats {
        ConfidenceStats::from_scores(self.kept.iter().map(|c| c.confidence))
    }

    pub fn low_confidence_count(&self) -> usize {
        self.kept.iter().filter(|c| c.low_confidence).count()
    }

    pub fn duplicate_count(&self) -> usize {
        self.dropped.iter().filter(|r| r.is_duplicate()).count()
    }
}

/// Applies the hard floor, flags weak candidates and collapses duplicates.
#[derive(Debug, Clone)]
pub struct ConfidenceFilter {
    thresholds: Thresholds,
    precedence: RulePrecedence,
}

impl ConfidenceFilter {
    pub fn new(thresholds: Thresholds, precedence: RulePrecedence) -> Self {
        Self {
            thresholds,
            precedence,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn filter(&self, candidates: Vec<FieldCandidate>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        let mut retained: Vec<FieldCandidate> = Vec::with_capacity(candidates.len());

        for mut candidate in candidates {
            candidate.confidence = clamp_confidence(candidate.confidence);
            if candidate.confidence < self.thresholds.hard_floor {
                trace!(
                    "Dropping {} '{}' at {:.2}",
                    candidate.field,
                    redact(&candidate.raw_value),
                    candidate.confidence
                );
                outcome.dropped.push(FilterRecord::new(
                    &candidate,
                    FilterReason::BelowFloor {
                        floor: self.thresholds.hard_floor,
                    },
                ));
                continue;
            }
            candidate.low_confidence = candidate.confidence < self.thresholds.for_field(candidate.field);
            retained.push(candidate);
        }

        // Indices into `retained` of candidates that won every comparison so far.
        let mut winners: Vec<usize> = Vec::new();
        let mut collapsed: Vec<FilterRecord> = Vec::new();
        for i in 0..retained.len() {
            let mut keep = true;
            let mut k = 0;
            while k < winners.len() {
                let w = winners[k];
                if !is_duplicate(&retained[w], &retained[i]) {
                    k += 1;
                    continue;
                }
                if self.prefer(&retained[i], &retained[w]) == Ordering::Less {
                    collapsed.push(FilterRecord::duplicate(&retained[w], &retained[i]));
                    winners.remove(k);
                } else {
                    collapsed.push(FilterRecord::duplicate(&retained[i], &retained[w]));
                    keep = false;
                    break;
                }
            }
            if keep {
                winners.push(i);
            }
        }

        winners.sort_unstable();
        let mut retained: Vec<Option<FieldCandidate>> = retained.into_iter().map(Some).collect();
        outcome.kept = winners.into_iter().filter_map(|i| retained[i].take()).collect();
        outcome.dropped.extend(collapsed);

        debug!(
            "Filter kept {} candidates, dropped {}",
            outcome.kept.len(),
            outcome.dropped.len()
        );
        outcome
    }

    /// `Less` when `a` should be kept over `b`.
    fn prefer(&self, a: &FieldCandidate, b: &FieldCandidate) -> Ordering {
        self.precedence
            .compare_methods(a.field, a.method, b.method)
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
            .then_with(|| a.span.start.cmp(&b.span.start))
    }
}

fn is_duplicate(a: &FieldCandidate, b: &FieldCandidate) -> bool {
    if a.field != b.field {
        return false;
    }
    if a.span.overlaps(&b.span) {
        return true;
    }
    let key = comparison_key(&a.raw_value);
    !key.is_empty() && key == comparison_key(&b.raw_value)
}
