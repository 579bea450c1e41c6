//! Zero-shot classification of list items.
//!
//! The ONNX variant scores each label with an NLI model: the item is the
//! premise and the step's hypothesis template, filled with the label, is the
//! hypothesis. Entailment logits are then normalized across labels.

use super::ExtractContext;
use crate::error::ExtractorError;
use crate::text::fold;

/// Score given to a label with no keyword evidence.
const NO_EVIDENCE: f32 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// A zero-shot model selected by language routing.
pub enum ZeroShotModel {
    #[cfg(feature = "native")]
    Onnx(native::OnnxZeroShot),
    Keyword,
}

impl ZeroShotModel {
    pub fn is_heuristic(&self) -> bool {
        matches!(self, ZeroShotModel::Keyword)
    }

    /// One score per label, in label order.
    pub fn classify(
        &self,
        text: &str,
        labels: &[&str],
        hypothesis: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<LabelScore>, ExtractorError> {
        if labels.is_empty() || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match self {
            #[cfg(feature = "native")]
            ZeroShotModel::Onnx(model) => model.classify(text, labels, hypothesis),
            // The hypothesis only matters to NLI models.
            ZeroShotModel::Keyword => {
                let _ = hypothesis;
                Ok(keyword_scores(text, labels, ctx))
            }
        }
    }
}

/// Score labels by keyword evidence: 0.3 per keyword found, 0.2 more when
/// the first one sits near the start, 0.1 more for an exact match.
fn keyword_scores(text: &str, labels: &[&str], ctx: &ExtractContext<'_>) -> Vec<LabelScore> {
    labels
        .iter()
        .map(|label| {
            let key = fold(label);
            let score = ctx
                .vocab
                .zero_shot
                .iter()
                .find(|(name, _)| fold(name) == key)
                .map(|(_, keywords)| {
                    let hits = keywords.find_all(text);
                    if hits.is_empty() {
                        return NO_EVIDENCE;
                    }
                    let mut score = 0.3 * hits.len() as f32;
                    if hits[0].start < 50 {
                        score += 0.2;
                    }
                    if keywords.matches_exactly(text) {
                        score += 0.1;
                    }
                    score.min(0.95)
                })
                .unwrap_or(NO_EVIDENCE);
            LabelScore {
                label: label.to_string(),
                score,
            }
        })
        .collect()
}

#[cfg(feature = "native")]
pub mod native {
    use std::sync::Arc;

    use vitae_inference::{softmax, TextModel};

    use super::LabelScore;
    use crate::error::ExtractorError;

    /// NLI model used for zero-shot classification.
    pub struct OnnxZeroShot {
        model: Arc<TextModel>,
        entailment: usize,
        contradiction: usize,
    }

    impl OnnxZeroShot {
        pub fn new(model: Arc<TextModel>, labels: &[String]) -> Self {
            let find = |name: &str| {
                labels
                    .iter()
                    .position(|l| l.eq_ignore_ascii_case(name))
                    .or_else(|| model.metadata().index_of(name))
            };
            // MNLI ordering: contradiction, neutral, entailment
            let entailment = find("entailment").unwrap_or(2);
            let contradiction = find("contradiction").unwrap_or(0);
            Self {
                model,
                entailment,
                contradiction,
            }
        }

        pub fn classify(
            &self,
            text: &str,
            labels: &[&str],
            hypothesis: &str,
        ) -> Result<Vec<LabelScore>, ExtractorError> {
            let mut entail_logits = Vec::with_capacity(labels.len());
            let mut single = 0.0;
            for label in labels {
                let encoding = self.model.encode_pair(text, &hypothesis.replace("{}", label))?;
                let logits = self.model.logits(&encoding)?;
                let flat: Vec<f32> = logits.iter().copied().collect();
                if flat.len() <= self.entailment.max(self.contradiction) {
                    return Err(ExtractorError::OutputShape(logits.shape().to_vec()));
                }
                entail_logits.push(flat[self.entailment]);
                if labels.len() == 1 {
                    single = softmax(&[flat[self.contradiction], flat[self.entailment]])[1];
                }
            }

            let scores = if labels.len() == 1 {
                vec![single]
            } else {
                softmax(&entail_logits)
            };
            Ok(labels
                .iter()
                .zip(scores)
                .map(|(label, score)| LabelScore {
                    label: label.to_string(),
                    score,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateGrammar;
    use crate::extract::VocabIndex;
    use crate::rules::RuleSet;

    const LABELS: [&str; 3] = ["soft skill", "technical skill", "tool"];

    fn scores(text: &str) -> Vec<f32> {
        let rules = RuleSet::builtin().unwrap();
        let grammar = DateGrammar::new(&rules.dates).unwrap();
        let vocab = VocabIndex::new(&rules.vocab).unwrap();
        let ctx = ExtractContext {
            grammar: &grammar,
            vocab: &vocab,
        };
        ZeroShotModel::Keyword
            .classify(text, &LABELS, "This text is about {}.", &ctx)
            .unwrap()
            .into_iter()
            .map(|s| s.score)
            .collect()
    }

    #[test]
    fn test_keyword_exact_match() {
        let s = scores("Communication");
        assert!((s[0] - 0.6).abs() < 1e-6);
        assert_eq!(s[1], NO_EVIDENCE);
        assert_eq!(s[2], NO_EVIDENCE);
    }

    #[test]
    fn test_keyword_partial_match() {
        let s = scores("Docker et Kubernetes en production");
        assert!((s[1] - 0.8).abs() < 1e-6);
        assert_eq!(s[0], NO_EVIDENCE);
    }

    #[test]
    fn test_unknown_label_has_no_evidence() {
        let rules = RuleSet::builtin().unwrap();
        let grammar = DateGrammar::new(&rules.dates).unwrap();
        let vocab = VocabIndex::new(&rules.vocab).unwrap();
        let ctx = ExtractContext {
            grammar: &grammar,
            vocab: &vocab,
        };
        let s = ZeroShotModel::Keyword
            .classify("Rust", &["cooking"], "{}", &ctx)
            .unwrap();
        assert_eq!(s[0].score, NO_EVIDENCE);
        assert!(ZeroShotModel::Keyword.classify("", &LABELS, "{}", &ctx).unwrap().is_empty());
    }
}
