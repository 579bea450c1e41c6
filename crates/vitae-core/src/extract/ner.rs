//! Named-entity recognition over single lines.
//!
//! [`NerModel::Onnx`] runs a token-classification transformer and groups its
//! BIO tags into entities. [`NerModel::Heuristic`] stands in when no model
//! could be loaded: legal-form suffixes and institution words for
//! organizations, known cities and postal codes for locations, capitalized
//! name lines for persons, and the date grammar for dates.

use serde::{Deserialize, Serialize};

use super::patterns::{NAME_LINE, POSTAL_CITY};
use super::ExtractContext;
use crate::error::ExtractorError;
use crate::models::FieldName;

/// Entity classes produced by NER models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    Per,
    Org,
    Loc,
    Date,
    Misc,
}

impl EntityLabel {
    /// Map a model tag (without its `B-`/`I-` prefix) to a label.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "PER" | "PERS" | "PERSON" => Some(EntityLabel::Per),
            "ORG" | "ORGANIZATION" | "ORGANISATION" => Some(EntityLabel::Org),
            "LOC" | "LOCATION" | "GPE" => Some(EntityLabel::Loc),
            "DATE" | "TIME" => Some(EntityLabel::Date),
            "MISC" => Some(EntityLabel::Misc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Per => "PER",
            EntityLabel::Org => "ORG",
            EntityLabel::Loc => "LOC",
            EntityLabel::Date => "DATE",
            EntityLabel::Misc => "MISC",
        }
    }

    /// Generic field for labels a chain does not map explicitly.
    pub fn default_field(&self) -> Option<FieldName> {
        match self {
            EntityLabel::Per => Some(FieldName::Person),
            EntityLabel::Org => Some(FieldName::Organization),
            EntityLabel::Loc => Some(FieldName::Location),
            EntityLabel::Date => Some(FieldName::Date),
            EntityLabel::Misc => None,
        }
    }
}

/// An entity in byte offsets of the analysed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Predicted tag for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenTag {
    pub tag: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

/// Split `B-PER` into (`true`, `PER`); IO-style `I-PER` and bare `PER` give `false`.
fn split_tag(tag: &str) -> (bool, &str) {
    match tag.split_once('-') {
        Some(("B", rest)) | Some(("b", rest)) => (true, rest),
        Some(("I", rest)) | Some(("i", rest)) => (false, rest),
        _ => (false, tag),
    }
}

/// Group token tags into entities. Entity score is the mean token score.
pub fn decode_bio(tokens: &[TokenTag]) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut current: Option<(Entity, usize)> = None;

    for token in tokens {
        if token.start >= token.end {
            continue;
        }
        let (begins, name) = split_tag(&token.tag);
        let label = if token.tag.eq_ignore_ascii_case("O") {
            None
        } else {
            EntityLabel::from_tag(name)
        };

        match (label, current.as_mut()) {
            (None, _) => {
                if let Some((entity, count)) = current.take() {
                    entities.push(finish(entity, count));
                }
            }
            (Some(label), Some((entity, count))) if !begins && entity.label == label => {
                entity.end = token.end;
                entity.score += token.score;
                *count += 1;
            }
            (Some(label), _) => {
                if let Some((entity, count)) = current.take() {
                    entities.push(finish(entity, count));
                }
                current = Some((
                    Entity {
                        label,
                        start: token.start,
                        end: token.end,
                        score: token.score,
                    },
                    1,
                ));
            }
        }
    }
    if let Some((entity, count)) = current {
        entities.push(finish(entity, count));
    }
    entities
}

fn finish(mut entity: Entity, count: usize) -> Entity {
    entity.score /= count as f32;
    entity
}

/// A NER model selected by language routing.
pub enum NerModel {
    #[cfg(feature = "native")]
    Onnx(native::OnnxNer),
    Heuristic,
}

impl NerModel {
    pub fn is_heuristic(&self) -> bool {
        matches!(self, NerModel::Heuristic)
    }

    /// Entities found in one line of text.
    pub fn recognize(&self, text: &str, ctx: &ExtractContext<'_>) -> Result<Vec<Entity>, ExtractorError> {
        match self {
            #[cfg(feature = "native")]
            NerModel::Onnx(model) => model.recognize(text),
            NerModel::Heuristic => Ok(heuristic_entities(text, ctx)),
        }
    }
}

/// End of the phrase starting at `from`: the next separator or the end of text.
fn phrase_end(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    let mut end = rest.len();
    for sep in [",", "|", "(", ";", " - ", " – ", " — "] {
        if let Some(pos) = rest.find(sep) {
            end = end.min(pos);
        }
    }
    from + rest[..end].trim_end().len()
}

fn heuristic_entities(text: &str, ctx: &ExtractContext<'_>) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();
    let push = |entities: &mut Vec<Entity>, label: EntityLabel, start: usize, end: usize, score: f32| {
        if start < end && entities.iter().all(|e| end <= e.start || start >= e.end) {
            entities.push(Entity { label, start, end, score });
        }
    };

    for range in ctx.grammar.find_ranges(text) {
        push(&mut entities, EntityLabel::Date, range.start, range.end, 0.6);
    }
    for date in ctx.grammar.find_dates(text) {
        push(&mut entities, EntityLabel::Date, date.start, date.end, 0.55);
    }

    if let Some((start, end)) = ctx.vocab.find_organization(text) {
        push(&mut entities, EntityLabel::Org, start, end, 0.6);
    }
    for hit in ctx.vocab.institutions.find_all(text) {
        let end = phrase_end(text, hit.start);
        push(&mut entities, EntityLabel::Org, hit.start, end, 0.55);
    }

    for caps in POSTAL_CITY.captures_iter(text) {
        if let Some(city) = caps.get(2) {
            push(&mut entities, EntityLabel::Loc, city.start(), city.end(), 0.55);
        }
    }
    for hit in ctx.vocab.cities.find_all(text) {
        push(&mut entities, EntityLabel::Loc, hit.start, hit.end, 0.5);
    }

    let trimmed = text.trim();
    if NAME_LINE.is_match(trimmed)
        && !ctx.vocab.job_titles.contains_in(trimmed)
        && !ctx.vocab.name_stopwords.contains_in(trimmed)
        && !ctx.vocab.cities.contains_in(trimmed)
    {
        let start = text.len() - text.trim_start().len();
        push(&mut entities, EntityLabel::Per, start, start + trimmed.len(), 0.5);
    }

    entities.sort_by_key(|e| e.start);
    entities
}

#[cfg(feature = "native")]
pub mod native {
    use std::sync::Arc;

    use vitae_inference::{softmax, TextModel};

    use super::{decode_bio, Entity, TokenTag};
    use crate::error::ExtractorError;

    /// Transformer token classifier.
    pub struct OnnxNer {
        model: Arc<TextModel>,
        labels: Vec<String>,
    }

    impl OnnxNer {
        /// `labels` overrides the model's own `id2label` when non-empty.
        pub fn new(model: Arc<TextModel>, labels: Vec<String>) -> Self {
            let labels = if labels.is_empty() {
                model.metadata().labels.clone()
            } else {
                labels
            };
            Self { model, labels }
        }

        pub fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractorError> {
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            let encoding = self.model.encode(text)?;
            let logits = self.model.logits(&encoding)?;
            let shape = logits.shape().to_vec();
            let width = self.labels.len();
            if shape.len() != 3 || width == 0 || shape[2] != width || shape[1] < encoding.len() {
                return Err(ExtractorError::OutputShape(shape));
            }

            let flat: Vec<f32> = logits.iter().copied().collect();
            let mut tags = Vec::with_capacity(encoding.len());
            for (i, &(start, end)) in encoding.offsets.iter().enumerate() {
                if encoding.special[i] || start >= end || end > text.len() {
                    continue;
                }
                let probs = softmax(&flat[i * width..(i + 1) * width]);
                let (best, score) = probs
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, f32::MIN), |acc, (j, p)| if p > acc.1 { (j, p) } else { acc });
                tags.push(TokenTag {
                    tag: self.labels[best].clone(),
                    score,
                    start,
                    end,
                });
            }
            Ok(decode_bio(&tags))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateGrammar;
    use crate::extract::VocabIndex;
    use crate::rules::RuleSet;

    fn tag(tag: &str, score: f32, start: usize, end: usize) -> TokenTag {
        TokenTag {
            tag: tag.to_string(),
            score,
            start,
            end,
        }
    }

    #[test]
    fn test_decode_bio_groups_tokens() {
        // "Jane Doe works at Acme"
        let tokens = vec![
            tag("B-PER", 0.9, 0, 4),
            tag("I-PER", 0.7, 5, 8),
            tag("O", 0.99, 9, 14),
            tag("O", 0.99, 15, 17),
            tag("B-ORG", 0.8, 18, 22),
        ];
        let entities = decode_bio(&tokens);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].label, EntityLabel::Per);
        assert_eq!((entities[0].start, entities[0].end), (0, 8));
        assert!((entities[0].score - 0.8).abs() < 1e-6);
        assert_eq!(entities[1].label, EntityLabel::Org);
    }

    #[test]
    fn test_decode_io_tags_and_label_switch() {
        let tokens = vec![
            tag("I-PER", 0.9, 0, 4),
            tag("I-LOC", 0.8, 5, 10),
            tag("B-LOC", 0.8, 11, 16),
        ];
        let entities = decode_bio(&tokens);
        let labels: Vec<EntityLabel> = entities.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![EntityLabel::Per, EntityLabel::Loc, EntityLabel::Loc]);
    }

    #[test]
    fn test_label_aliases() {
        assert_eq!(EntityLabel::from_tag("PERSON"), Some(EntityLabel::Per));
        assert_eq!(EntityLabel::from_tag("gpe"), Some(EntityLabel::Loc));
        assert_eq!(EntityLabel::from_tag("ORGANIZATION"), Some(EntityLabel::Org));
        assert_eq!(EntityLabel::from_tag("WORK_OF_ART"), None);
    }

    #[test]
    fn test_heuristic_entities() {
        let rules = RuleSet::builtin().unwrap();
        let grammar = DateGrammar::new(&rules.dates).unwrap();
        let vocab = VocabIndex::new(&rules.vocab).unwrap();
        let ctx = ExtractContext {
            grammar: &grammar,
            vocab: &vocab,
        };

        let text = "Acme Conseil SARL, Lyon (2019 - 2021)";
        let entities = NerModel::Heuristic.recognize(text, &ctx).unwrap();
        let found: Vec<(EntityLabel, &str)> = entities
            .iter()
            .map(|e| (e.label, &text[e.start..e.end]))
            .collect();
        assert_eq!(
            found,
            vec![
                (EntityLabel::Org, "Acme Conseil SARL"),
                (EntityLabel::Loc, "Lyon"),
                (EntityLabel::Date, "2019 - 2021"),
            ]
        );

        let person = NerModel::Heuristic.recognize("Jane Doe", &ctx).unwrap();
        assert_eq!(person[0].label, EntityLabel::Per);

        let school = NerModel::Heuristic
            .recognize("Master Informatique, Université de Lyon", &ctx)
            .unwrap();
        assert!(school
            .iter()
            .any(|e| e.label == EntityLabel::Org && e.start == 21 && e.end == 40));
    }
}
