//! Canonical values for extracted candidates.
//!
//! Normalization always starts from `raw_value`, so running it twice gives
//! the same candidate.

pub mod contact;

use std::collections::HashMap;

use tracing::debug;

use crate::dates::DateGrammar;
use crate::extract::patterns::CEFR;
use crate::extract::VocabIndex;
use crate::models::{FieldCandidate, FieldName, NormalizedValue};
use crate::redact::redact;
use crate::text::{collapse_whitespace, comparison_key, trim_value};

pub struct Normalizer<'a> {
    grammar: &'a DateGrammar,
    vocab: &'a VocabIndex,
}

impl<'a> Normalizer<'a> {
    pub fn new(grammar: &'a DateGrammar, vocab: &'a VocabIndex) -> Self {
        Self { grammar, vocab }
    }

    /// Fill `normalized`, or keep the raw value and flag the failure.
    pub fn normalize(&self, mut candidate: FieldCandidate) -> FieldCandidate {
        match self.value_for(candidate.field, &candidate.raw_value) {
            Some(value) => {
                candidate.normalized = Some(value);
                candidate.normalization_failed = false;
            }
            None => {
                debug!(
                    "Could not normalize {} '{}'",
                    candidate.field,
                    redact(&candidate.raw_value)
                );
                candidate.normalized = None;
                candidate.normalization_failed = true;
            }
        }
        candidate
    }

    pub fn normalize_all(&self, candidates: Vec<FieldCandidate>) -> Vec<FieldCandidate> {
        candidates.into_iter().map(|c| self.normalize(c)).collect()
    }

    /// Canonical value of `raw` read as `field`.
    pub fn value_for(&self, field: FieldName, raw: &str) -> Option<NormalizedValue> {
        match field {
            FieldName::Email => contact::email(raw).map(NormalizedValue::Email),
            FieldName::Phone => contact::phone(raw).map(NormalizedValue::Phone),
            FieldName::Linkedin | FieldName::Github | FieldName::Website => {
                contact::url(raw).map(NormalizedValue::Url)
            }
            FieldName::Date => self.date(raw),
            FieldName::DateRange => self.grammar.parse_range(raw).map(NormalizedValue::Range),
            FieldName::Duration => self.duration(raw),
            FieldName::Skill | FieldName::SoftSkill | FieldName::Interest => {
                keyword(raw).map(NormalizedValue::Keyword)
            }
            FieldName::Language => self.language(raw),
            FieldName::LanguageLevel => self.level(raw),
            _ => text(raw).map(NormalizedValue::Text),
        }
    }

    fn date(&self, raw: &str) -> Option<NormalizedValue> {
        if let Some(range) = self.grammar.parse_range(raw) {
            return Some(NormalizedValue::Range(range));
        }
        self.grammar
            .parse_date(raw)
            .or_else(|| self.grammar.find_dates(raw).first().map(|m| m.value))
            .map(NormalizedValue::Date)
    }

    /// A range's length wins over a stated duration.
    fn duration(&self, raw: &str) -> Option<NormalizedValue> {
        self.grammar
            .parse_range(raw)
            .and_then(|range| range.months())
            .or_else(|| self.grammar.parse_duration(raw))
            .map(|months| NormalizedValue::Duration { months })
    }

    fn language(&self, raw: &str) -> Option<NormalizedValue> {
        let canonical = self
            .vocab
            .language_of(raw)
            .or_else(|| self.vocab.languages.find_all(raw).first().map(|h| h.value));
        match canonical {
            Some(name) => Some(NormalizedValue::Keyword(name.to_lowercase())),
            None => keyword(raw).map(NormalizedValue::Keyword),
        }
    }

    fn level(&self, raw: &str) -> Option<NormalizedValue> {
        let label = keyword(raw)?;
        let cefr = CEFR
            .captures(&raw.to_uppercase())
            .map(|caps| caps[1].to_string())
            .or_else(|| self.vocab.level_of(raw).map(str::to_string))
            .or_else(|| {
                self.vocab
                    .levels
                    .find_all(raw)
                    .first()
                    .map(|h| h.value.to_string())
            });
        Some(NormalizedValue::Level { cefr, label })
    }
}

/// Trimmed, whitespace-collapsed, case-preserved text.
pub fn text(raw: &str) -> Option<String> {
    let value = collapse_whitespace(trim_value(raw));
    (!value.is_empty()).then_some(value)
}

/// Lowercased text for vocabulary-like fields.
pub fn keyword(raw: &str) -> Option<String> {
    text(raw).map(|v| v.to_lowercase())
}

/// Collapse candidates with the same field and the same folded value into
/// the most confident one. First occurrences keep their position.
pub fn dedup(candidates: Vec<FieldCandidate>) -> Vec<FieldCandidate> {
    let mut seen: HashMap<(FieldName, String), usize> = HashMap::new();
    let mut out: Vec<FieldCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let key = (candidate.field, comparison_key(&candidate.value_text()));
        match seen.get(&key) {
            Some(&i) => {
                if candidate.confidence > out[i].confidence {
                    out[i] = candidate;
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, ExtractionMethod, PartialDate, RangeEnd, SourceSpan};
    use crate::rules::RuleSet;
    use pretty_assertions::assert_eq;

    struct Fixture {
        grammar: DateGrammar,
        vocab: VocabIndex,
    }

    fn fixture() -> Fixture {
        let rules = RuleSet::builtin().unwrap();
        Fixture {
            grammar: DateGrammar::new(&rules.dates).unwrap(),
            vocab: VocabIndex::new(&rules.vocab).unwrap(),
        }
    }

    fn candidate(field: FieldName, raw: &str) -> FieldCandidate {
        FieldCandidate::new(field, raw, 0.8, ExtractionMethod::Rule, SourceSpan::new(0, raw.len()))
    }

    fn value(field: FieldName, raw: &str) -> Option<NormalizedValue> {
        let f = fixture();
        Normalizer::new(&f.grammar, &f.vocab).value_for(field, raw)
    }

    #[test]
    fn test_open_range() {
        let expected = DateRange::new(PartialDate::year_month(2020, 1).unwrap(), RangeEnd::Open);
        assert_eq!(
            value(FieldName::DateRange, "janvier 2020 – présent"),
            Some(NormalizedValue::Range(expected))
        );
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            value(FieldName::Date, "03/2019"),
            Some(NormalizedValue::Date(PartialDate::year_month(2019, 3).unwrap()))
        );
        assert_eq!(
            value(FieldName::Date, "2017"),
            Some(NormalizedValue::Date(PartialDate::year(2017).unwrap()))
        );
        assert_eq!(value(FieldName::Date, "someday"), None);
    }

    #[test]
    fn test_durations() {
        assert_eq!(
            value(FieldName::Duration, "2 ans et 6 mois"),
            Some(NormalizedValue::Duration { months: 30 })
        );
        assert_eq!(
            value(FieldName::Duration, "18 months"),
            Some(NormalizedValue::Duration { months: 18 })
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            value(FieldName::JobTitle, "  Développeuse   Backend, "),
            Some(NormalizedValue::Text("Développeuse Backend".into()))
        );
        assert_eq!(
            value(FieldName::Skill, "PostgreSQL"),
            Some(NormalizedValue::Keyword("postgresql".into()))
        );
        assert_eq!(
            value(FieldName::Language, "Anglais"),
            Some(NormalizedValue::Keyword("english".into()))
        );
    }

    #[test]
    fn test_levels() {
        assert_eq!(
            value(FieldName::LanguageLevel, "courant"),
            Some(NormalizedValue::Level {
                cefr: Some("C1".into()),
                label: "courant".into()
            })
        );
        assert_eq!(
            value(FieldName::LanguageLevel, "b2"),
            Some(NormalizedValue::Level {
                cefr: Some("B2".into()),
                label: "b2".into()
            })
        );
        assert_eq!(
            value(FieldName::LanguageLevel, "Langue maternelle"),
            Some(NormalizedValue::Level {
                cefr: Some("C2".into()),
                label: "langue maternelle".into()
            })
        );
    }

    #[test]
    fn test_failure_keeps_raw_value() {
        let f = fixture();
        let normalizer = Normalizer::new(&f.grammar, &f.vocab);
        let out = normalizer.normalize(candidate(FieldName::Phone, "12"));
        assert!(out.normalization_failed);
        assert_eq!(out.normalized, None);
        assert_eq!(out.raw_value, "12");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let f = fixture();
        let normalizer = Normalizer::new(&f.grammar, &f.vocab);
        for (field, raw) in [
            (FieldName::DateRange, "De 2018 à 2020"),
            (FieldName::Duration, "1.5 years"),
            (FieldName::Email, "Jane@Doe.IO"),
            (FieldName::Company, " Acme  SAS "),
            (FieldName::Phone, "x"),
        ] {
            let once = normalizer.normalize(candidate(field, raw));
            let twice = normalizer.normalize(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_string_forms_are_fixed_points() {
        for raw in ["  Chef   de projet ", "Rust;", "a"] {
            let once = text(raw).unwrap();
            assert_eq!(text(&once), Some(once.clone()));
            let once = keyword(raw).unwrap();
            assert_eq!(keyword(&once), Some(once.clone()));
        }
    }

    #[test]
    fn test_dedup_keeps_most_confident() {
        let f = fixture();
        let normalizer = Normalizer::new(&f.grammar, &f.vocab);
        let mut low = candidate(FieldName::Skill, "Rust");
        low.confidence = 0.5;
        let mut high = candidate(FieldName::Skill, "RUST ");
        high.confidence = 0.9;
        let other = candidate(FieldName::Skill, "Go");
        let out = dedup(normalizer.normalize_all(vec![low, other, high]));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].raw_value, "RUST ");
        assert_eq!(out[1].raw_value, "Go");
    }
}
