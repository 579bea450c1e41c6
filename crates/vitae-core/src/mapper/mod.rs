//! Mapping of extraction results onto a profile snapshot.

mod entries;
pub mod matching;
pub mod schema;

pub use matching::Matchable;
pub use schema::{schema_guard, SchemaGuard};

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SchemaValidationError;
use crate::models::{
    EducationEntry, ExperienceEntry, ExtractionResult, FieldCandidate, FieldName, ItemList,
    LanguageEntry, ListItem, NormalizedValue, PersonalSlot, ProfileField, ProfileSnapshot,
    Provenance, SectionKind,
};
use crate::rules::RulePrecedence;
use self::entries::{compare_candidates, group_section, Draft, Slot};

/// A mapped profile with the entries the schema guard rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingOutcome {
    pub profile: ProfileSnapshot,
    pub violations: Vec<SchemaValidationError>,
    pub completion_rate: f32,
}

/// Turns section candidates into profile slots and entries.
#[derive(Debug, Clone, Default)]
pub struct ExtractionMapper {
    precedence: RulePrecedence,
}

/// Source and time stamped on every mapped field.
struct Origin<'a> {
    source: &'a str,
    at: DateTime<Utc>,
}

impl Origin<'_> {
    fn field<T>(&self, value: T, candidate: &FieldCandidate) -> ProfileField<T> {
        let mut field = ProfileField::new(
            value,
            candidate.confidence,
            Provenance {
                source: self.source.to_string(),
                method: Some(candidate.method),
                extracted_at: self.at,
                user_edited: false,
                span: Some(candidate.span),
            },
        );
        field.low_confidence = candidate.low_confidence;
        field.normalization_failed = candidate.normalization_failed;
        field
    }

    /// Entry field: mean confidence, method of the most confident part.
    fn entry<T>(&self, value: T, draft: &Draft) -> Option<ProfileField<T>> {
        let lead = draft
            .candidates()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal))?;
        let mut field = self.field(value, lead);
        field.confidence = draft.confidence();
        field.provenance.span = draft.span();
        field.low_confidence = draft.candidates().any(|c| c.low_confidence);
        field.normalization_failed = draft.candidates().any(|c| c.normalization_failed);
        Some(field)
    }
}

fn personal_slot(field: FieldName) -> Option<PersonalSlot> {
    Some(match field {
        FieldName::FullName => PersonalSlot::FullName,
        FieldName::Headline => PersonalSlot::Headline,
        FieldName::Email => PersonalSlot::Email,
        FieldName::Phone => PersonalSlot::Phone,
        FieldName::Location => PersonalSlot::Location,
        FieldName::Linkedin => PersonalSlot::Linkedin,
        FieldName::Github => PersonalSlot::Github,
        FieldName::Website => PersonalSlot::Website,
        _ => return None,
    })
}

/// Contact details are taken from any section but references; identity
/// fields only from the personal information block.
fn feeds_personal_info(kind: SectionKind, slot: PersonalSlot) -> bool {
    match slot {
        PersonalSlot::FullName | PersonalSlot::Headline | PersonalSlot::Location => {
            kind == SectionKind::PersonalInfo
        }
        _ => kind != SectionKind::References,
    }
}

fn item_list(kind: SectionKind) -> Option<ItemList> {
    match kind {
        SectionKind::Projects => Some(ItemList::Projects),
        SectionKind::Certifications => Some(ItemList::Certifications),
        SectionKind::Publications => Some(ItemList::Publications),
        SectionKind::Volunteering => Some(ItemList::Volunteering),
        SectionKind::Awards => Some(ItemList::Awards),
        SectionKind::References => Some(ItemList::References),
        _ => None,
    }
}

/// Fold entries describing the same thing into the first of them.
fn merge_similar<T: Matchable>(entries: Vec<ProfileField<T>>) -> Vec<ProfileField<T>> {
    let mut merged: Vec<ProfileField<T>> = Vec::with_capacity(entries.len());
    for entry in entries {
        match merged.iter_mut().find(|m| m.value.same_entry(&entry.value)) {
            Some(existing) => {
                if entry.confidence > existing.confidence {
                    let mut entry = entry;
                    entry.value.absorb(&existing.value);
                    *existing = entry;
                } else {
                    existing.value.absorb(&entry.value);
                }
            }
            None => merged.push(entry),
        }
    }
    merged
}

impl ExtractionMapper {
    pub fn new(precedence: RulePrecedence) -> Self {
        Self { precedence }
    }

    pub fn map(&self, result: &ExtractionResult) -> MappingOutcome {
        let origin = Origin {
            source: &result.source_id,
            at: result.extracted_at,
        };
        let mut profile = ProfileSnapshot::default();
        let mut violations = Vec::new();

        self.map_personal_info(result, &origin, &mut profile);
        self.map_experiences(result, &origin, &mut profile, &mut violations);
        self.map_education(result, &origin, &mut profile, &mut violations);
        self.map_items(result, &origin, &mut profile, &mut violations);
        map_languages(result, &origin, &mut profile, &mut violations);

        profile.skills = keywords(result, FieldName::Skill, &origin);
        profile.soft_skills = keywords(result, FieldName::SoftSkill, &origin);
        profile.interests = keywords(result, FieldName::Interest, &origin);

        for violation in &violations {
            warn!("{}", violation);
        }
        let completion_rate = profile.completion_rate();
        info!(
            "Mapped {}: {} experiences, {} education, {} skills, completion {:.0}%",
            result.source_id,
            profile.experiences.len(),
            profile.education.len(),
            profile.skills.len(),
            completion_rate * 100.0
        );

        MappingOutcome {
            profile,
            violations,
            completion_rate,
        }
    }

    fn map_personal_info(&self, result: &ExtractionResult, origin: &Origin<'_>, profile: &mut ProfileSnapshot) {
        for slot in PersonalSlot::ALL {
            let best = result
                .sections
                .iter()
                .filter(|s| feeds_personal_info(s.kind, slot))
                .flat_map(|s| s.candidates.iter())
                .filter(|c| personal_slot(c.field) == Some(slot))
                .min_by(|a, b| compare_candidates(&self.precedence, a, b));
            if let Some(candidate) = best {
                debug!("{} <- {} at {:.2}", slot.as_str(), candidate.extractor, candidate.confidence);
                *profile.personal_info.slot_mut(slot) = Some(origin.field(candidate.value_text(), candidate));
            }
        }
    }

    fn map_experiences(
        &self,
        result: &ExtractionResult,
        origin: &Origin<'_>,
        profile: &mut ProfileSnapshot,
        violations: &mut Vec<SchemaValidationError>,
    ) {
        let mut entries = Vec::new();
        let mut index = 0;
        for section in result.sections_of(SectionKind::Experiences) {
            for draft in group_section(section, &result.blocks, &self.precedence) {
                let period = draft.period();
                let entry = ExperienceEntry {
                    title: draft.text(Slot::Title),
                    company: draft.text(Slot::Org),
                    location: draft.text(Slot::Location),
                    duration_months: draft.duration_months().or_else(|| period.and_then(|p| p.months())),
                    period,
                    description: draft.description(),
                };
                match schema_guard(&entry, &format!("experiences[{}]", index)) {
                    Ok(()) => entries.extend(origin.entry(entry, &draft)),
                    Err(e) => violations.push(e),
                }
                index += 1;
            }
        }
        profile.experiences = merge_similar(entries);
    }

    fn map_education(
        &self,
        result: &ExtractionResult,
        origin: &Origin<'_>,
        profile: &mut ProfileSnapshot,
        violations: &mut Vec<SchemaValidationError>,
    ) {
        let mut entries = Vec::new();
        let mut index = 0;
        for section in result.sections_of(SectionKind::Education) {
            for draft in group_section(section, &result.blocks, &self.precedence) {
                let entry = EducationEntry {
                    degree: draft.text(Slot::Title),
                    institution: draft.text(Slot::Org),
                    location: draft.text(Slot::Location),
                    period: draft.period(),
                };
                match schema_guard(&entry, &format!("education[{}]", index)) {
                    Ok(()) => entries.extend(origin.entry(entry, &draft)),
                    Err(e) => violations.push(e),
                }
                index += 1;
            }
        }
        profile.education = merge_similar(entries);
    }

    fn map_items(
        &self,
        result: &ExtractionResult,
        origin: &Origin<'_>,
        profile: &mut ProfileSnapshot,
        violations: &mut Vec<SchemaValidationError>,
    ) {
        for list in ItemList::ALL {
            let mut entries = Vec::new();
            let mut index = 0;
            for section in result.sections.iter().filter(|s| item_list(s.kind) == Some(list)) {
                for draft in group_section(section, &result.blocks, &self.precedence) {
                    let entry = ListItem {
                        title: draft.text(Slot::Title).unwrap_or_default(),
                        organization: draft.text(Slot::Org),
                        period: draft.period(),
                    };
                    match schema_guard(&entry, &format!("{}[{}]", list.as_str(), index)) {
                        Ok(()) => entries.extend(origin.entry(entry, &draft)),
                        Err(e) => violations.push(e),
                    }
                    index += 1;
                }
            }
            *profile.items_mut(list) = merge_similar(entries);
        }
    }
}

/// Pair every language with the level stated on the same line: the first
/// level after it and before the next language, or the only level of the
/// line when the line names a single language.
fn map_languages(
    result: &ExtractionResult,
    origin: &Origin<'_>,
    profile: &mut ProfileSnapshot,
    violations: &mut Vec<SchemaValidationError>,
) {
    let candidates: Vec<&FieldCandidate> = result.candidates().collect();
    let mut entries = Vec::new();

    for (index, language) in candidates.iter().filter(|c| c.field == FieldName::Language).enumerate() {
        let same_block = |field: FieldName| {
            let mut found: Vec<&&FieldCandidate> = candidates
                .iter()
                .filter(move |c| c.field == field && c.block == language.block)
                .collect();
            found.sort_by_key(|c| c.span.start);
            found
        };
        let languages = same_block(FieldName::Language);
        let levels = same_block(FieldName::LanguageLevel);
        let next_language = languages
            .iter()
            .map(|c| c.span.start)
            .find(|&start| start > language.span.start)
            .unwrap_or(usize::MAX);
        let level = levels
            .iter()
            .find(|l| l.span.start >= language.span.end && l.span.start < next_language)
            .or_else(|| if languages.len() == 1 { levels.first() } else { None });

        let mut entry = LanguageEntry {
            language: language.value_text(),
            ..Default::default()
        };
        if let Some(level) = level {
            match &level.normalized {
                Some(NormalizedValue::Level { cefr, label }) => {
                    entry.level = Some(label.clone());
                    entry.cefr = cefr.clone();
                }
                _ => entry.level = Some(level.value_text()),
            }
        }

        match schema_guard(&entry, &format!("languages[{}]", index)) {
            Ok(()) => {
                let mut field = origin.field(entry, language);
                if let Some(level) = level {
                    field.low_confidence |= level.low_confidence;
                }
                entries.push(field);
            }
            Err(e) => violations.push(e),
        }
    }

    profile.languages = merge_similar(entries);
}

/// Keyword list of one field across all sections, most confident copy of
/// each value, in document order.
fn keywords(result: &ExtractionResult, field: FieldName, origin: &Origin<'_>) -> Vec<ProfileField<String>> {
    let entries = result
        .candidates()
        .filter(|c| c.field == field)
        .map(|c| origin.field(c.value_text(), c))
        .filter(|f| !f.value.trim().is_empty())
        .collect();
    merge_similar(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AiMode, DateRange, DocumentFormat, ExtractionMetadata, ExtractionMethod, LanguageGuess,
        PartialDate, RangeEnd, Section, SourceSpan, TextBlock,
    };
    use pretty_assertions::assert_eq;

    /// Lines joined with newlines, one block each.
    fn blocks(lines: &[&str]) -> (String, Vec<TextBlock>) {
        let text = lines.join("\n");
        let mut offset = 0;
        let blocks = lines
            .iter()
            .map(|line| {
                let block = TextBlock::new(*line, SourceSpan::new(offset, offset + line.len()), 1);
                offset += line.len() + 1;
                block
            })
            .collect();
        (text, blocks)
    }

    fn cand(
        blocks: &[TextBlock],
        block: usize,
        field: FieldName,
        raw: &str,
        conf: f32,
        method: ExtractionMethod,
        value: NormalizedValue,
    ) -> FieldCandidate {
        let line = &blocks[block];
        let start = line.span.start + line.text.find(raw).unwrap();
        let mut c = FieldCandidate::new(field, raw, conf, method, SourceSpan::new(start, start + raw.len()))
            .with_block(block);
        c.normalized = Some(value);
        c
    }

    fn text(s: &str) -> NormalizedValue {
        NormalizedValue::Text(s.to_string())
    }

    fn years(start: i32, end: i32) -> DateRange {
        DateRange::new(
            PartialDate::year(start).unwrap(),
            RangeEnd::Closed(PartialDate::year(end).unwrap()),
        )
    }

    fn section(kind: SectionKind, heading: bool, range: std::ops::Range<usize>, blocks: &[TextBlock], candidates: Vec<FieldCandidate>) -> Section {
        let span = SourceSpan::new(blocks[range.start].span.start, blocks[range.end - 1].span.end);
        Section {
            kind,
            heading: heading.then(|| blocks[range.start].text.clone()),
            span,
            text: String::new(),
            label_confidence: 0.9,
            blocks: range,
            candidates,
        }
    }

    fn result(text: String, blocks: Vec<TextBlock>, sections: Vec<Section>) -> ExtractionResult {
        ExtractionResult {
            source_id: "cv.pdf".into(),
            format: DocumentFormat::Pdf,
            language: LanguageGuess {
                code: "fr".into(),
                confidence: 0.9,
                fallback: false,
            },
            extracted_at: Utc::now(),
            text,
            blocks,
            sections,
            warnings: Vec::new(),
            metadata: ExtractionMetadata {
                ai_mode: AiMode::RulesOnly,
                ocr_used: false,
                processing_time_ms: 0,
                stages_completed: Vec::new(),
                metrics: Default::default(),
            },
        }
    }

    #[test]
    fn test_scalar_prefers_confident_rule() {
        let (t, b) = blocks(&["Jane Doe", "jane@doe.io"]);
        let candidates = vec![
            cand(&b, 0, FieldName::FullName, "Jane Doe", 0.6, ExtractionMethod::Ner, text("Jane Doe")),
            cand(&b, 0, FieldName::FullName, "Jane Doe", 0.9, ExtractionMethod::Rule, text("Jane Doe")),
            cand(&b, 1, FieldName::Email, "jane@doe.io", 0.95, ExtractionMethod::Rule, NormalizedValue::Email("jane@doe.io".into())),
        ];
        let sections = vec![section(SectionKind::PersonalInfo, false, 0..2, &b, candidates)];
        let outcome = ExtractionMapper::default().map(&result(t, b, sections));

        let name = outcome.profile.personal_info.full_name.unwrap();
        assert_eq!(name.value, "Jane Doe");
        assert_eq!(name.confidence, 0.9);
        assert_eq!(name.provenance.method, Some(ExtractionMethod::Rule));
        assert_eq!(name.provenance.source, "cv.pdf");
        assert_eq!(outcome.profile.personal_info.email.unwrap().value, "jane@doe.io");
    }

    #[test]
    fn test_experience_entries_and_descriptions() {
        let (t, b) = blocks(&[
            "Expérience",
            "Développeur Rust - Acme (2019 - 2021)",
            "- Migration vers Rust",
            "Stagiaire - Globex (2017 - 2018)",
        ]);
        let candidates = vec![
            cand(&b, 1, FieldName::JobTitle, "Développeur Rust", 0.75, ExtractionMethod::Rule, text("Développeur Rust")),
            cand(&b, 1, FieldName::Company, "Acme", 0.75, ExtractionMethod::Rule, text("Acme")),
            cand(&b, 1, FieldName::DateRange, "2019 - 2021", 0.9, ExtractionMethod::Rule, NormalizedValue::Range(years(2019, 2021))),
            cand(&b, 3, FieldName::JobTitle, "Stagiaire", 0.75, ExtractionMethod::Rule, text("Stagiaire")),
            cand(&b, 3, FieldName::Company, "Globex", 0.75, ExtractionMethod::Rule, text("Globex")),
            cand(&b, 3, FieldName::DateRange, "2017 - 2018", 0.9, ExtractionMethod::Rule, NormalizedValue::Range(years(2017, 2018))),
        ];
        let sections = vec![section(SectionKind::Experiences, true, 0..4, &b, candidates)];
        let outcome = ExtractionMapper::default().map(&result(t, b, sections));

        let jobs = &outcome.profile.experiences;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].value.title.as_deref(), Some("Développeur Rust"));
        assert_eq!(jobs[0].value.company.as_deref(), Some("Acme"));
        assert_eq!(jobs[0].value.period, Some(years(2019, 2021)));
        assert_eq!(jobs[0].value.duration_months, Some(24));
        assert_eq!(jobs[0].value.description.as_deref(), Some("Migration vers Rust"));
        assert_eq!(jobs[1].value.company.as_deref(), Some("Globex"));
        assert_eq!(jobs[1].value.description, None);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn test_schema_guard_rejects_dates_only_entry() {
        let (t, b) = blocks(&["Formation", "2015 - 2016", "Master Informatique", "2012 - 2014"]);
        let candidates = vec![
            cand(&b, 1, FieldName::DateRange, "2015 - 2016", 0.9, ExtractionMethod::Rule, NormalizedValue::Range(years(2015, 2016))),
            cand(&b, 2, FieldName::Degree, "Master Informatique", 0.85, ExtractionMethod::Rule, text("Master Informatique")),
            cand(&b, 3, FieldName::DateRange, "2012 - 2014", 0.9, ExtractionMethod::Rule, NormalizedValue::Range(years(2012, 2014))),
        ];
        let sections = vec![section(SectionKind::Education, true, 0..4, &b, candidates)];
        let outcome = ExtractionMapper::default().map(&result(t, b, sections));

        assert_eq!(outcome.profile.education.len(), 1);
        assert_eq!(outcome.profile.education[0].value.degree.as_deref(), Some("Master Informatique"));
        assert_eq!(outcome.profile.education[0].value.period, Some(years(2015, 2016)));
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].path, "education[1]");
    }

    #[test]
    fn test_languages_pair_with_levels_on_same_line() {
        let (t, b) = blocks(&["Langues", "Anglais (C1), Espagnol (B1)"]);
        let level = |cefr: &str| NormalizedValue::Level {
            cefr: Some(cefr.to_string()),
            label: cefr.to_lowercase(),
        };
        let candidates = vec![
            cand(&b, 1, FieldName::Language, "Anglais", 0.9, ExtractionMethod::Rule, NormalizedValue::Keyword("english".into())),
            cand(&b, 1, FieldName::LanguageLevel, "C1", 0.95, ExtractionMethod::Rule, level("C1")),
            cand(&b, 1, FieldName::Language, "Espagnol", 0.9, ExtractionMethod::Rule, NormalizedValue::Keyword("spanish".into())),
            cand(&b, 1, FieldName::LanguageLevel, "B1", 0.95, ExtractionMethod::Rule, level("B1")),
        ];
        let sections = vec![section(SectionKind::Languages, true, 0..2, &b, candidates)];
        let outcome = ExtractionMapper::default().map(&result(t, b, sections));

        let languages: Vec<(String, Option<String>)> = outcome
            .profile
            .languages
            .iter()
            .map(|l| (l.value.language.clone(), l.value.cefr.clone()))
            .collect();
        assert_eq!(
            languages,
            vec![
                ("english".to_string(), Some("C1".to_string())),
                ("spanish".to_string(), Some("B1".to_string())),
            ]
        );
    }

    #[test]
    fn test_skills_deduplicated_across_sections() {
        let (t, b) = blocks(&["Compétences", "Rust, Python", "Outils", "rust"]);
        let kw = |s: &str| NormalizedValue::Keyword(s.to_string());
        let first = vec![
            cand(&b, 1, FieldName::Skill, "Rust", 0.7, ExtractionMethod::Rule, kw("rust")),
            cand(&b, 1, FieldName::Skill, "Python", 0.7, ExtractionMethod::Rule, kw("python")),
        ];
        let second = vec![cand(&b, 3, FieldName::Skill, "rust", 0.8, ExtractionMethod::Rule, kw("rust"))];
        let sections = vec![
            section(SectionKind::Skills, true, 0..2, &b, first),
            section(SectionKind::Skills, true, 2..4, &b, second),
        ];
        let outcome = ExtractionMapper::default().map(&result(t, b, sections));
        let skills: Vec<&str> = outcome.profile.skills.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(skills, vec!["rust", "python"]);
        assert_eq!(outcome.profile.skills[0].confidence, 0.8);
        assert!((outcome.completion_rate - 1.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_overlapping_similar_entries_are_merged() {
        let (t, b) = blocks(&["Projets", "Vitae (2020 - 2021)", "Vitae parser 2021"]);
        let range = |s, e| NormalizedValue::Range(years(s, e));
        let candidates = vec![
            cand(&b, 1, FieldName::Item, "Vitae", 0.6, ExtractionMethod::Rule, text("Vitae")),
            cand(&b, 1, FieldName::DateRange, "2020 - 2021", 0.9, ExtractionMethod::Rule, range(2020, 2021)),
            cand(&b, 2, FieldName::Item, "Vitae parser", 0.6, ExtractionMethod::Rule, text("Vitae parser")),
            cand(&b, 2, FieldName::Date, "2021", 0.7, ExtractionMethod::Rule, NormalizedValue::Date(PartialDate::year(2021).unwrap())),
        ];
        let sections = vec![section(SectionKind::Projects, true, 0..3, &b, candidates)];
        let outcome = ExtractionMapper::default().map(&result(t, b, sections));
        assert_eq!(outcome.profile.projects.len(), 1);
    }
}
