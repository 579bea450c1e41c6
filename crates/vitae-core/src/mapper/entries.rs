//! Grouping of list-section candidates into entries.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::extract::patterns::LEADING_BULLET;
use crate::models::{
    DateRange, FieldCandidate, FieldName, NormalizedValue, Section, SectionKind, SourceSpan,
    TextBlock,
};
use crate::rules::RulePrecedence;

/// Sub-field of a list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Slot {
    /// Job title, degree or item title.
    Title,
    /// Company, institution or organization.
    Org,
    Location,
    Period,
    Duration,
}

impl Slot {
    /// A second value for these starts a new entry.
    fn is_anchor(&self) -> bool {
        matches!(self, Slot::Title | Slot::Org | Slot::Period)
    }

    pub(crate) fn for_field(kind: SectionKind, field: FieldName) -> Option<Slot> {
        let slot = match (kind, field) {
            (SectionKind::Experiences, FieldName::JobTitle) => Slot::Title,
            (SectionKind::Experiences, FieldName::Company) => Slot::Org,
            (SectionKind::Experiences, FieldName::Duration) => Slot::Duration,
            (SectionKind::Education, FieldName::Degree) => Slot::Title,
            (SectionKind::Education, FieldName::Institution) => Slot::Org,
            (SectionKind::Experiences | SectionKind::Education, FieldName::Location) => Slot::Location,
            (SectionKind::Experiences | SectionKind::Education, FieldName::Organization) => Slot::Org,
            (SectionKind::Experiences | SectionKind::Education, FieldName::Date | FieldName::DateRange) => {
                Slot::Period
            }
            (SectionKind::Experiences | SectionKind::Education, _) => return None,
            (_, FieldName::Item) => Slot::Title,
            (_, FieldName::Organization | FieldName::Company | FieldName::Institution) => Slot::Org,
            (_, FieldName::Date | FieldName::DateRange) => Slot::Period,
            _ => return None,
        };
        Some(slot)
    }
}

/// An entry under construction: the best candidate per slot plus the
/// description lines that followed it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Draft {
    pub slots: BTreeMap<Slot, FieldCandidate>,
    pub description: Vec<String>,
}

impl Draft {
    pub fn text(&self, slot: Slot) -> Option<String> {
        self.slots.get(&slot).map(FieldCandidate::value_text)
    }

    pub fn period(&self) -> Option<DateRange> {
        match self.slots.get(&Slot::Period)?.normalized.as_ref()? {
            NormalizedValue::Range(range) => Some(*range),
            NormalizedValue::Date(date) => Some(DateRange::point(*date)),
            _ => None,
        }
    }

    pub fn duration_months(&self) -> Option<u32> {
        match self.slots.get(&Slot::Duration)?.normalized.as_ref()? {
            NormalizedValue::Duration { months } => Some(*months),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<String> {
        (!self.description.is_empty()).then(|| self.description.join("\n"))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &FieldCandidate> {
        self.slots.values()
    }

    pub fn confidence(&self) -> f32 {
        if self.slots.is_empty() {
            return 0.0;
        }
        self.slots.values().map(|c| c.confidence).sum::<f32>() / self.slots.len() as f32
    }

    /// Span covering every slot candidate.
    pub fn span(&self) -> Option<SourceSpan> {
        let start = self.slots.values().map(|c| c.span.start).min()?;
        let end = self.slots.values().map(|c| c.span.end).max()?;
        Some(SourceSpan::new(start, end))
    }
}

/// Order two candidates for one slot; `Less` when `a` is preferred.
pub(crate) fn compare_candidates(precedence: &RulePrecedence, a: &FieldCandidate, b: &FieldCandidate) -> Ordering {
    precedence
        .kind_rank(a.value_kind())
        .cmp(&precedence.kind_rank(b.value_kind()))
        .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        .then_with(|| precedence.compare_methods(a.field, a.method, b.method))
        .then_with(|| a.span.start.cmp(&b.span.start))
}

/// Walk the section's body blocks in order and split its candidates into
/// entries. A slot filled again from another block starts a new entry;
/// blocks without mapped candidates become description lines.
pub(crate) fn group_section(section: &Section, blocks: &[TextBlock], precedence: &RulePrecedence) -> Vec<Draft> {
    let mut drafts: Vec<Draft> = Vec::new();

    for index in section.body_blocks() {
        let mut mapped: Vec<(Slot, &FieldCandidate)> = section
            .candidates
            .iter()
            .filter(|c| c.block == index)
            .filter_map(|c| Slot::for_field(section.kind, c.field).map(|slot| (slot, c)))
            .collect();
        mapped.sort_by_key(|(_, c)| c.span.start);

        if mapped.is_empty() {
            let Some(current) = drafts.last_mut() else { continue };
            let Some(block) = blocks.get(index) else { continue };
            let line = LEADING_BULLET.replace(block.text.trim(), "");
            if !line.trim().is_empty() {
                current.description.push(line.trim().to_string());
            }
            continue;
        }

        for (slot, candidate) in mapped {
            let starts_entry = match drafts.last().and_then(|d| d.slots.get(&slot)) {
                None => drafts.is_empty(),
                Some(existing) => {
                    slot.is_anchor()
                        && !candidate.field.is_generic()
                        && !existing.field.is_generic()
                        && existing.block != candidate.block
                }
            };
            if starts_entry {
                drafts.push(Draft::default());
            }
            let Some(current) = drafts.last_mut() else { continue };
            match current.slots.get(&slot) {
                None => {
                    current.slots.insert(slot, candidate.clone());
                }
                Some(existing) => {
                    let replace = match (candidate.field.is_generic(), existing.field.is_generic()) {
                        (true, false) => false,
                        (false, true) => true,
                        _ => compare_candidates(precedence, candidate, existing) == Ordering::Less,
                    };
                    if replace {
                        current.slots.insert(slot, candidate.clone());
                    }
                }
            }
        }
    }

    drafts
}
