//! Conflict resolution between a new snapshot and an existing profile.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::mapper::Matchable;
use crate::models::{
    ConflictDecision, ConflictReason, ConflictRecord, EducationEntry, ExperienceEntry, ItemList,
    LanguageEntry, ListItem, PersonalSlot, ProfileField, ProfileSnapshot, ValueKind,
};
use crate::rules::RulePrecedence;

/// How specific a value is, compared when confidences tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    pub kind: ValueKind,
    /// Combined date precision.
    pub precision: u8,
    /// Filled sub-fields, or length for plain text.
    pub detail: usize,
}

/// Values the resolver can compare.
pub trait MergeValue: Serialize + Clone {
    fn specificity(&self) -> Specificity;
}

fn filled<T>(fields: &[&Option<T>]) -> usize {
    fields.iter().filter(|f| f.is_some()).count()
}

impl MergeValue for String {
    fn specificity(&self) -> Specificity {
        Specificity {
            kind: ValueKind::Text,
            precision: 0,
            detail: self.trim().chars().count(),
        }
    }
}

impl MergeValue for ExperienceEntry {
    fn specificity(&self) -> Specificity {
        let kind = match (&self.period, self.duration_months) {
            (Some(_), _) => ValueKind::Range,
            (None, Some(_)) => ValueKind::Duration,
            (None, None) => ValueKind::Text,
        };
        Specificity {
            kind,
            precision: self.period.map_or(0, |p| p.precision()),
            detail: filled(&[&self.title, &self.company, &self.location, &self.description])
                + usize::from(self.period.is_some())
                + usize::from(self.duration_months.is_some()),
        }
    }
}

impl MergeValue for EducationEntry {
    fn specificity(&self) -> Specificity {
        Specificity {
            kind: if self.period.is_some() { ValueKind::Range } else { ValueKind::Text },
            precision: self.period.map_or(0, |p| p.precision()),
            detail: filled(&[&self.degree, &self.institution, &self.location])
                + usize::from(self.period.is_some()),
        }
    }
}

impl MergeValue for ListItem {
    fn specificity(&self) -> Specificity {
        Specificity {
            kind: if self.period.is_some() { ValueKind::Range } else { ValueKind::Text },
            precision: self.period.map_or(0, |p| p.precision()),
            detail: 1 + filled(&[&self.organization]) + usize::from(self.period.is_some()),
        }
    }
}

impl MergeValue for LanguageEntry {
    fn specificity(&self) -> Specificity {
        Specificity {
            kind: if self.cefr.is_some() { ValueKind::Level } else { ValueKind::Text },
            precision: 0,
            detail: 1 + filled(&[&self.level, &self.cefr]),
        }
    }
}

/// Merged profile plus one record per incoming value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub profile: ProfileSnapshot,
    pub conflicts: Vec<ConflictRecord>,
}

impl MergeOutcome {
    pub fn count(&self, decision: ConflictDecision) -> usize {
        self.conflicts.iter().filter(|c| c.decision == decision).count()
    }
}

/// Merges incoming snapshots into existing profiles.
///
/// User-edited fields are never changed. Otherwise higher confidence wins;
/// on a tie the more specific value, then the more recent one.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    precedence: RulePrecedence,
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl ConflictResolver {
    pub fn new(precedence: RulePrecedence) -> Self {
        Self { precedence }
    }

    pub fn merge(&self, incoming: &ProfileSnapshot, existing: &ProfileSnapshot) -> MergeOutcome {
        let mut profile = existing.clone();
        let mut conflicts = Vec::new();

        for slot in PersonalSlot::ALL {
            let Some(new) = incoming.personal_info.slot(slot) else {
                continue;
            };
            let path = format!("personal_info.{}", slot.as_str());
            let target = profile.personal_info.slot_mut(slot);
            conflicts.push(self.resolve_slot(&path, new, target));
        }

        self.merge_list("experiences", &incoming.experiences, &mut profile.experiences, &mut conflicts);
        self.merge_list("education", &incoming.education, &mut profile.education, &mut conflicts);
        self.merge_list("skills", &incoming.skills, &mut profile.skills, &mut conflicts);
        self.merge_list("soft_skills", &incoming.soft_skills, &mut profile.soft_skills, &mut conflicts);
        self.merge_list("languages", &incoming.languages, &mut profile.languages, &mut conflicts);
        for list in ItemList::ALL {
            self.merge_list(list.as_str(), incoming.items(list), profile.items_mut(list), &mut conflicts);
        }
        self.merge_list("interests", &incoming.interests, &mut profile.interests, &mut conflicts);

        let outcome = MergeOutcome { profile, conflicts };
        info!(
            "Merge: {} replaced, {} kept, {} added, {} flagged for review",
            outcome.count(ConflictDecision::Replaced),
            outcome.count(ConflictDecision::KeptExisting),
            outcome.count(ConflictDecision::Added),
            outcome.count(ConflictDecision::FlaggedForReview)
        );
        outcome
    }

    fn resolve_slot<T: MergeValue>(
        &self,
        path: &str,
        incoming: &ProfileField<T>,
        target: &mut Option<ProfileField<T>>,
    ) -> ConflictRecord {
        if let Some(existing) = target.as_mut() {
            return self.resolve(path, incoming, existing);
        }
        *target = Some(incoming.clone());
        ConflictRecord {
            path: path.to_string(),
            incoming: to_json(&incoming.value),
            existing: None,
            decision: ConflictDecision::Replaced,
            reason: ConflictReason::NoExistingValue,
        }
    }

    /// Apply the decision procedure to one pair, updating `existing` in place.
    pub fn resolve<T: MergeValue>(
        &self,
        path: &str,
        incoming: &ProfileField<T>,
        existing: &mut ProfileField<T>,
    ) -> ConflictRecord {
        let (decision, reason) = self.decide(incoming, existing);
        debug!("{}: {} ({})", path, decision, reason);
        let record = ConflictRecord {
            path: path.to_string(),
            incoming: to_json(&incoming.value),
            existing: Some(to_json(&existing.value)),
            decision,
            reason,
        };
        if decision == ConflictDecision::Replaced {
            *existing = incoming.clone();
        }
        record
    }

    fn decide<T: MergeValue>(
        &self,
        incoming: &ProfileField<T>,
        existing: &ProfileField<T>,
    ) -> (ConflictDecision, ConflictReason) {
        if existing.is_user_edited() {
            return (ConflictDecision::FlaggedForReview, ConflictReason::UserEdited);
        }
        if (incoming.confidence - existing.confidence).abs() > f32::EPSILON {
            return if incoming.confidence > existing.confidence {
                (ConflictDecision::Replaced, ConflictReason::HigherConfidence)
            } else {
                (ConflictDecision::KeptExisting, ConflictReason::LowerConfidence)
            };
        }
        match self.compare_specificity(&incoming.value, &existing.value) {
            Ordering::Less => (ConflictDecision::Replaced, ConflictReason::MoreSpecific),
            Ordering::Greater => (ConflictDecision::KeptExisting, ConflictReason::LessSpecific),
            Ordering::Equal if incoming.provenance.extracted_at > existing.provenance.extracted_at => {
                (ConflictDecision::Replaced, ConflictReason::MoreRecent)
            }
            Ordering::Equal => (ConflictDecision::KeptExisting, ConflictReason::NotMoreRecent),
        }
    }

    /// `Less` when `a` is more specific than `b`.
    fn compare_specificity<T: MergeValue>(&self, a: &T, b: &T) -> Ordering {
        let (a, b) = (a.specificity(), b.specificity());
        self.precedence
            .kind_rank(a.kind)
            .cmp(&self.precedence.kind_rank(b.kind))
            .then_with(|| b.precision.cmp(&a.precision))
            .then_with(|| b.detail.cmp(&a.detail))
    }

    /// Match incoming entries against existing ones; each existing entry is
    /// matched at most once. Unmatched entries are appended.
    fn merge_list<T: MergeValue + Matchable>(
        &self,
        name: &str,
        incoming: &[ProfileField<T>],
        existing: &mut Vec<ProfileField<T>>,
        conflicts: &mut Vec<ConflictRecord>,
    ) {
        let mut matched = vec![false; existing.len()];
        for entry in incoming {
            let found = existing
                .iter()
                .enumerate()
                .position(|(i, e)| !matched[i] && e.value.same_entry(&entry.value));
            match found {
                Some(i) => {
                    matched[i] = true;
                    let path = format!("{}[{}]", name, i);
                    conflicts.push(self.resolve(&path, entry, &mut existing[i]));
                }
                None => {
                    conflicts.push(ConflictRecord {
                        path: format!("{}[{}]", name, existing.len()),
                        incoming: to_json(&entry.value),
                        existing: None,
                        decision: ConflictDecision::Added,
                        reason: ConflictReason::NewEntry,
                    });
                    existing.push(entry.clone());
                    matched.push(true);
                }
            }
        }
    }
}
