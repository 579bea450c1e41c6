//! Entry similarity shared by the mapper and the conflict resolver.

use crate::models::{DateRange, EducationEntry, ExperienceEntry, LanguageEntry, ListItem};
use crate::text::{comparison_key, similar_names};

/// Entries that can be recognised as describing the same thing.
pub trait Matchable {
    fn same_entry(&self, other: &Self) -> bool;

    /// Fill fields missing from `self` with those of `other`.
    fn absorb(&mut self, other: &Self);
}

/// `Some(true)` when both periods are known and overlap.
fn periods_overlap(a: Option<&DateRange>, b: Option<&DateRange>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.overlaps(b)),
        _ => None,
    }
}

/// Compare name pairs present on both sides: (similar, dissimilar) counts.
fn name_votes(pairs: &[(Option<&String>, Option<&String>)]) -> (usize, usize) {
    pairs.iter().fold((0, 0), |(agree, disagree), pair| match pair {
        (Some(a), Some(b)) if similar_names(a, b) => (agree + 1, disagree),
        (Some(_), Some(_)) => (agree, disagree + 1),
        _ => (agree, disagree),
    })
}

/// Overlapping periods need one similar name; without both periods every
/// name present on both sides must agree.
fn same_dated_entry(period: Option<bool>, votes: (usize, usize)) -> bool {
    let (agree, disagree) = votes;
    match period {
        Some(false) => false,
        Some(true) => agree > 0,
        None => agree > 0 && disagree == 0,
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

impl Matchable for ExperienceEntry {
    fn same_entry(&self, other: &Self) -> bool {
        let votes = name_votes(&[
            (self.company.as_ref(), other.company.as_ref()),
            (self.title.as_ref(), other.title.as_ref()),
        ]);
        same_dated_entry(periods_overlap(self.period.as_ref(), other.period.as_ref()), votes)
    }

    fn absorb(&mut self, other: &Self) {
        fill(&mut self.title, &other.title);
        fill(&mut self.company, &other.company);
        fill(&mut self.location, &other.location);
        fill(&mut self.period, &other.period);
        fill(&mut self.duration_months, &other.duration_months);
        fill(&mut self.description, &other.description);
    }
}

impl Matchable for EducationEntry {
    fn same_entry(&self, other: &Self) -> bool {
        let votes = name_votes(&[
            (self.institution.as_ref(), other.institution.as_ref()),
            (self.degree.as_ref(), other.degree.as_ref()),
        ]);
        same_dated_entry(periods_overlap(self.period.as_ref(), other.period.as_ref()), votes)
    }

    fn absorb(&mut self, other: &Self) {
        fill(&mut self.degree, &other.degree);
        fill(&mut self.institution, &other.institution);
        fill(&mut self.location, &other.location);
        fill(&mut self.period, &other.period);
    }
}

impl Matchable for ListItem {
    fn same_entry(&self, other: &Self) -> bool {
        if !similar_names(&self.title, &other.title) {
            return false;
        }
        periods_overlap(self.period.as_ref(), other.period.as_ref()) != Some(false)
    }

    fn absorb(&mut self, other: &Self) {
        fill(&mut self.organization, &other.organization);
        fill(&mut self.period, &other.period);
    }
}

impl Matchable for LanguageEntry {
    fn same_entry(&self, other: &Self) -> bool {
        comparison_key(&self.language) == comparison_key(&other.language)
    }

    fn absorb(&mut self, other: &Self) {
        fill(&mut self.level, &other.level);
        fill(&mut self.cefr, &other.cefr);
    }
}

impl Matchable for String {
    fn same_entry(&self, other: &Self) -> bool {
        let key = comparison_key(self);
        !key.is_empty() && key == comparison_key(other)
    }

    fn absorb(&mut self, _other: &Self) {}
}
