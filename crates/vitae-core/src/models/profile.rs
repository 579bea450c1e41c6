//! Structured candidate profile built from extraction results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::{DateRange, ExtractionMethod};
use super::document::SourceSpan;

/// Where a profile value came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source identifier: a document id, or `user` for manual edits.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ExtractionMethod>,
    pub extracted_at: DateTime<Utc>,
    #[serde(default)]
    pub user_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

/// A profile value with its confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileField<T> {
    pub value: T,
    pub confidence: f32,
    pub provenance: Provenance,
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default)]
    pub normalization_failed: bool,
}

impl<T> ProfileField<T> {
    pub fn new(value: T, confidence: f32, provenance: Provenance) -> Self {
        Self {
            value,
            confidence,
            provenance,
            low_confidence: false,
            normalization_failed: false,
        }
    }

    /// A value entered by the user; never overwritten by merges.
    pub fn user_edited(value: T, at: DateTime<Utc>) -> Self {
        Self::new(
            value,
            1.0,
            Provenance {
                source: "user".to_string(),
                method: None,
                extracted_at: at,
                user_edited: true,
                span: None,
            },
        )
    }

    pub fn is_user_edited(&self) -> bool {
        self.provenance.user_edited
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: Option<ProfileField<String>>,
    pub headline: Option<ProfileField<String>>,
    pub email: Option<ProfileField<String>>,
    pub phone: Option<ProfileField<String>>,
    pub location: Option<ProfileField<String>>,
    pub linkedin: Option<ProfileField<String>>,
    pub github: Option<ProfileField<String>>,
    pub website: Option<ProfileField<String>>,
}

/// Addressable scalar slots of [`PersonalInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalSlot {
    FullName,
    Headline,
    Email,
    Phone,
    Location,
    Linkedin,
    Github,
    Website,
}

impl PersonalSlot {
    pub const ALL: [PersonalSlot; 8] = [
        PersonalSlot::FullName,
        PersonalSlot::Headline,
        PersonalSlot::Email,
        PersonalSlot::Phone,
        PersonalSlot::Location,
        PersonalSlot::Linkedin,
        PersonalSlot::Github,
        PersonalSlot::Website,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalSlot::FullName => "full_name",
            PersonalSlot::Headline => "headline",
            PersonalSlot::Email => "email",
            PersonalSlot::Phone => "phone",
            PersonalSlot::Location => "location",
            PersonalSlot::Linkedin => "linkedin",
            PersonalSlot::Github => "github",
            PersonalSlot::Website => "website",
        }
    }
}

impl PersonalInfo {
    pub fn slot(&self, slot: PersonalSlot) -> &Option<ProfileField<String>> {
        match slot {
            PersonalSlot::FullName => &self.full_name,
            PersonalSlot::Headline => &self.headline,
            PersonalSlot::Email => &self.email,
            PersonalSlot::Phone => &self.phone,
            PersonalSlot::Location => &self.location,
            PersonalSlot::Linkedin => &self.linkedin,
            PersonalSlot::Github => &self.github,
            PersonalSlot::Website => &self.website,
        }
    }

    pub fn slot_mut(&mut self, slot: PersonalSlot) -> &mut Option<ProfileField<String>> {
        match slot {
            PersonalSlot::FullName => &mut self.full_name,
            PersonalSlot::Headline => &mut self.headline,
            PersonalSlot::Email => &mut self.email,
            PersonalSlot::Phone => &mut self.phone,
            PersonalSlot::Location => &mut self.location,
            PersonalSlot::Linkedin => &mut self.linkedin,
            PersonalSlot::Github => &mut self.github,
            PersonalSlot::Website => &mut self.website,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub period: Option<DateRange>,
    pub duration_months: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: Option<String>,
    pub institution: Option<String>,
    pub location: Option<String>,
    pub period: Option<DateRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cefr: Option<String>,
}

/// Entry of the simpler list sections (projects, certifications, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<DateRange>,
}

/// Structured profile. One snapshot per extraction; merges combine them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSnapshot {
    pub personal_info: PersonalInfo,
    pub experiences: Vec<ProfileField<ExperienceEntry>>,
    pub education: Vec<ProfileField<EducationEntry>>,
    pub skills: Vec<ProfileField<String>>,
    pub soft_skills: Vec<ProfileField<String>>,
    pub languages: Vec<ProfileField<LanguageEntry>>,
    pub projects: Vec<ProfileField<ListItem>>,
    pub certifications: Vec<ProfileField<ListItem>>,
    pub publications: Vec<ProfileField<ListItem>>,
    pub volunteering: Vec<ProfileField<ListItem>>,
    pub awards: Vec<ProfileField<ListItem>>,
    pub references: Vec<ProfileField<ListItem>>,
    pub interests: Vec<ProfileField<String>>,
}

/// Names of the [`ListItem`] collections, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemList {
    Projects,
    Certifications,
    Publications,
    Volunteering,
    Awards,
    References,
}

impl ItemList {
    pub const ALL: [ItemList; 6] = [
        ItemList::Projects,
        ItemList::Certifications,
        ItemList::Publications,
        ItemList::Volunteering,
        ItemList::Awards,
        ItemList::References,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemList::Projects => "projects",
            ItemList::Certifications => "certifications",
            ItemList::Publications => "publications",
            ItemList::Volunteering => "volunteering",
            ItemList::Awards => "awards",
            ItemList::References => "references",
        }
    }
}

impl ProfileSnapshot {
    pub fn items(&self, list: ItemList) -> &Vec<ProfileField<ListItem>> {
        match list {
            ItemList::Projects => &self.projects,
            ItemList::Certifications => &self.certifications,
            ItemList::Publications => &self.publications,
            ItemList::Volunteering => &self.volunteering,
            ItemList::Awards => &self.awards,
            ItemList::References => &self.references,
        }
    }

    pub fn items_mut(&mut self, list: ItemList) -> &mut Vec<ProfileField<ListItem>> {
        match list {
            ItemList::Projects => &mut self.projects,
            ItemList::Certifications => &mut self.certifications,
            ItemList::Publications => &mut self.publications,
            ItemList::Volunteering => &mut self.volunteering,
            ItemList::Awards => &mut self.awards,
            ItemList::References => &mut self.references,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ProfileSnapshot::default()
    }

    /// Provenance of the field at `path`: `personal_info.<slot>` or
    /// `<list>[<index>]`, e.g. `experiences[0]`.
    pub fn provenance_mut(&mut self, path: &str) -> Option<&mut Provenance> {
        if let Some(slot) = path.strip_prefix("personal_info.") {
            let slot = PersonalSlot::ALL.into_iter().find(|s| s.as_str() == slot)?;
            return self
                .personal_info
                .slot_mut(slot)
                .as_mut()
                .map(|f| &mut f.provenance);
        }

        let (list, rest) = path.split_once('[')?;
        let index: usize = rest.strip_suffix(']')?.parse().ok()?;
        fn at<T>(fields: &mut [ProfileField<T>], index: usize) -> Option<&mut Provenance> {
            fields.get_mut(index).map(|f| &mut f.provenance)
        }
        match list {
            "experiences" => at(&mut self.experiences, index),
            "education" => at(&mut self.education, index),
            "skills" => at(&mut self.skills, index),
            "soft_skills" => at(&mut self.soft_skills, index),
            "languages" => at(&mut self.languages, index),
            "interests" => at(&mut self.interests, index),
            other => {
                let list = ItemList::ALL.into_iter().find(|l| l.as_str() == other)?;
                at(self.items_mut(list), index)
            }
        }
    }

    /// Flag the field at `path` as edited by the user. Returns false when
    /// the path names no field.
    pub fn mark_user_edited(&mut self, path: &str) -> bool {
        match self.provenance_mut(path) {
            Some(provenance) => {
                provenance.user_edited = true;
                true
            }
            None => false,
        }
    }

    pub fn edit_personal(&mut self, slot: PersonalSlot, value: impl Into<String>, at: DateTime<Utc>) {
        *self.personal_info.slot_mut(slot) = Some(ProfileField::user_edited(value.into(), at));
    }

    /// Replace the entry at `index`, or append when `index` is past the end.
    pub fn edit_experience(&mut self, index: usize, entry: ExperienceEntry, at: DateTime<Utc>) {
        edit_entry(&mut self.experiences, index, entry, at);
    }

    pub fn edit_education(&mut self, index: usize, entry: EducationEntry, at: DateTime<Utc>) {
        edit_entry(&mut self.education, index, entry, at);
    }

    pub fn edit_language(&mut self, index: usize, entry: LanguageEntry, at: DateTime<Utc>) {
        edit_entry(&mut self.languages, index, entry, at);
    }

    pub fn edit_skill(&mut self, index: usize, skill: impl Into<String>, at: DateTime<Utc>) {
        edit_entry(&mut self.skills, index, skill.into(), at);
    }

    /// Share of key slots that hold a value: name, email, phone,
    /// experiences, education, skills and languages.
    pub fn completion_rate(&self) -> f32 {
        let filled = [
            self.personal_info.full_name.is_some(),
            self.personal_info.email.is_some(),
            self.personal_info.phone.is_some(),
            !self.experiences.is_empty(),
            !self.education.is_empty(),
            !self.skills.is_empty(),
            !self.languages.is_empty(),
        ];
        filled.iter().filter(|&&f| f).count() as f32 / filled.len() as f32
    }
}

fn edit_entry<T>(fields: &mut Vec<ProfileField<T>>, index: usize, value: T, at: DateTime<Utc>) {
    let field = ProfileField::user_edited(value, at);
    match fields.get_mut(index) {
        Some(slot) => *slot = field,
        None => fields.push(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let profile = ProfileSnapshot::default();
        assert!(profile.is_empty());
        assert_eq!(profile.completion_rate(), 0.0);
    }

    #[test]
    fn test_user_edited_field() {
        let field = ProfileField::user_edited("Jane Doe".to_string(), Utc::now());
        assert!(field.is_user_edited());
        assert_eq!(field.confidence, 1.0);
        assert_eq!(field.provenance.source, "user");
    }

    #[test]
    fn test_slot_access() {
        let mut info = PersonalInfo::default();
        *info.slot_mut(PersonalSlot::Email) =
            Some(ProfileField::user_edited("a@b.io".to_string(), Utc::now()));
        assert!(info.slot(PersonalSlot::Email).is_some());
        assert!(info.slot(PersonalSlot::Phone).is_none());
    }

    #[test]
    fn test_completion_rate_counts_key_slots() {
        let mut profile = ProfileSnapshot::default();
        profile.personal_info.email =
            Some(ProfileField::user_edited("a@b.io".to_string(), Utc::now()));
        profile
            .skills
            .push(ProfileField::user_edited("rust".to_string(), Utc::now()));
        assert!((profile.completion_rate() - 2.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_mark_user_edited_paths() {
        let now = Utc::now();
        let mut profile = ProfileSnapshot::default();
        let mut field = ProfileField::user_edited("a@b.io".to_string(), now);
        field.provenance.user_edited = false;
        profile.personal_info.email = Some(field);
        profile.edit_experience(5, ExperienceEntry::default(), now);
        profile.experiences[0].provenance.user_edited = false;

        assert!(profile.mark_user_edited("personal_info.email"));
        assert!(profile.personal_info.email.as_ref().unwrap().is_user_edited());
        assert!(profile.mark_user_edited("experiences[0]"));
        assert!(profile.experiences[0].is_user_edited());
        assert!(!profile.mark_user_edited("experiences[1]"));
        assert!(!profile.mark_user_edited("personal_info.phone"));
        assert!(!profile.mark_user_edited("hobbies[0]"));
        assert!(!profile.mark_user_edited("projects[x]"));
    }

    #[test]
    fn test_edit_replaces_or_appends() {
        let now = Utc::now();
        let mut profile = ProfileSnapshot::default();
        profile.edit_skill(0, "Rust", now);
        profile.edit_skill(0, "Go", now);
        profile.edit_skill(9, "Zig", now);
        let skills: Vec<&str> = profile.skills.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(skills, vec!["Go", "Zig"]);
        profile.edit_personal(PersonalSlot::FullName, "Jane Doe", now);
        assert!(profile.personal_info.full_name.unwrap().is_user_edited());
    }
}
