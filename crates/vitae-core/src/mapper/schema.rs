//! Required sub-fields of mapped entries.

use crate::error::SchemaValidationError;
use crate::models::{EducationEntry, ExperienceEntry, LanguageEntry, ListItem};

/// Entry types with required sub-fields.
pub trait SchemaGuard {
    /// Why the entry is unusable, if it is.
    fn violation(&self) -> Option<&'static str>;
}

impl SchemaGuard for ExperienceEntry {
    fn violation(&self) -> Option<&'static str> {
        (is_blank(&self.title) && is_blank(&self.company)).then_some("experience has neither title nor company")
    }
}

impl SchemaGuard for EducationEntry {
    fn violation(&self) -> Option<&'static str> {
        (is_blank(&self.degree) && is_blank(&self.institution))
            .then_some("education has neither degree nor institution")
    }
}

impl SchemaGuard for LanguageEntry {
    fn violation(&self) -> Option<&'static str> {
        self.language.trim().is_empty().then_some("language name is empty")
    }
}

impl SchemaGuard for ListItem {
    fn violation(&self) -> Option<&'static str> {
        self.title.trim().is_empty().then_some("item has no title")
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Check one entry; `path` names it in the error, e.g. `experiences[1]`.
pub fn schema_guard<T: SchemaGuard>(entry: &T, path: &str) -> Result<(), SchemaValidationError> {
    match entry.violation() {
        None => Ok(()),
        Some(reason) => Err(SchemaValidationError {
            path: path.to_string(),
            reason: reason.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_entries_pass() {
        let entry = ExperienceEntry {
            company: Some("Acme".into()),
            ..Default::default()
        };
        assert!(schema_guard(&entry, "experiences[0]").is_ok());
    }

    #[test]
    fn test_empty_required_fields_rejected() {
        let entry = ExperienceEntry {
            title: Some("  ".into()),
            description: Some("Maintenance".into()),
            ..Default::default()
        };
        let err = schema_guard(&entry, "experiences[2]").unwrap_err();
        assert_eq!(err.path, "experiences[2]");
        assert!(schema_guard(&EducationEntry::default(), "education[0]").is_err());
        assert!(schema_guard(&ListItem::default(), "projects[0]").is_err());
        assert!(schema_guard(&LanguageEntry::default(), "languages[0]").is_err());
    }
}
