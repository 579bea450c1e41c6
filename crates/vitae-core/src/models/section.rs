//! Labelled sections of a résumé.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::candidate::FieldCandidate;
use super::document::SourceSpan;

/// Closed set of section labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PersonalInfo,
    Experiences,
    Education,
    Skills,
    SoftSkills,
    Languages,
    Projects,
    Certifications,
    Publications,
    Volunteering,
    Interests,
    Awards,
    References,
    Unclassified,
}

impl SectionKind {
    pub const ALL: [SectionKind; 14] = [
        SectionKind::PersonalInfo,
        SectionKind::Experiences,
        SectionKind::Education,
        SectionKind::Skills,
        SectionKind::SoftSkills,
        SectionKind::Languages,
        SectionKind::Projects,
        SectionKind::Certifications,
        SectionKind::Publications,
        SectionKind::Volunteering,
        SectionKind::Interests,
        SectionKind::Awards,
        SectionKind::References,
        SectionKind::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::PersonalInfo => "personal_info",
            SectionKind::Experiences => "experiences",
            SectionKind::Education => "education",
            SectionKind::Skills => "skills",
            SectionKind::SoftSkills => "soft_skills",
            SectionKind::Languages => "languages",
            SectionKind::Projects => "projects",
            SectionKind::Certifications => "certifications",
            SectionKind::Publications => "publications",
            SectionKind::Volunteering => "volunteering",
            SectionKind::Interests => "interests",
            SectionKind::Awards => "awards",
            SectionKind::References => "references",
            SectionKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown section kind '{}'", s))
    }
}

/// A contiguous region of the normalized text with one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    /// Heading line that opened the section, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub span: SourceSpan,
    pub text: String,
    /// Confidence in the label itself.
    pub label_confidence: f32,
    /// Indices of the blocks covered by this section.
    pub blocks: Range<usize>,
    #[serde(default)]
    pub candidates: Vec<FieldCandidate>,
}

impl Section {
    /// Blocks of the section, excluding the heading line.
    pub fn body_blocks(&self) -> Range<usize> {
        if self.heading.is_some() && !self.blocks.is_empty() {
            self.blocks.start + 1..self.blocks.end
        } else {
            self.blocks.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in SectionKind::ALL {
            assert_eq!(kind.as_str().parse::<SectionKind>(), Ok(kind));
        }
        assert!("hobbies".parse::<SectionKind>().is_err());
    }

    #[test]
    fn test_body_blocks_skip_heading() {
        let section = Section {
            kind: SectionKind::Skills,
            heading: Some("Skills".into()),
            span: SourceSpan::new(0, 20),
            text: "Skills\nRust, Python\n".into(),
            label_confidence: 0.9,
            blocks: 3..5,
            candidates: Vec::new(),
        };
        assert_eq!(section.body_blocks(), 4..5);
    }
}
