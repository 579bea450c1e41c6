//! Field candidates and their normalized values.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::document::SourceSpan;

/// Names of the fields the extractors can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    FullName,
    Email,
    Phone,
    Location,
    Linkedin,
    Github,
    Website,
    Headline,
    JobTitle,
    Company,
    Organization,
    Person,
    Date,
    DateRange,
    Duration,
    Degree,
    Institution,
    Skill,
    SoftSkill,
    Language,
    LanguageLevel,
    Interest,
    Item,
}

impl FieldName {
    pub const ALL: [FieldName; 23] = [
        FieldName::FullName,
        FieldName::Email,
        FieldName::Phone,
        FieldName::Location,
        FieldName::Linkedin,
        FieldName::Github,
        FieldName::Website,
        FieldName::Headline,
        FieldName::JobTitle,
        FieldName::Company,
        FieldName::Organization,
        FieldName::Person,
        FieldName::Date,
        FieldName::DateRange,
        FieldName::Duration,
        FieldName::Degree,
        FieldName::Institution,
        FieldName::Skill,
        FieldName::SoftSkill,
        FieldName::Language,
        FieldName::LanguageLevel,
        FieldName::Interest,
        FieldName::Item,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::FullName => "full_name",
            FieldName::Email => "email",
            FieldName::Phone => "phone",
            FieldName::Location => "location",
            FieldName::Linkedin => "linkedin",
            FieldName::Github => "github",
            FieldName::Website => "website",
            FieldName::Headline => "headline",
            FieldName::JobTitle => "job_title",
            FieldName::Company => "company",
            FieldName::Organization => "organization",
            FieldName::Person => "person",
            FieldName::Date => "date",
            FieldName::DateRange => "date_range",
            FieldName::Duration => "duration",
            FieldName::Degree => "degree",
            FieldName::Institution => "institution",
            FieldName::Skill => "skill",
            FieldName::SoftSkill => "soft_skill",
            FieldName::Language => "language",
            FieldName::LanguageLevel => "language_level",
            FieldName::Interest => "interest",
            FieldName::Item => "item",
        }
    }

    /// Generic entity labels that more specific fields override.
    pub fn is_generic(&self) -> bool {
        matches!(
            self,
            FieldName::Organization | FieldName::Person | FieldName::Date
        )
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

/// How a candidate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Rule,
    Ner,
    ZeroShot,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Rule => "rule",
            ExtractionMethod::Ner => "ner",
            ExtractionMethod::ZeroShot => "zero_shot",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar date known to year, month or day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u8>,
}

impl PartialDate {
    /// Build a date, rejecting impossible months and days.
    pub fn new(year: i32, month: Option<u8>, day: Option<u8>) -> Option<Self> {
        if !(1900..=2100).contains(&year) {
            return None;
        }
        match (month, day) {
            (None, Some(_)) => None,
            (Some(m), None) if !(1..=12).contains(&m) => None,
            (Some(m), Some(d)) => {
                NaiveDate::from_ymd_opt(year, u32::from(m), u32::from(d))?;
                Some(Self { year, month, day })
            }
            _ => Some(Self { year, month, day }),
        }
    }

    pub fn year(year: i32) -> Option<Self> {
        Self::new(year, None, None)
    }

    pub fn year_month(year: i32, month: u8) -> Option<Self> {
        Self::new(year, Some(month), None)
    }

    /// 1 for a year, 2 with a month, 3 with a day.
    pub fn precision(&self) -> u8 {
        1 + u8::from(self.month.is_some()) + u8::from(self.day.is_some())
    }

    /// Earliest day this date can denote.
    pub fn first_day(&self) -> (i32, u8, u8) {
        (self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    /// Latest day this date can denote.
    pub fn last_day(&self) -> (i32, u8, u8) {
        (self.year, self.month.unwrap_or(12), self.day.unwrap_or(31))
    }

    /// Months since year 0, taking the first month for year-only dates.
    pub fn month_index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month.unwrap_or(1)) - 1
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(m), Some(d)) => write!(f, "{:04}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => write!(f, "{:04}-{:02}", self.year, m),
            _ => write!(f, "{:04}", self.year),
        }
    }
}

/// End of a date range: a date, or open ("present").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeEnd {
    Open,
    Closed(PartialDate),
}

/// Start date plus an end date or an open end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: PartialDate,
    pub end: RangeEnd,
}

impl DateRange {
    pub fn new(start: PartialDate, end: RangeEnd) -> Self {
        Self { start, end }
    }

    /// Single-date range, used when only one date is known.
    pub fn point(date: PartialDate) -> Self {
        Self {
            start: date,
            end: RangeEnd::Closed(date),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.end, RangeEnd::Open)
    }

    /// Whether the two ranges share at least one day. Open ends extend
    /// indefinitely.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        let end_of = |r: &DateRange| match r.end {
            RangeEnd::Open => (i32::MAX, 12, 31),
            RangeEnd::Closed(d) => d.last_day(),
        };
        self.start.first_day() <= end_of(other) && other.start.first_day() <= end_of(self)
    }

    /// Combined date precision; an open end counts as fully specified.
    pub fn precision(&self) -> u8 {
        let end = match self.end {
            RangeEnd::Open => 3,
            RangeEnd::Closed(d) => d.precision(),
        };
        self.start.precision() + end
    }

    /// Length in whole months when both ends are closed.
    pub fn months(&self) -> Option<u32> {
        match self.end {
            RangeEnd::Open => None,
            RangeEnd::Closed(end) => {
                let diff = end.month_index() - self.start.month_index();
                u32::try_from(diff).ok()
            }
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            RangeEnd::Open => write!(f, "{}/present", self.start),
            RangeEnd::Closed(end) => write!(f, "{}/{}", self.start, end),
        }
    }
}

/// Kind of a normalized value, used to rank competing candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Range,
    Date,
    Duration,
    Level,
    Text,
}

/// Canonical value after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NormalizedValue {
    Text(String),
    Keyword(String),
    Email(String),
    Phone(String),
    Url(String),
    Date(PartialDate),
    Range(DateRange),
    Duration { months: u32 },
    Level { cefr: Option<String>, label: String },
}

impl NormalizedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            NormalizedValue::Range(_) => ValueKind::Range,
            NormalizedValue::Date(_) => ValueKind::Date,
            NormalizedValue::Duration { .. } => ValueKind::Duration,
            NormalizedValue::Level { .. } => ValueKind::Level,
            _ => ValueKind::Text,
        }
    }

    /// Human-readable canonical form.
    pub fn display_text(&self) -> String {
        match self {
            NormalizedValue::Text(s)
            | NormalizedValue::Keyword(s)
            | NormalizedValue::Email(s)
            | NormalizedValue::Phone(s)
            | NormalizedValue::Url(s) => s.clone(),
            NormalizedValue::Date(d) => d.to_string(),
            NormalizedValue::Range(r) => r.to_string(),
            NormalizedValue::Duration { months } => format!("{} months", months),
            NormalizedValue::Level { cefr: Some(c), .. } => c.clone(),
            NormalizedValue::Level { cefr: None, label } => label.clone(),
        }
    }
}

/// Coarse confidence bucket for display and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

/// Clamp a score into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

/// One proposed value for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCandidate {
    pub field: FieldName,
    pub raw_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<NormalizedValue>,
    pub confidence: f32,
    pub method: ExtractionMethod,
    /// Extractor that produced the candidate, e.g. `rule:email`.
    pub extractor: String,
    /// Byte span in the normalized document text.
    pub span: SourceSpan,
    /// Index of the block the candidate came from.
    pub block: usize,
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default)]
    pub normalization_failed: bool,
}

impl FieldCandidate {
    pub fn new(
        field: FieldName,
        raw_value: impl Into<String>,
        confidence: f32,
        method: ExtractionMethod,
        span: SourceSpan,
    ) -> Self {
        Self {
            field,
            raw_value: raw_value.into(),
            normalized: None,
            confidence: clamp_confidence(confidence),
            method,
            extractor: method.as_str().to_string(),
            span,
            block: 0,
            low_confidence: false,
            normalization_failed: false,
        }
    }

    pub fn with_extractor(mut self, extractor: impl Into<String>) -> Self {
        self.extractor = extractor.into();
        self
    }

    pub fn with_block(mut self, block: usize) -> Self {
        self.block = block;
        self
    }

    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    /// Canonical text if normalized, else the trimmed raw value.
    pub fn value_text(&self) -> String {
        match &self.normalized {
            Some(value) => value.display_text(),
            None => self.raw_value.trim().to_string(),
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        self.normalized
            .as_ref()
            .map(NormalizedValue::kind)
            .unwrap_or(ValueKind::Text)
    }
}

/// Compare confidences, higher first, treating them as totally ordered.
pub fn by_confidence_desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
