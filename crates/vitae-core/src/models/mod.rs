//! Data models for vitae.

pub mod candidate;
pub mod config;
pub mod conflict;
pub mod document;
pub mod profile;
pub mod result;
pub mod section;

pub use candidate::{
    ConfidenceLevel, DateRange, ExtractionMethod, FieldCandidate, FieldName, NormalizedValue,
    PartialDate, RangeEnd, ValueKind,
};
pub use config::VitaeConfig;
pub use conflict::{ConflictDecision, ConflictReason, ConflictRecord};
pub use document::{Document, DocumentFormat, LayoutHint, SourceSpan, TextBlock};
pub use profile::{
    EducationEntry, ExperienceEntry, ItemList, LanguageEntry, ListItem, PersonalInfo,
    PersonalSlot, ProfileField, ProfileSnapshot, Provenance,
};
pub use result::{
    AiMode, ConfidenceStats, ExtractionMetadata, ExtractionMetrics, ExtractionResult,
    LanguageGuess,
};
pub use section::{Section, SectionKind};
