//! Merge decisions recorded by the conflict resolver.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    KeptExisting,
    Replaced,
    FlaggedForReview,
    Added,
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictDecision::KeptExisting => "kept_existing",
            ConflictDecision::Replaced => "replaced",
            ConflictDecision::FlaggedForReview => "flagged_for_review",
            ConflictDecision::Added => "added",
        })
    }
}

/// The rule of the decision procedure that settled a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    UserEdited,
    HigherConfidence,
    LowerConfidence,
    MoreSpecific,
    LessSpecific,
    MoreRecent,
    NotMoreRecent,
    NoExistingValue,
    NewEntry,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictReason::UserEdited => "user_edited",
            ConflictReason::HigherConfidence => "higher_confidence",
            ConflictReason::LowerConfidence => "lower_confidence",
            ConflictReason::MoreSpecific => "more_specific",
            ConflictReason::LessSpecific => "less_specific",
            ConflictReason::MoreRecent => "more_recent",
            ConflictReason::NotMoreRecent => "not_more_recent",
            ConflictReason::NoExistingValue => "no_existing_value",
            ConflictReason::NewEntry => "new_entry",
        })
    }
}

/// One decision taken while merging a snapshot into a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Path of the field, e.g. `personal_info.email` or `experiences[2]`.
    pub path: String,
    pub incoming: serde_json::Value,
    #[serde(default)]
    pub existing: Option<serde_json::Value>,
    pub decision: ConflictDecision,
    pub reason: ConflictReason,
}

impl ConflictRecord {
    pub fn needs_review(&self) -> bool {
        self.decision == ConflictDecision::FlaggedForReview
    }
}
