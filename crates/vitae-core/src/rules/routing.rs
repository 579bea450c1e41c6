//! Language-based model routing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to use when a routed model cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Fail pipeline construction.
    #[default]
    None,
    /// Use the built-in heuristic model.
    Heuristic,
}

/// Routing for one task (NER or zero-shot).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRouting {
    /// Language code -> model id.
    pub languages: BTreeMap<String, String>,
    /// Model for languages without their own entry.
    pub default: Option<String>,
    pub fallback: Fallback,
}

impl TaskRouting {
    /// Model id for a language and whether it came from `default`.
    pub fn route(&self, language: &str) -> Option<(&str, bool)> {
        match self.languages.get(language) {
            Some(model) => Some((model.as_str(), false)),
            None => self.default.as_deref().map(|m| (m, true)),
        }
    }

    /// Every model id this task may use.
    pub fn model_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .languages
            .values()
            .map(String::as_str)
            .chain(self.default.as_deref())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn default_max_length() -> usize {
    512
}

/// Location and limits of one model directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Directory, relative to the configured model directory.
    pub path: PathBuf,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Output label names, overriding the model's `config.json`.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTable {
    pub ner: TaskRouting,
    pub zero_shot: TaskRouting,
    pub models: BTreeMap<String, ModelSpec>,
}

impl RoutingTable {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for id in self.ner.model_ids().into_iter().chain(self.zero_shot.model_ids()) {
            if !self.models.contains_key(id) {
                return Err(ConfigError::Invalid(format!(
                    "routing refers to unknown model '{}'",
                    id
                )));
            }
        }
        Ok(())
    }
}
