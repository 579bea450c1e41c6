//! Declarative rule tables.
//!
//! Every table ships as a JSON file under `rules/` and is compiled into the
//! binary. A rules directory can override any file by providing one with the
//! same name; files it does not provide keep their built-in content.

pub mod chains;
pub mod lexicon;
pub mod precedence;
pub mod routing;

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ConfigError;

pub use chains::{ChainStep, ChainTable, NerStep, OverlapPolicy, PatternRule, ZeroShotStep};
pub use lexicon::{DateVocabulary, SectionLexicon, Vocabulary};
pub use precedence::{RulePrecedence, Thresholds};
pub use routing::{Fallback, ModelSpec, RoutingTable, TaskRouting};

const SECTIONS: &str = include_str!("../../rules/sections.json");
const DATES: &str = include_str!("../../rules/dates.json");
const VOCAB: &str = include_str!("../../rules/vocab.json");
const CHAINS: &str = include_str!("../../rules/chains.json");
const PRECEDENCE: &str = include_str!("../../rules/precedence.json");
const THRESHOLDS: &str = include_str!("../../rules/thresholds.json");
const ROUTING: &str = include_str!("../../rules/routing.json");

/// All rule tables used by one pipeline.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub sections: SectionLexicon,
    pub dates: DateVocabulary,
    pub vocab: Vocabulary,
    pub chains: ChainTable,
    pub precedence: RulePrecedence,
    pub thresholds: Thresholds,
    pub routing: RoutingTable,
}

impl RuleSet {
    /// The rule tables compiled into the library.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::assemble(|_| Ok(None))
    }

    /// Built-in tables, overridden file by file from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        info!("Loading rule overrides from {}", dir.display());
        Self::assemble(|name| {
            let path = dir.join(name);
            if !path.exists() {
                return Ok(None);
            }
            debug!("Overriding {} from {}", name, path.display());
            std::fs::read_to_string(&path)
                .map(Some)
                .map_err(|source| ConfigError::Read { path, source })
        })
    }

    fn assemble<F>(mut source: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Result<Option<String>, ConfigError>,
    {
        let mut table = |name: &str, builtin: &str| -> Result<String, ConfigError> {
            Ok(source(name)?.unwrap_or_else(|| builtin.to_string()))
        };

        let rules = Self {
            sections: parse("sections.json", &table("sections.json", SECTIONS)?)?,
            dates: parse("dates.json", &table("dates.json", DATES)?)?,
            vocab: parse("vocab.json", &table("vocab.json", VOCAB)?)?,
            chains: parse("chains.json", &table("chains.json", CHAINS)?)?,
            precedence: parse("precedence.json", &table("precedence.json", PRECEDENCE)?)?,
            thresholds: parse("thresholds.json", &table("thresholds.json", THRESHOLDS)?)?,
            routing: parse("routing.json", &table("routing.json", ROUTING)?)?,
        };
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.routing.validate()?;
        if self.sections.is_empty() {
            return Err(ConfigError::Invalid(
                "sections.json defines no heading aliases".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(name: &str, content: &str) -> Result<T, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::Parse {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMethod, FieldName, SectionKind};
    use tempfile::TempDir;

    #[test]
    fn test_builtin_rules_parse() {
        let rules = RuleSet::builtin().unwrap();
        assert!(rules.sections.aliases(SectionKind::Experiences).count() > 10);
        assert_eq!(rules.dates.month("janvier"), Some(1));
        assert_eq!(rules.dates.month("Févr"), Some(2));
        assert!(rules.chains.steps(SectionKind::Skills).len() >= 2);
        assert_eq!(rules.thresholds.hard_floor, 0.05);
        assert_eq!(
            rules.precedence.methods,
            vec![ExtractionMethod::Rule, ExtractionMethod::Ner, ExtractionMethod::ZeroShot]
        );
        assert_eq!(rules.routing.ner.fallback, Fallback::Heuristic);
    }

    #[test]
    fn test_every_section_kind_has_a_chain() {
        let rules = RuleSet::builtin().unwrap();
        for kind in SectionKind::ALL {
            assert!(
                !rules.chains.steps(kind).is_empty(),
                "missing chain for {}",
                kind
            );
        }
    }

    #[test]
    fn test_override_single_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("thresholds.json"),
            r#"{"hard_floor": 0.1, "default": 0.6, "fields": {"email": 0.9}}"#,
        )
        .unwrap();

        let rules = RuleSet::load_dir(dir.path()).unwrap();
        assert_eq!(rules.thresholds.hard_floor, 0.1);
        assert_eq!(rules.thresholds.for_field(FieldName::Email), 0.9);
        assert_eq!(rules.thresholds.for_field(FieldName::Skill), 0.6);
        // untouched files keep built-in content
        assert_eq!(rules.dates.month("march"), Some(3));
    }

    #[test]
    fn test_malformed_override_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("chains.json"), "{ not json").unwrap();
        let err = RuleSet::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref name, .. } if name == "chains.json"));
    }
}
