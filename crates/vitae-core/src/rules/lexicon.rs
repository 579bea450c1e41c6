//! Word lists: section heading aliases, date vocabulary and domain vocabulary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::SectionKind;
use crate::text::fold;

/// Heading aliases per section kind and language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionLexicon(BTreeMap<SectionKind, BTreeMap<String, Vec<String>>>);

impl SectionLexicon {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|langs| langs.values().all(Vec::is_empty))
    }

    /// All aliases of a kind, across languages.
    pub fn aliases(&self, kind: SectionKind) -> impl Iterator<Item = &str> {
        self.0
            .get(&kind)
            .into_iter()
            .flat_map(|langs| langs.values().flatten().map(String::as_str))
    }

    /// Every `(kind, language, alias)` triple.
    pub fn entries(&self) -> impl Iterator<Item = (SectionKind, &str, &str)> {
        self.0.iter().flat_map(|(kind, langs)| {
            langs.iter().flat_map(move |(lang, aliases)| {
                aliases.iter().map(move |a| (*kind, lang.as_str(), a.as_str()))
            })
        })
    }

    /// Languages that have at least one alias.
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self
            .0
            .values()
            .flat_map(|l| l.keys().cloned())
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DurationUnits {
    pub years: Vec<String>,
    pub months: Vec<String>,
}

/// Month names, "present" tokens and range punctuation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DateVocabulary {
    /// language -> month word -> month number.
    pub months: BTreeMap<String, BTreeMap<String, u8>>,
    /// language -> tokens meaning "until now".
    pub present: BTreeMap<String, Vec<String>>,
    /// Words opening an open-ended range ("since 2020").
    pub since: Vec<String>,
    /// Words opening a closed range ("from 2019 to 2021").
    pub range_prefixes: Vec<String>,
    pub separators: Vec<String>,
    pub duration_units: DurationUnits,
}

impl DateVocabulary {
    /// Month number for a word in any language, ignoring case, accents and a
    /// trailing dot.
    pub fn month(&self, word: &str) -> Option<u8> {
        let key = fold(word.trim().trim_end_matches('.'));
        self.months
            .values()
            .find_map(|names| names.iter().find(|(name, _)| fold(name) == key))
            .map(|(_, &m)| m)
    }

    pub fn month_words(&self) -> Vec<&str> {
        let mut words: Vec<&str> = self
            .months
            .values()
            .flat_map(|names| names.keys().map(String::as_str))
            .collect();
        words.sort();
        words.dedup();
        words
    }

    pub fn present_tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.present.values().flatten().map(String::as_str).collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }

    pub fn is_present(&self, token: &str) -> bool {
        let key = fold(token.trim());
        self.present.values().flatten().any(|t| fold(t) == key)
    }
}

/// Domain vocabulary used by rules and heuristic models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub degrees: Vec<String>,
    pub institutions: Vec<String>,
    pub org_suffixes: Vec<String>,
    pub job_connectors: Vec<String>,
    pub job_titles: Vec<String>,
    /// canonical language -> aliases in several languages.
    pub languages: BTreeMap<String, Vec<String>>,
    /// CEFR level -> words implying it.
    pub language_levels: BTreeMap<String, Vec<String>>,
    pub cities: Vec<String>,
    pub location_labels: Vec<String>,
    pub name_labels: Vec<String>,
    pub name_stopwords: Vec<String>,
    /// zero-shot label -> keywords for the heuristic classifier.
    pub zero_shot_keywords: BTreeMap<String, Vec<String>>,
}
