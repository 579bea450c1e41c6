//! Vocabulary compiled for matching: folded word lists and regexes.

use regex::Regex;

use crate::error::ConfigError;
use crate::rules::Vocabulary;
use crate::text::{find_word, fold, FoldedText};

/// A word-list hit, in byte offsets of the searched text.
#[derive(Debug, Clone, PartialEq)]
pub struct WordHit<'v> {
    /// Canonical value the entry maps to (the entry itself for plain lists).
    pub value: &'v str,
    pub start: usize,
    pub end: usize,
}

/// A folded word list mapping entries to canonical values.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    /// (folded entry, canonical value), longest entries first.
    entries: Vec<(String, String)>,
}

impl WordList {
    fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut entries: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(entry, value)| (fold(entry.trim()), value))
            .filter(|(entry, _)| !entry.is_empty())
            .collect();
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then(a.0.cmp(&b.0)));
        entries.dedup_by(|a, b| a.0 == b.0);
        Self { entries }
    }

    fn plain(words: &[String]) -> Self {
        Self::new(words.iter().map(|w| (w.clone(), w.clone())))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `text` as a whole equals an entry.
    pub fn matches_exactly(&self, text: &str) -> bool {
        let key = fold(text.trim());
        self.entries.iter().any(|(entry, _)| *entry == key)
    }

    /// Whether any entry occurs as a word in `text`.
    pub fn contains_in(&self, text: &str) -> bool {
        let folded = fold(text);
        self.entries.iter().any(|(entry, _)| find_word(&folded, entry).is_some())
    }

    /// Non-overlapping hits in `text`, longest entries winning, in text order.
    pub fn find_all(&self, text: &str) -> Vec<WordHit<'_>> {
        let folded = FoldedText::new(text);
        let mut hits: Vec<WordHit<'_>> = Vec::new();
        for (entry, value) in &self.entries {
            let mut from = 0;
            while from < folded.folded.len() {
                let Some(pos) = find_word(&folded.folded[from..], entry) else {
                    break;
                };
                let fstart = from + pos;
                let fend = fstart + entry.len();
                let (start, end) = folded.source_range(fstart, fend);
                if hits.iter().all(|h| end <= h.start || start >= h.end) {
                    hits.push(WordHit {
                        value: value.as_str(),
                        start,
                        end,
                    });
                }
                from = fend;
            }
        }
        hits.sort_by_key(|h| h.start);
        hits
    }
}

/// Vocabulary ready for extraction.
#[derive(Debug, Clone)]
pub struct VocabIndex {
    pub degrees: WordList,
    pub institutions: WordList,
    pub job_connectors: WordList,
    pub job_titles: WordList,
    /// alias -> canonical language name.
    pub languages: WordList,
    /// level word -> CEFR level.
    pub levels: WordList,
    pub cities: WordList,
    pub location_labels: WordList,
    pub name_labels: WordList,
    pub name_stopwords: WordList,
    /// (zero-shot label, keywords)
    pub zero_shot: Vec<(String, WordList)>,
    org_suffix: Option<Regex>,
}

impl VocabIndex {
    pub fn new(vocab: &Vocabulary) -> Result<Self, ConfigError> {
        let org_suffix = if vocab.org_suffixes.is_empty() {
            None
        } else {
            let mut suffixes: Vec<&str> = vocab.org_suffixes.iter().map(String::as_str).collect();
            suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
            let alternation = suffixes
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|");
            // Case-sensitive: "SA" must not match "sa".
            let pattern = format!(r"(?:^|[\s,])(?:{})(?:$|[\s,;.)])", alternation);
            Some(Regex::new(&pattern).map_err(|e| ConfigError::Invalid(format!("org suffixes: {}", e)))?)
        };

        Ok(Self {
            degrees: WordList::plain(&vocab.degrees),
            institutions: WordList::plain(&vocab.institutions),
            job_connectors: WordList::plain(&vocab.job_connectors),
            job_titles: WordList::plain(&vocab.job_titles),
            languages: WordList::new(
                vocab
                    .languages
                    .iter()
                    .flat_map(|(canonical, aliases)| {
                        aliases
                            .iter()
                            .chain(std::iter::once(canonical))
                            .map(move |a| (a.clone(), canonical.clone()))
                    }),
            ),
            levels: WordList::new(
                vocab
                    .language_levels
                    .iter()
                    .flat_map(|(cefr, words)| words.iter().map(move |w| (w.clone(), cefr.clone()))),
            ),
            cities: WordList::plain(&vocab.cities),
            location_labels: WordList::plain(&vocab.location_labels),
            name_labels: WordList::plain(&vocab.name_labels),
            name_stopwords: WordList::plain(&vocab.name_stopwords),
            zero_shot: vocab
                .zero_shot_keywords
                .iter()
                .map(|(label, words)| (label.clone(), WordList::plain(words)))
                .collect(),
            org_suffix,
        })
    }

    /// Byte range of an organization name ending with a legal-form suffix,
    /// e.g. `Acme Conseil SARL`.
    pub fn find_organization(&self, text: &str) -> Option<(usize, usize)> {
        let regex = self.org_suffix.as_ref()?;
        let m = regex.find(text)?;
        let end = m.as_str().trim_end_matches([' ', ',', ';', '.', ')']).len() + m.start();

        let before = &text[..m.start()];
        let mut words: Vec<(usize, &str)> = Vec::new();
        let mut word_start = None;
        for (i, c) in before.char_indices() {
            if c.is_whitespace() || c == ',' {
                if let Some(s) = word_start.take() {
                    words.push((s, &before[s..i]));
                }
            } else if word_start.is_none() {
                word_start = Some(i);
            }
        }
        if let Some(s) = word_start {
            words.push((s, &before[s..]));
        }

        // Walk back over at most four capitalized words.
        let start = words
            .iter()
            .rev()
            .take(4)
            .take_while(|(_, w)| w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit()))
            .last()
            .map(|(s, _)| *s)?;
        Some((start, end))
    }

    /// CEFR level implied by a level word.
    pub fn level_of(&self, word: &str) -> Option<&str> {
        let key = fold(word.trim());
        self.levels
            .entries
            .iter()
            .find(|(entry, _)| *entry == key)
            .map(|(_, cefr)| cefr.as_str())
    }

    /// Canonical language for an alias.
    pub fn language_of(&self, word: &str) -> Option<&str> {
        let key = fold(word.trim());
        self.languages
            .entries
            .iter()
            .find(|(entry, _)| *entry == key)
            .map(|(_, canonical)| canonical.as_str())
    }
}
