//! Lightweight language detection for résumé text.
//!
//! Scores fr/en/de/es/it by keyword frequency and characteristic letters.
//! Keyword share weighs 0.6 and letter share 0.4; a text without any
//! characteristic letter is scored on keywords alone.

use std::collections::BTreeMap;

use crate::text::fold;

/// Texts shorter than this are not classified.
const MIN_CHARS: usize = 20;

struct LanguageProfile {
    code: &'static str,
    keywords: &'static [&'static str],
    letters: &'static [char],
}

const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "fr",
        keywords: &[
            "le", "la", "les", "des", "du", "de", "et", "en", "au", "aux", "pour", "par", "sur",
            "dans", "avec", "chez", "depuis", "ans", "mois", "experience", "experiences",
            "professionnelle", "formation", "competences", "langues", "centres", "interets",
            "stage", "poste", "gestion", "projet", "ingenieur", "developpeur", "aujourd",
        ],
        letters: &['é', 'è', 'ê', 'à', 'ç', 'ù', 'œ', 'ë', 'î', 'ô'],
    },
    LanguageProfile {
        code: "en",
        keywords: &[
            "the", "and", "of", "with", "for", "from", "at", "in", "to", "present", "years",
            "months", "experience", "work", "education", "skills", "languages", "interests",
            "projects", "university", "developer", "engineer", "manager", "summary", "since",
            "current", "responsible",
        ],
        letters: &[],
    },
    LanguageProfile {
        code: "de",
        keywords: &[
            "und", "der", "die", "das", "mit", "fur", "bei", "von", "seit", "jahre", "monate",
            "berufserfahrung", "ausbildung", "kenntnisse", "sprachen", "studium", "hochschule",
            "entwickler", "heute", "aktuell", "praktikum", "verantwortlich",
        ],
        letters: &['ä', 'ö', 'ü', 'ß'],
    },
    LanguageProfile {
        code: "es",
        keywords: &[
            "el", "los", "las", "y", "del", "con", "para", "desde", "hasta", "anos", "meses",
            "experiencia", "laboral", "formacion", "habilidades", "idiomas", "estudios",
            "universidad", "desarrollador", "actualidad", "actual", "empresa",
        ],
        letters: &['ñ', 'á', 'í', 'ó', 'ú', '¿', '¡'],
    },
    LanguageProfile {
        code: "it",
        keywords: &[
            "il", "gli", "della", "delle", "degli", "con", "per", "presso", "anni", "mesi",
            "esperienza", "esperienze", "lavorativa", "formazione", "competenze", "lingue",
            "istruzione", "universita", "sviluppatore", "oggi", "attuale", "azienda",
        ],
        letters: &['ì', 'ò', 'à', 'è', 'ù'],
    },
];

/// Supported language codes.
pub fn supported_languages() -> Vec<&'static str> {
    PROFILES.iter().map(|p| p.code).collect()
}

/// Detected language with its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub code: &'static str,
    pub confidence: f32,
}

/// Keyword and letter based language detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    /// Best-scoring language, or `None` when the text is too short or has
    /// no signal at all.
    pub fn detect(&self, text: &str) -> Option<Detection> {
        let letters_total = text.chars().filter(|c| c.is_alphabetic()).count();
        if letters_total < MIN_CHARS {
            return None;
        }

        let mut word_counts: BTreeMap<String, usize> = BTreeMap::new();
        for word in fold(text).split(|c: char| !c.is_alphanumeric()) {
            if !word.is_empty() {
                *word_counts.entry(word.to_string()).or_default() += 1;
            }
        }
        let lower = text.to_lowercase();

        let keyword_hits: Vec<usize> = PROFILES
            .iter()
            .map(|p| p.keywords.iter().map(|k| word_counts.get(*k).copied().unwrap_or(0)).sum())
            .collect();
        let letter_hits: Vec<usize> = PROFILES
            .iter()
            .map(|p| lower.chars().filter(|c| p.letters.contains(c)).count())
            .collect();

        let keyword_total: usize = keyword_hits.iter().sum();
        let letter_total: usize = letter_hits.iter().sum();
        if keyword_total == 0 && letter_total == 0 {
            return None;
        }

        let share = |hits: usize, total: usize| {
            if total == 0 { 0.0 } else { hits as f32 / total as f32 }
        };

        PROFILES
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let keywords = share(keyword_hits[i], keyword_total);
                let confidence = if letter_total == 0 {
                    keywords
                } else if keyword_total == 0 {
                    share(letter_hits[i], letter_total)
                } else {
                    keywords * 0.6 + share(letter_hits[i], letter_total) * 0.4
                };
                Detection {
                    code: p.code,
                    confidence: confidence.clamp(0.0, 1.0),
                }
            })
            // Earlier profiles win ties.
            .fold(None, |best: Option<Detection>, d| match best {
                Some(b) if b.confidence >= d.confidence => Some(b),
                _ => Some(d),
            })
    }
}
