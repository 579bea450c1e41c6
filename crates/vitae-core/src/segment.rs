//! Section segmentation of normalized résumé text.
//!
//! Headings are short lines matching the section lexicon, exactly or
//! fuzzily, scored by typography and position. Sections always partition the
//! text: each one runs from its heading to the next accepted heading.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::extract::patterns::{EMAIL, NAME_LINE, PHONE_FR, PHONE_INTL, PHONE_US};
use crate::models::config::SegmenterConfig;
use crate::models::{Section, SectionKind, SourceSpan, TextBlock};
use crate::rules::SectionLexicon;
use crate::text::{fold, similarity, uppercase_ratio};

lazy_static! {
    static ref NUMBERING: Regex = Regex::new(
        r"^\s*(?:(?:\d{1,2}|[IVXivx]{1,4}|[A-Ha-h])[.)]|\d{1,2}\s*[-–])\s+"
    ).unwrap();

    static ref BULLET: Regex = Regex::new(r"^\s*[-–—•·▪■●◆>*#]+\s*").unwrap();
}

/// Label confidence of a prelude that looks like contact details.
const PRELUDE_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Clone)]
struct Alias {
    kind: SectionKind,
    language: String,
    key: String,
}

/// A line recognized as a possible heading.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingMatch {
    pub kind: SectionKind,
    pub fuzzy: bool,
    pub numbered: bool,
    pub colon: bool,
}

/// Lowercase, accent-free, punctuation-free form of a heading or alias.
pub fn heading_key(text: &str) -> String {
    let folded = fold(text);
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits normalized text into labeled sections.
pub struct Segmenter {
    config: SegmenterConfig,
    min_label_confidence: f32,
    aliases: Vec<Alias>,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig, lexicon: &SectionLexicon, min_label_confidence: f32) -> Self {
        let aliases = lexicon
            .entries()
            .map(|(kind, language, alias)| Alias {
                kind,
                language: language.to_string(),
                key: heading_key(alias),
            })
            .filter(|a| !a.key.is_empty())
            .collect();

        Self {
            config,
            min_label_confidence,
            aliases,
        }
    }

    /// Match a line against the lexicon; aliases of `language` come first.
    pub fn match_heading(&self, line: &str, language: &str) -> Option<HeadingMatch> {
        if line.chars().count() >= self.config.max_heading_chars {
            return None;
        }

        let numbered = NUMBERING.is_match(line);
        let stripped = NUMBERING.replace(line, "");
        let stripped = BULLET.replace(&stripped, "");
        let trimmed = stripped.trim();
        let colon = trimmed.ends_with(':');
        let key = heading_key(trimmed);
        if key.is_empty() || key.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }

        let ordered = self
            .aliases
            .iter()
            .filter(|a| a.language == language)
            .chain(self.aliases.iter().filter(|a| a.language != language));

        let mut best_fuzzy: Option<(SectionKind, f32)> = None;
        for alias in ordered {
            if alias.key == key {
                return Some(HeadingMatch {
                    kind: alias.kind,
                    fuzzy: false,
                    numbered,
                    colon,
                });
            }
            if key.len() >= 4 {
                let score = similarity(&alias.key, &key);
                if score >= self.config.fuzzy_threshold
                    && best_fuzzy.is_none_or(|(_, best)| score > best)
                {
                    best_fuzzy = Some((alias.kind, score));
                }
            }
        }

        best_fuzzy.map(|(kind, _)| HeadingMatch {
            kind,
            fuzzy: true,
            numbered,
            colon,
        })
    }

    fn score(&self, m: &HeadingMatch, block: &TextBlock, body_follows: bool, position: f32) -> f32 {
        let text = block.text.trim();
        let mut score: f32 = if m.fuzzy { 0.35 } else { 0.5 };

        if uppercase_ratio(text) >= 0.8 {
            score += 0.2;
        }
        if m.colon {
            score += 0.1;
        }
        if m.numbered {
            score += 0.1;
        }
        if block.hint.heading_style {
            score += 0.1;
        }
        if body_follows {
            score += 0.1;
        }
        if (3..=50).contains(&text.chars().count()) {
            score += 0.1;
        }
        if positional_fit(m.kind, position) {
            score += 0.1;
        }
        score.min(1.0)
    }

    /// Accepted heading block indices with their kind and confidence.
    fn headings(&self, text: &str, blocks: &[TextBlock], language: &str) -> Vec<(usize, SectionKind, f32)> {
        let matches: Vec<Option<HeadingMatch>> = blocks
            .iter()
            .map(|b| self.match_heading(&b.text, language))
            .collect();
        let total = text.len().max(1) as f32;

        let mut accepted: Vec<(usize, SectionKind, f32)> = Vec::new();
        for (idx, m) in matches.iter().enumerate() {
            let Some(m) = m else {
                continue;
            };
            // A heading must be followed by something.
            if idx + 1 >= blocks.len() {
                continue;
            }

            let body_follows = idx + 2 < blocks.len()
                && matches[idx + 1].is_none()
                && matches[idx + 2].is_none();
            let position = blocks[idx].span.start as f32 / total;
            let score = self.score(m, &blocks[idx], body_follows, position);
            trace!("Heading candidate '{}' -> {} ({:.2})", blocks[idx].text, m.kind, score);

            if score < self.min_label_confidence {
                continue;
            }

            // Adjacent headings: only the later one opens a section.
            if accepted.last().is_some_and(|(prev, _, _)| prev + 1 == idx) {
                accepted.pop();
            }
            accepted.push((idx, m.kind, score));
        }
        accepted
    }

    /// Partition the text into sections.
    pub fn segment(&self, text: &str, blocks: &[TextBlock], language: &str) -> Vec<Section> {
        if blocks.is_empty() || text.is_empty() {
            return Vec::new();
        }

        let headings = self.headings(text, blocks, language);
        let mut sections = Vec::with_capacity(headings.len() + 1);

        let first_heading = headings.first().map(|(idx, _, _)| *idx).unwrap_or(blocks.len());
        if first_heading > 0 {
            let (kind, confidence) = prelude_label(&blocks[..first_heading]);
            sections.push((0..first_heading, kind, confidence, None));
        }
        for (i, (idx, kind, confidence)) in headings.iter().enumerate() {
            let end = headings.get(i + 1).map(|(next, _, _)| *next).unwrap_or(blocks.len());
            sections.push((*idx..end, *kind, *confidence, Some(blocks[*idx].text.clone())));
        }

        let count = sections.len();
        let starts: Vec<usize> = sections
            .iter()
            .enumerate()
            .map(|(i, (range, ..))| if i == 0 { 0 } else { blocks[range.start].span.start })
            .collect();

        let out: Vec<Section> = sections
            .into_iter()
            .enumerate()
            .map(|(i, (range, kind, label_confidence, heading))| {
                let end = if i + 1 < count { starts[i + 1] } else { text.len() };
                let span = SourceSpan::new(starts[i], end);
                Section {
                    kind,
                    heading,
                    span,
                    text: text[span.start..span.end].to_string(),
                    label_confidence,
                    blocks: range,
                    candidates: Vec::new(),
                }
            })
            .collect();

        debug!(
            "Segmented into {} sections: {}",
            out.len(),
            out.iter().map(|s| s.kind.as_str()).collect::<Vec<_>>().join(", ")
        );
        out
    }
}

/// Where in the document a kind of section usually sits.
fn positional_fit(kind: SectionKind, position: f32) -> bool {
    match kind {
        SectionKind::PersonalInfo => position < 0.3,
        SectionKind::Experiences => (0.2..=0.8).contains(&position),
        SectionKind::Education => (0.3..=0.9).contains(&position),
        SectionKind::Skills => position > 0.5,
        SectionKind::Interests => position > 0.7,
        _ => false,
    }
}

/// Text before the first heading: contact block or leftovers.
fn prelude_label(blocks: &[TextBlock]) -> (SectionKind, f32) {
    let contact = blocks.iter().any(|b| {
        let line = b.text.trim();
        EMAIL.is_match(line)
            || PHONE_FR.is_match(line)
            || PHONE_INTL.is_match(line)
            || PHONE_US.is_match(line)
            || NAME_LINE.is_match(line)
    });
    if contact {
        (SectionKind::PersonalInfo, PRELUDE_CONFIDENCE)
    } else {
        (SectionKind::Unclassified, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LayoutHint;
    use crate::rules::RuleSet;
    use pretty_assertions::assert_eq;

    fn blocks_of(text: &str) -> Vec<TextBlock> {
        let mut blocks = Vec::new();
        let mut offset = 0;
        for line in text.split('\n') {
            blocks.push(TextBlock::new(line, SourceSpan::new(offset, offset + line.len()), 1));
            offset += line.len() + 1;
        }
        blocks
    }

    fn segmenter() -> Segmenter {
        let rules = RuleSet::builtin().unwrap();
        Segmenter::new(SegmenterConfig::default(), &rules.sections, rules.thresholds.section_label)
    }

    fn assert_partition(text: &str, sections: &[Section]) {
        let joined: String = sections.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, text);
        for pair in sections.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }

    const CV: &str = "Jane Doe\njane.doe@example.com\n06 12 34 56 78\nEXPÉRIENCE PROFESSIONNELLE\nDéveloppeuse Rust - Acme\n2019 - 2021\nParis\nFORMATION\nMaster Informatique\nUniversité de Lyon\n2015 - 2017\nCompétences :\nRust, Python, SQL\nDocker\nLangues\nAnglais courant";

    #[test]
    fn test_segments_typical_resume() {
        let blocks = blocks_of(CV);
        let sections = segmenter().segment(CV, &blocks, "fr");

        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::PersonalInfo,
                SectionKind::Experiences,
                SectionKind::Education,
                SectionKind::Skills,
                SectionKind::Languages,
            ]
        );
        assert_eq!(sections[0].label_confidence, 0.6);
        assert_eq!(sections[1].heading.as_deref(), Some("EXPÉRIENCE PROFESSIONNELLE"));
        assert!(sections[1].label_confidence >= 0.8);
        assert_eq!(sections[3].blocks, 11..14);
        assert_partition(CV, &sections);
    }

    #[test]
    fn test_fuzzy_heading_match() {
        let m = segmenter().match_heading("Experiance professionelle", "fr").unwrap();
        assert_eq!(m.kind, SectionKind::Experiences);
        assert!(m.fuzzy);
    }

    #[test]
    fn test_numbering_and_colon_stripped() {
        let m = segmenter().match_heading("2. Formation :", "fr").unwrap();
        assert_eq!(m.kind, SectionKind::Education);
        assert!(m.numbered);
        assert!(m.colon);
        assert!(!m.fuzzy);
    }

    #[test]
    fn test_long_or_dated_lines_are_not_headings() {
        let s = segmenter();
        assert!(s.match_heading("Expérience 2019", "fr").is_none());
        let long = format!("Compétences {}", "x".repeat(120));
        assert!(s.match_heading(&long, "fr").is_none());
    }

    #[test]
    fn test_adjacent_headings_keep_later() {
        let text = "Jane Doe\nCompétences\nLangues\nAnglais\nEspagnol";
        let sections = segmenter().segment(text, &blocks_of(text), "fr");

        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SectionKind::PersonalInfo, SectionKind::Languages]);
        assert!(sections[0].text.contains("Compétences"));
        assert_partition(text, &sections);
    }

    #[test]
    fn test_heading_at_end_of_text_ignored() {
        let text = "Jane Doe\njane@example.com\nLoisirs";
        let sections = segmenter().segment(text, &blocks_of(text), "fr");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::PersonalInfo);
    }

    #[test]
    fn test_unclassified_prelude() {
        let text = "curriculum vitae\nmis à jour en mars\nCompétences\nRust";
        let sections = segmenter().segment(text, &blocks_of(text), "fr");
        assert_eq!(sections[0].kind, SectionKind::Unclassified);
        assert_eq!(sections[0].label_confidence, 0.0);
        assert_eq!(sections[1].kind, SectionKind::Skills);
        assert_partition(text, &sections);
    }

    #[test]
    fn test_heading_style_hint_raises_score() {
        let text = "Jane Doe\nProjets\nCompilateur\nMoteur de jeu\nOutil CLI";
        let mut blocks = blocks_of(text);
        let plain = segmenter().segment(text, &blocks, "fr");
        blocks[1] = blocks[1].clone().with_hint(LayoutHint {
            heading_style: true,
            ..Default::default()
        });
        let styled = segmenter().segment(text, &blocks, "fr");
        assert!(styled[1].label_confidence > plain[1].label_confidence);
    }

    #[test]
    fn test_empty_text() {
        assert!(segmenter().segment("", &[], "fr").is_empty());
    }
}
