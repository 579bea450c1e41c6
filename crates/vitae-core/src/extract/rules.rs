//! Pattern rules: regexes and vocabulary matches over section lines.

use tracing::trace;

use super::patterns::{
    digit_count, CEFR, EMAIL, GITHUB, ITEM_SEPARATOR, JOB_SPLIT, LABELLED, LEADING_BULLET,
    LINKEDIN, NAME_LINE, PHONE_FR, PHONE_INTL, PHONE_US, POSTAL_CITY, WEBSITE,
};
use super::vocab::WordList;
use super::{ExtractContext, SectionInput};
use crate::models::{ExtractionMethod, FieldCandidate, FieldName, SourceSpan, TextBlock};
use crate::rules::PatternRule;
use crate::text::word_count;

/// Lines looked at for a name and headline.
const NAME_WINDOW: usize = 5;
const MAX_ITEM_CHARS: usize = 60;
const MAX_ITEM_WORDS: usize = 6;
const MAX_JOB_LINE_WORDS: usize = 12;

/// One line of a section with its block index.
struct Line<'a> {
    index: usize,
    block: &'a TextBlock,
    extractor: &'a str,
}

impl Line<'_> {
    fn text(&self) -> &str {
        &self.block.text
    }

    fn candidate(&self, field: FieldName, start: usize, end: usize, confidence: f32) -> FieldCandidate {
        let base = self.block.span.start;
        FieldCandidate::new(
            field,
            &self.block.text[start..end],
            confidence,
            ExtractionMethod::Rule,
            SourceSpan::new(base + start, base + end),
        )
        .with_extractor(self.extractor)
        .with_block(self.index)
    }
}

fn overlaps(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| start < e && s < end)
}

/// Narrow `start..end` to its content, dropping separators and dangling
/// or emptied brackets.
fn trim_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let is_edge = |c: char| {
        c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '–' | '—' | '|' | '•' | '·' | '.' | '(')
    };
    let (mut s, mut e) = (start, end);
    loop {
        let inner = &text[s..e];
        s += inner.len() - inner.trim_start_matches(is_edge).len();
        e = s + text[s..e].trim_end_matches(is_edge).len();
        if s >= e {
            return None;
        }
        let inner = &text[s..e];
        if inner.starts_with(')') {
            s += 1;
        } else if inner.ends_with(')') {
            match inner.rfind('(') {
                Some(pos) if inner[pos + 1..inner.len() - 1].trim().is_empty() => e = s + pos,
                Some(_) => return Some((s, e)),
                None => e -= 1,
            }
        } else {
            return Some((s, e));
        }
    }
}

/// Replace the given byte ranges with spaces, keeping offsets intact.
fn mask(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.char_indices() {
        if overlaps(spans, idx, idx + c.len_utf8()) {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        } else {
            out.push(c);
        }
    }
    out
}

/// End of the phrase starting at `from`: the next separator or end of text.
fn phrase_end(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    let mut end = rest.len();
    for sep in [",", "|", "(", ";", " - ", " – ", " — "] {
        if let Some(pos) = rest.find(sep) {
            end = end.min(pos);
        }
    }
    from + end
}

/// Start of the phrase ending at `to`: just after the previous separator.
fn phrase_start(text: &str, to: usize) -> usize {
    let head = &text[..to];
    [",", "|", "(", ";", " - ", " – ", " — "]
        .iter()
        .filter_map(|sep| head.rfind(sep).map(|pos| pos + sep.len()))
        .max()
        .unwrap_or(0)
}

/// Byte ranges of dates, ranges and durations in a line.
fn date_spans(text: &str, ctx: &ExtractContext<'_>) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = ctx
        .grammar
        .find_ranges(text)
        .into_iter()
        .map(|m| (m.start, m.end))
        .collect();
    spans.extend(ctx.grammar.find_durations(text).into_iter().map(|m| (m.start, m.end)));
    spans.extend(ctx.grammar.find_dates(text).into_iter().map(|m| (m.start, m.end)));
    spans
}

/// Split `text[from..to]` on `regex`, returning trimmed part ranges.
fn split_parts(text: &str, from: usize, to: usize, regex: &regex::Regex) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut start = from;
    for m in regex.find_iter(&text[from..to]) {
        parts.extend(trim_span(text, start, from + m.start()));
        start = from + m.end();
    }
    parts.extend(trim_span(text, start, to));
    parts
}

/// Run one rule over the body lines of a section.
pub(crate) fn apply(rule: &PatternRule, input: &SectionInput<'_>, ctx: &ExtractContext<'_>) -> Vec<FieldCandidate> {
    let extractor = format!("rule:{}", rule.name());
    let lines: Vec<Line<'_>> = input
        .range
        .clone()
        .filter_map(|index| {
            input.blocks.get(index).map(|block| Line {
                index,
                block,
                extractor: &extractor,
            })
        })
        .collect();

    let mut out = Vec::new();
    match rule {
        PatternRule::Email => lines.iter().for_each(|l| email(l, &mut out)),
        PatternRule::Phone => lines.iter().for_each(|l| phone(l, &mut out)),
        PatternRule::Url => lines.iter().for_each(|l| url(l, &mut out)),
        PatternRule::FullName => full_name(&lines, ctx, &mut out),
        PatternRule::Headline => headline(&lines, ctx, &mut out),
        PatternRule::Location => lines.iter().for_each(|l| location(l, ctx, &mut out)),
        PatternRule::DateRange => lines.iter().for_each(|l| dates(l, ctx, &mut out)),
        PatternRule::Duration => lines.iter().for_each(|l| duration(l, ctx, &mut out)),
        PatternRule::JobLine => lines.iter().for_each(|l| job_line(l, ctx, &mut out)),
        PatternRule::Degree => lines.iter().for_each(|l| degree(l, ctx, &mut out)),
        PatternRule::Institution => lines.iter().for_each(|l| institution(l, ctx, &mut out)),
        PatternRule::Language => lines.iter().for_each(|l| language(l, ctx, &mut out)),
        PatternRule::LanguageLevel => lines.iter().for_each(|l| language_level(l, ctx, &mut out)),
        PatternRule::ListItems(field) => lines.iter().for_each(|l| list_items(l, *field, ctx, &mut out)),
    }
    trace!("{} produced {} candidates in {}", extractor, out.len(), input.kind);
    out
}

fn email(line: &Line<'_>, out: &mut Vec<FieldCandidate>) {
    for m in EMAIL.find_iter(line.text()) {
        out.push(line.candidate(FieldName::Email, m.start(), m.end(), 0.95));
    }
}

fn phone(line: &Line<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let mut found: Vec<(usize, usize)> = Vec::new();
    for (regex, confidence) in [(&*PHONE_FR, 0.9), (&*PHONE_INTL, 0.9), (&*PHONE_US, 0.8)] {
        for m in regex.find_iter(text) {
            let digits = digit_count(m.as_str());
            if !(9..=15).contains(&digits) || overlaps(&found, m.start(), m.end()) {
                continue;
            }
            found.push((m.start(), m.end()));
            out.push(line.candidate(FieldName::Phone, m.start(), m.end(), confidence));
        }
    }
}

fn url(line: &Line<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let mut taken: Vec<(usize, usize)> = EMAIL.find_iter(text).map(|m| (m.start(), m.end())).collect();
    for (regex, field, confidence) in [
        (&*LINKEDIN, FieldName::Linkedin, 0.95),
        (&*GITHUB, FieldName::Github, 0.95),
        (&*WEBSITE, FieldName::Website, 0.8),
    ] {
        for m in regex.find_iter(text) {
            let end = m.start() + m.as_str().trim_end_matches(['.', ',', ';', ')']).len();
            if overlaps(&taken, m.start(), end) {
                continue;
            }
            taken.push((m.start(), end));
            out.push(line.candidate(field, m.start(), end, confidence));
        }
    }
}

/// Value of a `Label: value` line whose label is in `labels`.
fn labelled_value(text: &str, labels: &WordList) -> Option<(usize, usize)> {
    let caps = LABELLED.captures(text)?;
    let label = caps.get(1)?;
    let value = caps.get(2)?;
    if labels.matches_exactly(label.as_str()) {
        trim_span(text, value.start(), value.end())
    } else {
        None
    }
}

fn is_name_line(text: &str, ctx: &ExtractContext<'_>) -> bool {
    let trimmed = text.trim();
    NAME_LINE.is_match(trimmed)
        && !ctx.vocab.name_stopwords.contains_in(trimmed)
        && !ctx.vocab.job_titles.contains_in(trimmed)
        && !ctx.vocab.cities.contains_in(trimmed)
}

fn full_name(lines: &[Line<'_>], ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    for (position, line) in lines.iter().take(NAME_WINDOW).enumerate() {
        let text = line.text();
        if let Some((s, e)) = labelled_value(text, &ctx.vocab.name_labels) {
            out.push(line.candidate(FieldName::FullName, s, e, 0.95));
            return;
        }
        if is_name_line(text, ctx) {
            let start = text.len() - text.trim_start().len();
            let confidence = if position == 0 { 0.9 } else { 0.75 };
            out.push(line.candidate(FieldName::FullName, start, start + text.trim().len(), confidence));
            return;
        }
    }
}

fn is_contact_line(text: &str) -> bool {
    EMAIL.is_match(text)
        || PHONE_FR.is_match(text)
        || PHONE_INTL.is_match(text)
        || PHONE_US.is_match(text)
        || WEBSITE.is_match(text)
        || LINKEDIN.is_match(text)
        || GITHUB.is_match(text)
}

fn headline(lines: &[Line<'_>], ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let window = &lines[..lines.len().min(NAME_WINDOW)];
    let name_at = window.iter().position(|l| {
        is_name_line(l.text(), ctx) || labelled_value(l.text(), &ctx.vocab.name_labels).is_some()
    });

    let plausible = |text: &str| {
        let words = word_count(text);
        (2..=MAX_JOB_LINE_WORDS).contains(&words)
            && text.chars().count() <= 100
            && !is_contact_line(text)
            && LABELLED.captures(text).is_none()
            && !POSTAL_CITY.is_match(text)
            && !ctx.vocab.cities.matches_exactly(text)
    };

    let (candidates, confidence) = match name_at {
        Some(i) => (&window[i + 1..], 0.7),
        None => (window, 0.6),
    };
    for line in candidates.iter().take(3) {
        let text = line.text();
        if !plausible(text) || (name_at.is_none() && !ctx.vocab.job_titles.contains_in(text)) {
            continue;
        }
        if let Some((s, e)) = trim_span(text, 0, text.len()) {
            out.push(line.candidate(FieldName::Headline, s, e, confidence));
        }
        return;
    }
}

fn location(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    if let Some((s, e)) = labelled_value(text, &ctx.vocab.location_labels) {
        out.push(line.candidate(FieldName::Location, s, e, 0.85));
        return;
    }

    let mut taken: Vec<(usize, usize)> = Vec::new();
    for caps in POSTAL_CITY.captures_iter(text) {
        if let Some(city) = caps.get(2) {
            taken.push((city.start(), city.end()));
            out.push(line.candidate(FieldName::Location, city.start(), city.end(), 0.8));
        }
    }
    for hit in ctx.vocab.cities.find_all(text) {
        if !overlaps(&taken, hit.start, hit.end) {
            out.push(line.candidate(FieldName::Location, hit.start, hit.end, 0.6));
        }
    }
}

fn dates(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let ranges: Vec<(usize, usize)> = ctx
        .grammar
        .find_ranges(text)
        .into_iter()
        .map(|m| (m.start, m.end))
        .collect();
    for &(s, e) in &ranges {
        out.push(line.candidate(FieldName::DateRange, s, e, 0.9));
    }
    for date in ctx.grammar.find_dates(text) {
        if !overlaps(&ranges, date.start, date.end) {
            out.push(line.candidate(FieldName::Date, date.start, date.end, 0.7));
        }
    }
}

fn duration(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    for m in ctx.grammar.find_durations(line.text()) {
        out.push(line.candidate(FieldName::Duration, m.start, m.end, 0.8));
    }
}

fn starts_capitalized(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn job_line(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    if LEADING_BULLET.is_match(text) || word_count(text) > MAX_JOB_LINE_WORDS || text.chars().count() > 100 {
        return;
    }
    let masked = mask(text, &date_spans(text, ctx));
    let titles = &ctx.vocab.job_titles;

    // "Title chez Company", "Engineer at Company"
    let mut unknown_title = None;
    for hit in ctx.vocab.job_connectors.find_all(&masked) {
        let title = trim_span(&masked, 0, hit.start);
        let company = trim_span(&masked, hit.end, phrase_end(&masked, hit.end));
        if let (Some((ts, te)), Some((cs, ce))) = (title, company) {
            if !starts_capitalized(&masked[cs..ce]) {
                continue;
            }
            if titles.contains_in(&masked[ts..te]) {
                out.push(line.candidate(FieldName::JobTitle, ts, te, 0.85));
                out.push(line.candidate(FieldName::Company, cs, ce, 0.85));
                return;
            }
            if unknown_title.is_none()
                && starts_capitalized(&masked[ts..te])
                && word_count(&masked[ts..te]) <= MAX_ITEM_WORDS
            {
                unknown_title = Some(((ts, te), (cs, ce)));
            }
        }
    }
    // Title outside the vocabulary, still split by a connector.
    if let Some(((ts, te), (cs, ce))) = unknown_title {
        out.push(line.candidate(FieldName::JobTitle, ts, te, 0.7));
        out.push(line.candidate(FieldName::Company, cs, ce, 0.7));
        return;
    }

    let parts: Vec<(usize, usize)> = split_parts(&masked, 0, masked.len(), &JOB_SPLIT)
        .into_iter()
        .filter(|&(s, e)| !ctx.vocab.cities.matches_exactly(&masked[s..e]))
        .collect();
    let title_at = parts.iter().position(|&(s, e)| titles.contains_in(&masked[s..e]));

    match (parts.len(), title_at) {
        (0, _) => {}
        (1, Some(_)) => {
            let (s, e) = parts[0];
            if word_count(&masked[s..e]) <= MAX_ITEM_WORDS {
                out.push(line.candidate(FieldName::JobTitle, s, e, 0.65));
            }
        }
        (_, Some(t)) if parts.len() > 1 => {
            let (ts, te) = parts[t];
            out.push(line.candidate(FieldName::JobTitle, ts, te, 0.75));
            if let Some(&(cs, ce)) = parts.iter().enumerate().find(|(i, _)| *i != t).map(|(_, p)| p) {
                out.push(line.candidate(FieldName::Company, cs, ce, 0.75));
            }
        }
        _ => {
            for &(s, e) in &parts {
                if let Some((os, oe)) = ctx.vocab.find_organization(&masked[s..e]) {
                    out.push(line.candidate(FieldName::Company, s + os, s + oe, 0.7));
                    break;
                }
            }
        }
    }
}

fn degree(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let masked = mask(text, &date_spans(text, ctx));
    let Some(hit) = ctx.vocab.degrees.find_all(&masked).into_iter().next() else {
        return;
    };
    let mut end = phrase_end(&masked, hit.start);
    if let Some(inst) = ctx
        .vocab
        .institutions
        .find_all(&masked)
        .into_iter()
        .find(|i| i.start > hit.start && i.start < end)
    {
        end = inst.start;
    }
    if let Some((s, e)) = trim_span(&masked, hit.start, end) {
        out.push(line.candidate(FieldName::Degree, s, e, 0.85));
    }
}

fn institution(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let masked = mask(text, &date_spans(text, ctx));
    let Some(hit) = ctx.vocab.institutions.find_all(&masked).into_iter().next() else {
        return;
    };

    // "Sorbonne Université": take capitalized words before the keyword.
    let mut start = hit.start;
    let seg_start = phrase_start(&masked, hit.start);
    let head = masked[seg_start..hit.start].trim();
    if !head.is_empty()
        && head.split_whitespace().all(starts_capitalized)
        && !ctx.vocab.degrees.contains_in(head)
    {
        start = seg_start;
    }

    if let Some((s, e)) = trim_span(&masked, start, phrase_end(&masked, hit.end)) {
        out.push(line.candidate(FieldName::Institution, s, e, 0.85));
    }
}

fn language(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    for hit in ctx.vocab.languages.find_all(line.text()) {
        out.push(line.candidate(FieldName::Language, hit.start, hit.end, 0.9));
    }
}

fn language_level(line: &Line<'_>, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let mut taken = Vec::new();
    for m in CEFR.find_iter(text) {
        taken.push((m.start(), m.end()));
        out.push(line.candidate(FieldName::LanguageLevel, m.start(), m.end(), 0.95));
    }
    for hit in ctx.vocab.levels.find_all(text) {
        if !overlaps(&taken, hit.start, hit.end) {
            out.push(line.candidate(FieldName::LanguageLevel, hit.start, hit.end, 0.85));
        }
    }
}

fn list_items(line: &Line<'_>, field: FieldName, ctx: &ExtractContext<'_>, out: &mut Vec<FieldCandidate>) {
    let text = line.text();
    let mut from = LEADING_BULLET.find(text).map_or(0, |m| m.end());
    // "Langages : Rust, Go" lists after the label.
    if let Some(caps) = LABELLED.captures(&text[from..]) {
        if let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) {
            if word_count(label.as_str()) <= 3 {
                from += value.start();
            }
        }
    }

    if field == FieldName::Item {
        let masked = mask(text, &date_spans(text, ctx));
        if let Some((s, e)) = trim_span(&masked, from, masked.len()) {
            if masked[s..e].chars().count() <= 100 && word_count(&masked[s..e]) <= MAX_JOB_LINE_WORDS {
                out.push(line.candidate(field, s, e, 0.6));
            }
        }
        return;
    }

    for (s, e) in split_parts(text, from, text.len(), &ITEM_SEPARATOR) {
        let item = &text[s..e];
        if item.chars().count() > MAX_ITEM_CHARS || word_count(item) > MAX_ITEM_WORDS {
            continue;
        }
        out.push(line.candidate(field, s, e, 0.7));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateGrammar;
    use crate::extract::VocabIndex;
    use crate::models::SectionKind;
    use crate::rules::RuleSet;

    struct Fixture {
        grammar: DateGrammar,
        vocab: VocabIndex,
    }

    impl Fixture {
        fn new() -> Self {
            let rules = RuleSet::builtin().unwrap();
            Self {
                grammar: DateGrammar::new(&rules.dates).unwrap(),
                vocab: VocabIndex::new(&rules.vocab).unwrap(),
            }
        }

        fn run(&self, rule: PatternRule, kind: SectionKind, lines: &[&str]) -> Vec<(FieldName, String, f32)> {
            let mut blocks = Vec::new();
            let mut offset = 100;
            for line in lines {
                blocks.push(TextBlock::new(*line, SourceSpan::new(offset, offset + line.len()), 1));
                offset += line.len() + 1;
            }
            let input = SectionInput {
                kind,
                blocks: &blocks,
                range: 0..blocks.len(),
                language: "fr",
            };
            let ctx = ExtractContext {
                grammar: &self.grammar,
                vocab: &self.vocab,
            };
            apply(&rule, &input, &ctx)
                .into_iter()
                .map(|c| (c.field, c.raw_value, c.confidence))
                .collect()
        }
    }

    fn values(found: &[(FieldName, String, f32)]) -> Vec<(FieldName, &str)> {
        found.iter().map(|(f, v, _)| (*f, v.as_str())).collect()
    }

    #[test]
    fn test_contact_rules() {
        let fx = Fixture::new();
        let line = "jane.doe@example.com | +33 6 12 34 56 78 | linkedin.com/in/jane-doe";
        let k = SectionKind::PersonalInfo;
        assert_eq!(
            values(&fx.run(PatternRule::Email, k, &[line])),
            vec![(FieldName::Email, "jane.doe@example.com")]
        );
        assert_eq!(
            values(&fx.run(PatternRule::Phone, k, &[line])),
            vec![(FieldName::Phone, "+33 6 12 34 56 78")]
        );
        assert_eq!(
            values(&fx.run(PatternRule::Url, k, &[line])),
            vec![(FieldName::Linkedin, "linkedin.com/in/jane-doe")]
        );
    }

    #[test]
    fn test_short_numbers_are_not_phones() {
        let fx = Fixture::new();
        assert!(fx.run(PatternRule::Phone, SectionKind::PersonalInfo, &["+33 6 12"]).is_empty());
    }

    #[test]
    fn test_candidate_spans_are_absolute() {
        let fx = Fixture::new();
        let blocks = vec![
            TextBlock::new("Jane Doe", SourceSpan::new(0, 8), 1),
            TextBlock::new("mail: jane@example.com", SourceSpan::new(9, 31), 1),
        ];
        let input = SectionInput {
            kind: SectionKind::PersonalInfo,
            blocks: &blocks,
            range: 0..2,
            language: "en",
        };
        let ctx = ExtractContext {
            grammar: &fx.grammar,
            vocab: &fx.vocab,
        };
        let found = apply(&PatternRule::Email, &input, &ctx);
        assert_eq!(found[0].span, SourceSpan::new(15, 31));
        assert_eq!(found[0].block, 1);
        assert_eq!(found[0].extractor, "rule:email");
    }

    #[test]
    fn test_name_and_headline() {
        let fx = Fixture::new();
        let lines = ["Jane Doe", "Développeuse Rust senior", "jane@example.com"];
        let k = SectionKind::PersonalInfo;
        let names = fx.run(PatternRule::FullName, k, &lines);
        assert_eq!(values(&names), vec![(FieldName::FullName, "Jane Doe")]);
        assert_eq!(names[0].2, 0.9);
        assert_eq!(
            values(&fx.run(PatternRule::Headline, k, &lines)),
            vec![(FieldName::Headline, "Développeuse Rust senior")]
        );

        let labelled = fx.run(PatternRule::FullName, k, &["CV", "Nom : Jane Doe"]);
        assert_eq!(values(&labelled), vec![(FieldName::FullName, "Jane Doe")]);
        assert_eq!(labelled[0].2, 0.95);
    }

    #[test]
    fn test_location_rules() {
        let fx = Fixture::new();
        let k = SectionKind::PersonalInfo;
        assert_eq!(
            values(&fx.run(PatternRule::Location, k, &["12 rue de la Paix, 75002 Paris"])),
            vec![(FieldName::Location, "Paris")]
        );
        let labelled = fx.run(PatternRule::Location, k, &["Adresse : Lyon 3e"]);
        assert_eq!(values(&labelled), vec![(FieldName::Location, "Lyon 3e")]);
        assert_eq!(labelled[0].2, 0.85);
    }

    #[test]
    fn test_date_rules() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::DateRange,
            SectionKind::Experiences,
            &["Janvier 2019 - Présent", "Certifié en 2021"],
        );
        assert_eq!(
            values(&found),
            vec![
                (FieldName::DateRange, "Janvier 2019 - Présent"),
                (FieldName::Date, "2021"),
            ]
        );
        let durations = fx.run(PatternRule::Duration, SectionKind::Experiences, &["Acme (2 ans)"]);
        assert_eq!(values(&durations), vec![(FieldName::Duration, "2 ans")]);
    }

    #[test]
    fn test_job_line_with_connector() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::JobLine,
            SectionKind::Experiences,
            &["Ingénieur en informatique chez Acme, Lyon"],
        );
        assert_eq!(
            values(&found),
            vec![
                (FieldName::JobTitle, "Ingénieur en informatique"),
                (FieldName::Company, "Acme"),
            ]
        );
    }

    #[test]
    fn test_job_line_feminine_title() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::JobLine,
            SectionKind::Experiences,
            &["Ingénieure Backend chez Acme"],
        );
        assert_eq!(
            values(&found),
            vec![
                (FieldName::JobTitle, "Ingénieure Backend"),
                (FieldName::Company, "Acme"),
            ]
        );
        assert!(found.iter().all(|(_, _, c)| *c == 0.85));
    }

    #[test]
    fn test_job_line_unknown_title_with_connector() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::JobLine,
            SectionKind::Experiences,
            &["Growth Hacker chez Acme"],
        );
        assert_eq!(
            values(&found),
            vec![
                (FieldName::JobTitle, "Growth Hacker"),
                (FieldName::Company, "Acme"),
            ]
        );
        assert!(found.iter().all(|(_, _, c)| *c == 0.7));

        let lowercase = fx.run(
            PatternRule::JobLine,
            SectionKind::Experiences,
            &["travail chez Acme"],
        );
        assert!(lowercase.iter().all(|(f, _, _)| *f != FieldName::Company));
    }

    #[test]
    fn test_job_line_split_and_dates() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::JobLine,
            SectionKind::Experiences,
            &["Acme SAS | Développeuse Rust | 2019 - 2021", "- Conception d'une API en Rust"],
        );
        assert_eq!(
            values(&found),
            vec![
                (FieldName::JobTitle, "Développeuse Rust"),
                (FieldName::Company, "Acme SAS"),
            ]
        );
    }

    #[test]
    fn test_degree_and_institution() {
        let fx = Fixture::new();
        let lines = ["Master Informatique, Sorbonne Université (2015 - 2017)"];
        let k = SectionKind::Education;
        assert_eq!(
            values(&fx.run(PatternRule::Degree, k, &lines)),
            vec![(FieldName::Degree, "Master Informatique")]
        );
        assert_eq!(
            values(&fx.run(PatternRule::Institution, k, &lines)),
            vec![(FieldName::Institution, "Sorbonne Université")]
        );
    }

    #[test]
    fn test_languages_and_levels() {
        let fx = Fixture::new();
        let lines = ["Anglais : courant (C1)", "Espagnol - notions"];
        let k = SectionKind::Languages;
        assert_eq!(
            values(&fx.run(PatternRule::Language, k, &lines)),
            vec![(FieldName::Language, "Anglais"), (FieldName::Language, "Espagnol")]
        );
        let levels = fx.run(PatternRule::LanguageLevel, k, &lines);
        assert_eq!(
            values(&levels),
            vec![
                (FieldName::LanguageLevel, "C1"),
                (FieldName::LanguageLevel, "courant"),
                (FieldName::LanguageLevel, "notions"),
            ]
        );
        assert_eq!(levels[0].2, 0.95);
    }

    #[test]
    fn test_list_items() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::ListItems(FieldName::Skill),
            SectionKind::Skills,
            &[
                "Langages : Rust, Python; Go",
                "• Docker",
                "Une phrase beaucoup trop longue pour être une compétence isolée du reste",
            ],
        );
        assert_eq!(
            values(&found),
            vec![
                (FieldName::Skill, "Rust"),
                (FieldName::Skill, "Python"),
                (FieldName::Skill, "Go"),
                (FieldName::Skill, "Docker"),
            ]
        );
    }

    #[test]
    fn test_item_lines_drop_dates() {
        let fx = Fixture::new();
        let found = fx.run(
            PatternRule::ListItems(FieldName::Item),
            SectionKind::Projects,
            &["- Compilateur Rust pour microcontrôleurs (2020)"],
        );
        assert_eq!(
            values(&found),
            vec![(FieldName::Item, "Compilateur Rust pour microcontrôleurs")]
        );
    }

    #[test]
    fn test_trim_span() {
        let text = "  (Acme), ";
        assert_eq!(trim_span(text, 0, text.len()).map(|(s, e)| &text[s..e]), Some("Acme"));
        let text = "Projet (Rust)";
        assert_eq!(trim_span(text, 0, text.len()).map(|(s, e)| &text[s..e]), Some("Projet (Rust)"));
        assert_eq!(trim_span(" , ", 0, 3), None);
    }
}
