//! Multi-language date, date-range and duration grammar.
//!
//! The grammar is compiled once from the date vocabulary and shared by the
//! extraction rules (to find spans) and the normalizer (to parse them).

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::ConfigError;
use crate::models::{DateRange, PartialDate, RangeEnd};
use crate::rules::DateVocabulary;

lazy_static! {
    static ref NUMERIC_DMY: Regex = Regex::new(r"^(\d{1,2})[./-](\d{1,2})[./-](\d{4})$").unwrap();
    static ref NUMERIC_YMD: Regex = Regex::new(r"^(\d{4})[./-](\d{1,2})(?:[./-](\d{1,2}))?$").unwrap();
    static ref NUMERIC_MY: Regex = Regex::new(r"^(\d{1,2})[./-](\d{4})$").unwrap();
    static ref YEAR_ONLY: Regex = Regex::new(r"^(\d{4})$").unwrap();
}

/// A match located in the searched text.
#[derive(Debug, Clone, PartialEq)]
pub struct DateMatch<T> {
    pub value: T,
    pub start: usize,
    pub end: usize,
}

/// Compiled date grammar.
#[derive(Debug, Clone)]
pub struct DateGrammar {
    vocab: DateVocabulary,
    textual: Regex,
    single: Regex,
    range: Regex,
    since: Regex,
    duration: Regex,
    year_units: Vec<String>,
}

fn alternation(words: &[&str]) -> String {
    let mut words: Vec<&str> = words.iter().copied().filter(|w| !w.is_empty()).collect();
    // longest first so "septembre" wins over "sept"
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Invalid(format!("date grammar: {}", e)))
}

impl DateGrammar {
    pub fn new(vocab: &DateVocabulary) -> Result<Self, ConfigError> {
        let months = alternation(&vocab.month_words());
        if months.is_empty() {
            return Err(ConfigError::Invalid("no month names configured".to_string()));
        }
        let present = alternation(&vocab.present_tokens());
        let since = alternation(&vocab.since.iter().map(String::as_str).collect::<Vec<_>>());
        let prefixes = alternation(
            &vocab
                .range_prefixes
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>(),
        );

        let (symbols, words): (Vec<&str>, Vec<&str>) = vocab
            .separators
            .iter()
            .map(String::as_str)
            .partition(|s| !s.chars().any(char::is_alphabetic));
        let symbol_class: String = symbols.iter().map(|s| regex::escape(s)).collect::<Vec<_>>().join("|");
        let separator = match (symbol_class.is_empty(), words.is_empty()) {
            (false, false) => format!(r"\s*(?:{}|\s(?:{})\s)\s*", symbol_class, alternation(&words)),
            (false, true) => format!(r"\s*(?:{})\s*", symbol_class),
            (true, false) => format!(r"\s+(?:{})\s+", alternation(&words)),
            (true, true) => r"\s*-\s*".to_string(),
        };

        let date = format!(
            r"\b(?:(?:\d{{1,2}}(?:er|st|nd|rd|th)?\s+)?(?:{m})\.?,?\s+\d{{4}}|\d{{1,2}}[./-]\d{{1,2}}[./-]\d{{4}}|\d{{4}}[./-]\d{{1,2}}(?:[./-]\d{{1,2}})?|\d{{1,2}}[./-]\d{{4}}|(?:19|20)\d{{2}})\b",
            m = months
        );
        let end = if present.is_empty() {
            date.clone()
        } else {
            format!(r"{}|\b(?:{})\b", date, present)
        };
        let prefix = if prefixes.is_empty() {
            String::new()
        } else {
            format!(r"(?:\b(?:{})\s+)?", prefixes)
        };

        let textual = compile(&format!(
            r"(?i)^(?:(\d{{1,2}})(?:er|st|nd|rd|th)?\s+)?({})\.?,?\s+(\d{{4}})$",
            months
        ))?;
        let single = compile(&format!("(?i){}", date))?;
        let range = compile(&format!(
            r"(?i){}(?P<start>{}){}(?P<end>{})",
            prefix, date, separator, end
        ))?;
        let since = if since.is_empty() {
            compile(r"(?i)\bsince\s+(?P<start>(?:19|20)\d{2})\b")?
        } else {
            compile(&format!(r"(?i)\b(?:{})\s*(?P<start>{})", since, date))?
        };

        let units = &vocab.duration_units;
        let year_words: Vec<&str> = units.years.iter().map(String::as_str).collect();
        let month_words: Vec<&str> = units.months.iter().map(String::as_str).collect();
        let duration = compile(&format!(
            r"(?i)\b(\d{{1,2}}(?:[.,]\d)?)\s*({y})\b(?:\s*(?:et|and|und|y|e|,)?\s*(\d{{1,2}})\s*(?:{m})\b)?|\b(\d{{1,3}})\s*(?:{m})\b",
            y = alternation(&year_words),
            m = alternation(&month_words)
        ))?;

        Ok(Self {
            vocab: vocab.clone(),
            textual,
            single,
            range,
            since,
            duration,
            year_units: units.years.iter().map(|u| crate::text::fold(u)).collect(),
        })
    }

    /// Parse one date expression, e.g. `03/2019`, `mars 2019`, `2019`.
    pub fn parse_date(&self, text: &str) -> Option<PartialDate> {
        let text = text.trim();

        if let Some(caps) = self.textual.captures(text) {
            let month = self.vocab.month(&caps[2])?;
            let year: i32 = caps[3].parse().ok()?;
            let day = caps.get(1).and_then(|d| d.as_str().parse().ok());
            return PartialDate::new(year, Some(month), day);
        }

        if let Some(caps) = NUMERIC_DMY.captures(text) {
            let a: u8 = caps[1].parse().ok()?;
            let b: u8 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            // day first unless that is impossible
            let (day, month) = if b > 12 && a <= 12 { (b, a) } else { (a, b) };
            return PartialDate::new(year, Some(month), Some(day));
        }

        if let Some(caps) = NUMERIC_YMD.captures(text) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u8 = caps[2].parse().ok()?;
            let day = caps.get(3).and_then(|d| d.as_str().parse().ok());
            return PartialDate::new(year, Some(month), day);
        }

        if let Some(caps) = NUMERIC_MY.captures(text) {
            let month: u8 = caps[1].parse().ok()?;
            let year: i32 = caps[2].parse().ok()?;
            return PartialDate::year_month(year, month);
        }

        if let Some(caps) = YEAR_ONLY.captures(text) {
            return PartialDate::year(caps[1].parse().ok()?);
        }

        None
    }

    fn range_from(&self, caps: &Captures<'_>) -> Option<DateRange> {
        let start = self.parse_date(caps.name("start")?.as_str())?;
        let end = match caps.name("end") {
            None => RangeEnd::Open,
            Some(m) if self.vocab.is_present(m.as_str()) => RangeEnd::Open,
            Some(m) => RangeEnd::Closed(self.parse_date(m.as_str())?),
        };
        match end {
            RangeEnd::Closed(last) if last.last_day() < start.first_day() => None,
            _ => Some(DateRange::new(start, end)),
        }
    }

    /// All date ranges in `text`, in order, without overlaps.
    pub fn find_ranges(&self, text: &str) -> Vec<DateMatch<DateRange>> {
        let mut found: Vec<DateMatch<DateRange>> = Vec::new();
        for regex in [&self.range, &self.since] {
            for caps in regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                if let Some(range) = self.range_from(&caps) {
                    found.push(DateMatch {
                        value: range,
                        start: whole.start(),
                        end: whole.end(),
                    });
                }
            }
        }
        found.sort_by_key(|m| (m.start, std::cmp::Reverse(m.end)));
        let mut kept: Vec<DateMatch<DateRange>> = Vec::new();
        for m in found {
            if kept.iter().all(|k| m.start >= k.end || m.end <= k.start) {
                kept.push(m);
            }
        }
        kept
    }

    /// Single dates in `text`, including those inside ranges.
    pub fn find_dates(&self, text: &str) -> Vec<DateMatch<PartialDate>> {
        self.single
            .find_iter(text)
            .filter_map(|m| {
                self.parse_date(m.as_str()).map(|value| DateMatch {
                    value,
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect()
    }

    /// Parse the first date range in `text`.
    pub fn parse_range(&self, text: &str) -> Option<DateRange> {
        self.find_ranges(text).into_iter().next().map(|m| m.value)
    }

    fn duration_from(&self, caps: &Captures<'_>) -> Option<u32> {
        if let Some(amount) = caps.get(1) {
            let years: f32 = amount.as_str().replace(',', ".").parse().ok()?;
            let unit = crate::text::fold(caps.get(2)?.as_str());
            if !self.year_units.contains(&unit) {
                return None;
            }
            let extra: u32 = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            return Some((years * 12.0).round() as u32 + extra);
        }
        caps.get(4)?.as_str().parse().ok()
    }

    /// All free-text durations in `text`, in months.
    pub fn find_durations(&self, text: &str) -> Vec<DateMatch<u32>> {
        self.duration
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                self.duration_from(&caps).map(|months| DateMatch {
                    value: months,
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect()
    }

    /// Parse the first duration in `text`, in months.
    pub fn parse_duration(&self, text: &str) -> Option<u32> {
        self.find_durations(text).into_iter().next().map(|m| m.value)
    }

    pub fn is_present(&self, token: &str) -> bool {
        self.vocab.is_present(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;

    fn grammar() -> DateGrammar {
        DateGrammar::new(&RuleSet::builtin().unwrap().dates).unwrap()
    }

    fn ym(y: i32, m: u8) -> PartialDate {
        PartialDate::year_month(y, m).unwrap()
    }

    fn y(y: i32) -> PartialDate {
        PartialDate::year(y).unwrap()
    }

    #[test]
    fn test_parse_single_dates() {
        let g = grammar();
        assert_eq!(g.parse_date("2019"), Some(y(2019)));
        assert_eq!(g.parse_date("03/2019"), Some(ym(2019, 3)));
        assert_eq!(g.parse_date("mars 2019"), Some(ym(2019, 3)));
        assert_eq!(g.parse_date("Févr. 2020"), Some(ym(2020, 2)));
        assert_eq!(g.parse_date("September 2018"), Some(ym(2018, 9)));
        assert_eq!(g.parse_date("15/01/2024"), PartialDate::new(2024, Some(1), Some(15)));
        assert_eq!(g.parse_date("2024-01-15"), PartialDate::new(2024, Some(1), Some(15)));
        assert_eq!(g.parse_date("1er juin 2021"), PartialDate::new(2021, Some(6), Some(1)));
        assert_eq!(g.parse_date("13/2019"), None);
        assert_eq!(g.parse_date("hello"), None);
    }

    #[test]
    fn test_year_range() {
        let g = grammar();
        let found = g.find_ranges("Développeur Rust, Acme (2019 - 2021)");
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].value,
            DateRange::new(y(2019), RangeEnd::Closed(y(2021)))
        );
    }

    #[test]
    fn test_french_present_range() {
        let g = grammar();
        let range = g.parse_range("Janvier 2020 – à ce jour").unwrap();
        assert_eq!(range, DateRange::new(ym(2020, 1), RangeEnd::Open));
        let range = g.parse_range("01/2020 - aujourd'hui").unwrap();
        assert!(range.is_open());
    }

    #[test]
    fn test_english_and_german_ranges() {
        let g = grammar();
        assert_eq!(
            g.parse_range("Jan 2018 to Mar 2020"),
            Some(DateRange::new(ym(2018, 1), RangeEnd::Closed(ym(2020, 3))))
        );
        assert_eq!(
            g.parse_range("März 2017 bis heute"),
            Some(DateRange::new(ym(2017, 3), RangeEnd::Open))
        );
        assert_eq!(
            g.parse_range("Sep 2015 - Present"),
            Some(DateRange::new(ym(2015, 9), RangeEnd::Open))
        );
    }

    #[test]
    fn test_prefixed_and_since_ranges() {
        let g = grammar();
        let found = g.find_ranges("de 2016 à 2018");
        assert_eq!(found[0].start, 0);
        assert_eq!(found[0].value, DateRange::new(y(2016), RangeEnd::Closed(y(2018))));
        assert_eq!(
            g.parse_range("depuis mars 2022"),
            Some(DateRange::new(ym(2022, 3), RangeEnd::Open))
        );
        assert_eq!(
            g.parse_range("desde 2021"),
            Some(DateRange::new(y(2021), RangeEnd::Open))
        );
    }

    #[test]
    fn test_slash_separated_years() {
        let g = grammar();
        assert_eq!(
            g.parse_range("2019/2020"),
            Some(DateRange::new(y(2019), RangeEnd::Closed(y(2020))))
        );
        assert_eq!(
            g.parse_range("09/2017 - 06/2019"),
            Some(DateRange::new(ym(2017, 9), RangeEnd::Closed(ym(2019, 6))))
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let g = grammar();
        assert_eq!(g.parse_range("2021 - 2019"), None);
    }

    #[test]
    fn test_phone_and_postcode_are_not_dates() {
        let g = grammar();
        assert!(g.find_dates("06 12 34 56 78").is_empty());
        assert!(g.find_dates("75001 Paris").is_empty());
        assert!(g.find_ranges("+33 6 12 34 56 78").is_empty());
    }

    #[test]
    fn test_durations() {
        let g = grammar();
        assert_eq!(g.parse_duration("3 ans"), Some(36));
        assert_eq!(g.parse_duration("2 years 6 months"), Some(30));
        assert_eq!(g.parse_duration("1,5 an"), Some(18));
        assert_eq!(g.parse_duration("(18 mois)"), Some(18));
        assert_eq!(g.parse_duration("2 Jahre"), Some(24));
        assert_eq!(g.parse_duration("Rust"), None);
    }

    #[test]
    fn test_find_dates_positions() {
        let g = grammar();
        let text = "Diplômé en 2015";
        let found = g.find_dates(text);
        assert_eq!(found.len(), 1);
        assert_eq!(&text[found[0].start..found[0].end], "2015");
    }
}
