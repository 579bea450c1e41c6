//! Small text helpers shared by the stages: folding, whitespace and
//! fuzzy similarity.

use unicode_segmentation::UnicodeSegmentation;

/// Map a single character to its unaccented lowercase form.
fn fold_char(c: char, out: &mut String) {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => out.push('a'),
        'ç' | 'Ç' => out.push('c'),
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => out.push('i'),
        'ñ' | 'Ñ' => out.push('n'),
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => out.push('o'),
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => out.push('u'),
        'ý' | 'ÿ' | 'Ý' => out.push('y'),
        'œ' | 'Œ' => out.push_str("oe"),
        'æ' | 'Æ' => out.push_str("ae"),
        'ß' => out.push_str("ss"),
        '’' | '‘' | '`' => out.push('\''),
        _ => out.extend(c.to_lowercase()),
    }
}

/// Lowercase and strip diacritics, for comparisons only.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        fold_char(c, &mut out);
    }
    out
}

/// Folded text that remembers where each folded byte came from.
#[derive(Debug, Clone)]
pub struct FoldedText {
    pub folded: String,
    offsets: Vec<usize>,
}

impl FoldedText {
    pub fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut offsets = Vec::with_capacity(text.len() + 1);
        for (idx, c) in text.char_indices() {
            let before = folded.len();
            fold_char(c, &mut folded);
            offsets.extend(std::iter::repeat_n(idx, folded.len() - before));
        }
        offsets.push(text.len());
        Self { folded, offsets }
    }

    /// Map a folded byte range back to the source text.
    pub fn source_range(&self, start: usize, end: usize) -> (usize, usize) {
        let s = self.offsets[start.min(self.offsets.len() - 1)];
        let e = if end >= self.offsets.len() - 1 {
            self.offsets[self.offsets.len() - 1]
        } else {
            self.offsets[end]
        };
        (s, e.max(s))
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded comparison key: folded, punctuation-free, single-spaced.
pub fn comparison_key(text: &str) -> String {
    let folded = fold(text);
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '+' || c == '#' { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Levenshtein distance over grapheme clusters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<&str> = a.graphemes(true).collect();
    let b: Vec<&str> = b.graphemes(true).collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ga) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, gb) in b.iter().enumerate() {
            let cost = usize::from(ga != gb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity in `[0, 1]` after folding both sides.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a = comparison_key(a);
    let b = comparison_key(b);
    let longest = a.graphemes(true).count().max(b.graphemes(true).count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f32 / longest as f32
}

/// Loose name match used when pairing entries: equal keys, containment,
/// or a close edit distance.
pub fn similar_names(a: &str, b: &str) -> bool {
    let ka = comparison_key(a);
    let kb = comparison_key(b);
    if ka.is_empty() || kb.is_empty() {
        return false;
    }
    if ka == kb {
        return true;
    }
    let (short, long) = if ka.len() <= kb.len() { (&ka, &kb) } else { (&kb, &ka) };
    if short.len() >= 3 && long.contains(short.as_str()) {
        return true;
    }
    similarity(&ka, &kb) >= 0.8
}

/// Whether `needle` (already folded) occurs in `haystack` (already folded)
/// on word boundaries. Returns the byte offset in the folded haystack.
pub fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(start);
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Count words, as Unicode word segments.
pub fn word_count(text: &str) -> usize {
    text.unicode_words().count()
}

/// Fraction of alphabetic characters that are uppercase.
pub fn uppercase_ratio(text: &str) -> f32 {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return 0.0;
    }
    letters.iter().filter(|c| c.is_uppercase()).count() as f32 / letters.len() as f32
}

/// Trim surrounding whitespace and trailing punctuation separators.
pub fn trim_value(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '–' | '—' | '|' | '•' | '·'))
        .trim()
}
