//! Encoding and whitespace normalization of loader text.

/// Expand a typographic ligature, if `c` is one.
fn ligature(c: char) -> Option<&'static str> {
    Some(match c {
        'ﬀ' => "ff",
        'ﬁ' => "fi",
        'ﬂ' => "fl",
        'ﬃ' => "ffi",
        'ﬄ' => "ffl",
        'ﬅ' | 'ﬆ' => "st",
        _ => return None,
    })
}

fn is_exotic_space(c: char) -> bool {
    matches!(
        c,
        '\u{00a0}' | '\u{1680}' | '\u{2000}'..='\u{200a}' | '\u{2028}' | '\u{2029}' | '\u{202f}' | '\u{205f}' | '\u{3000}'
    )
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200b}'..='\u{200d}' | '\u{2060}' | '\u{feff}' | '\u{00ad}')
}

/// Clean one line: control characters stripped (tab becomes a space),
/// exotic spaces unified, runs of spaces collapsed, ends trimmed.
pub fn clean_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;

    for c in line.chars() {
        if c == '\t' || c == ' ' || is_exotic_space(c) {
            pending_space = true;
            continue;
        }
        if c.is_control() || is_invisible(c) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        match ligature(c) {
            Some(expanded) => out.push_str(expanded),
            None => out.push(c),
        }
    }
    out
}

/// Split raw text into lines, treating CRLF, CR and form feed as breaks.
pub fn split_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split(['\n', '\r', '\u{c}'])
        .map(move |line| {
            let start = offset;
            offset += line.len() + 1;
            (start, line)
        })
        .filter(|(_, line)| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("  Jane\u{00a0}\u{00a0}Doe\t "), "Jane Doe");
        assert_eq!(clean_line("Certiﬁcation"), "Certification");
        assert_eq!(clean_line("A\u{0007}B\u{200b}C"), "ABC");
        assert_eq!(clean_line("a \t  b"), "a b");
    }

    #[test]
    fn test_split_lines_offsets() {
        let text = "one\r\ntwo\rthree\n\n  \nfour";
        let lines: Vec<(usize, &str)> = split_lines(text).collect();
        assert_eq!(lines, vec![(0, "one"), (5, "two"), (9, "three"), (19, "four")]);
        for (start, line) in lines {
            assert_eq!(&text[start..start + line.len()], line);
        }
    }
}
