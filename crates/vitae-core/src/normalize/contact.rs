//! Canonical forms for e-mails, phone numbers and URLs.

use crate::extract::patterns::EMAIL_STRICT;

/// Lowercase and validate an e-mail address.
pub fn email(raw: &str) -> Option<String> {
    let value = raw
        .trim()
        .trim_start_matches("mailto:")
        .trim_matches(|c: char| matches!(c, '<' | '>' | '(' | ')' | ',' | ';' | '.'))
        .to_lowercase();
    EMAIL_STRICT.is_match(&value).then_some(value)
}

/// Reduce a phone number to `+` and digits.
///
/// A `00` international prefix becomes `+`, and the trunk zero written as
/// `(0)` after a country code is dropped.
pub fn phone(raw: &str) -> Option<String> {
    let raw = raw.trim().replace("(0)", "");
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let mut international = raw.starts_with('+');
    if !international && digits.starts_with("00") {
        digits.drain(..2);
        international = true;
    }
    if !(6..=15).contains(&digits.len()) {
        return None;
    }
    Some(if international {
        format!("+{}", digits)
    } else {
        digits
    })
}

/// Lowercase the scheme and host, default to `https://`, drop a trailing `/`.
pub fn url(raw: &str) -> Option<String> {
    let raw = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')'));
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return None;
    }

    let lower = raw.to_ascii_lowercase();
    let (scheme, rest) = if lower.starts_with("https://") {
        ("https", &raw[8..])
    } else if lower.starts_with("http://") {
        ("http", &raw[7..])
    } else {
        ("https", raw)
    };

    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let host = rest[..host_end].to_ascii_lowercase();
    if !host.contains('.') || host.starts_with('.') {
        return None;
    }
    let path = rest[host_end..].trim_end_matches('/');
    Some(format!("{}://{}{}", scheme, host, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert_eq!(email(" Jane.Doe@Example.COM ").as_deref(), Some("jane.doe@example.com"));
        assert_eq!(email("mailto:a@b.io").as_deref(), Some("a@b.io"));
        assert!(email("not an email").is_none());
    }

    #[test]
    fn test_phone() {
        assert_eq!(phone("06 12 34 56 78").as_deref(), Some("0612345678"));
        assert_eq!(phone("+33 (0)6 12 34 56 78").as_deref(), Some("+33612345678"));
        assert_eq!(phone("0044 20 7946 0958").as_deref(), Some("+442079460958"));
        assert_eq!(phone("(555) 123-4567").as_deref(), Some("5551234567"));
        assert!(phone("12 34").is_none());
    }

    #[test]
    fn test_url() {
        assert_eq!(
            url("LinkedIn.com/in/jane-doe/").as_deref(),
            Some("https://linkedin.com/in/jane-doe")
        );
        assert_eq!(
            url("HTTP://GitHub.com/JaneDoe").as_deref(),
            Some("http://github.com/JaneDoe")
        );
        assert_eq!(url("www.jane.dev.").as_deref(), Some("https://www.jane.dev"));
        assert!(url("nohost").is_none());
    }

    #[test]
    fn test_contact_forms_are_stable() {
        for raw in ["+33 6 12 34 56 78", "0033612345678"] {
            let once = phone(raw).unwrap();
            assert_eq!(phone(&once).as_deref(), Some(once.as_str()));
        }
        let once = url("www.Example.org/path/").unwrap();
        assert_eq!(url(&once), Some(once.clone()));
        let once = email("A@B.IO").unwrap();
        assert_eq!(email(&once), Some(once.clone()));
    }
}
