//! Masking of personal data before it reaches log output.

use std::borrow::Cow;

use regex::Captures;

use crate::extract::patterns::{EMAIL, LINKEDIN, PHONE_FR, PHONE_INTL, PHONE_US, GITHUB};

fn mask_email(caps: &Captures<'_>) -> String {
    let email = &caps[0];
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

fn mask_phone(caps: &Captures<'_>) -> String {
    let digits: Vec<char> = caps[0].chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits[digits.len().saturating_sub(2)..].iter().collect();
    format!("{}{}", "*".repeat(digits.len().saturating_sub(2)), tail)
}

fn mask_profile(caps: &Captures<'_>) -> String {
    let url = &caps[0];
    match url.trim_end_matches('/').rsplit_once('/') {
        Some((base, _)) => format!("{}/***", base),
        None => "***".to_string(),
    }
}

/// Mask emails, phone numbers and profile URLs in `text`.
pub fn redact(text: &str) -> Cow<'_, str> {
    let mut out: Cow<'_, str> = Cow::Borrowed(text);
    for (regex, mask) in [
        (&*EMAIL, mask_email as fn(&Captures<'_>) -> String),
        (&*LINKEDIN, mask_profile),
        (&*GITHUB, mask_profile),
        (&*PHONE_FR, mask_phone),
        (&*PHONE_INTL, mask_phone),
        (&*PHONE_US, mask_phone),
    ] {
        if regex.is_match(&out) {
            out = Cow::Owned(regex.replace_all(&out, mask).into_owned());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_email() {
        assert_eq!(redact("mail: jane.doe@example.com"), "mail: j***@example.com");
    }

    #[test]
    fn test_redact_phone_keeps_last_digits() {
        assert_eq!(redact("06 12 34 56 78"), "********78");
    }

    #[test]
    fn test_redact_profile_url() {
        assert_eq!(redact("linkedin.com/in/jane-doe"), "linkedin.com/in/***");
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "Développeur Rust";
        assert!(matches!(redact(text), Cow::Borrowed(_)));
    }
}
