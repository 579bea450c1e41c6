//! Common regex patterns for résumé field extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Contact details
    pub static ref EMAIL: Regex = Regex::new(
        r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b"
    ).unwrap();

    pub static ref EMAIL_STRICT: Regex = Regex::new(
        r"(?i)^[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}$"
    ).unwrap();

    // French numbers: 06 12 34 56 78, +33 6 12 34 56 78, 0033 6 ...
    pub static ref PHONE_FR: Regex = Regex::new(
        r"(?:\+33\s?(?:\(0\)\s?)?|0033\s?|\b0)[1-9](?:[\s.-]?\d{2}){4}\b"
    ).unwrap();

    pub static ref PHONE_INTL: Regex = Regex::new(
        r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,4}){2,4}\b"
    ).unwrap();

    pub static ref PHONE_US: Regex = Regex::new(
        r"\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b"
    ).unwrap();

    // Web profiles
    pub static ref LINKEDIN: Regex = Regex::new(
        r"(?i)\b(?:https?://)?(?:[a-z]{2,3}\.)?linkedin\.com/(?:in|pub)/[\w%-]+/?"
    ).unwrap();

    pub static ref GITHUB: Regex = Regex::new(
        r"(?i)\b(?:https?://)?(?:www\.)?github\.com/[\w-]+/?"
    ).unwrap();

    pub static ref WEBSITE: Regex = Regex::new(
        r"(?i)\b(?:https?://|www\.)[\w.-]+\.[a-z]{2,}(?:/[\w./%?=&#~+-]*)?"
    ).unwrap();

    // Location
    pub static ref POSTAL_CITY: Regex = Regex::new(
        r"\b(\d{4,5})\s+([A-ZÀ-Ý][\w'’-]*(?:[\s-][A-ZÀ-Ý][\w'’-]*)*)"
    ).unwrap();

    // Labelled values: "Nom : Jane Doe"
    pub static ref LABELLED: Regex = Regex::new(
        r"^\s*([^:]{2,30}?)\s*:\s*(.+?)\s*$"
    ).unwrap();

    // Language levels
    pub static ref CEFR: Regex = Regex::new(
        r"\b([ABC][12])\b"
    ).unwrap();

    // List item separators and bullets
    pub static ref ITEM_SEPARATOR: Regex = Regex::new(
        r"\s*(?:[,;•·|▪●◦]|\s-\s|\s–\s)\s*"
    ).unwrap();

    pub static ref LEADING_BULLET: Regex = Regex::new(
        r"^\s*(?:[-–—•·▪●◦*>✓✔]|\d{1,2}[.)])\s*"
    ).unwrap();

    // Job line splitters: "Title - Company", "Title | Company", "Title, Company"
    pub static ref JOB_SPLIT: Regex = Regex::new(
        r"\s+[-–—|]\s+|\s*[|,]\s*"
    ).unwrap();

    // A capitalized personal name: 2-4 words, optionally with an uppercase surname
    pub static ref NAME_LINE: Regex = Regex::new(
        r"^(?:[A-ZÀ-Ý][a-zà-ÿ'’]+(?:-[A-ZÀ-Ý][a-zà-ÿ'’]+)?|[A-ZÀ-Ý]{2,}(?:-[A-ZÀ-Ý]{2,})?)(?:\s+(?:[A-ZÀ-Ý][a-zà-ÿ'’]+(?:-[A-ZÀ-Ý][a-zà-ÿ'’]+)?|[A-ZÀ-Ý]{2,}(?:-[A-ZÀ-Ý]{2,})?|de|du|van|von|der|da|di|del|le|la)){1,3}$"
    ).unwrap();

    pub static ref DIGIT: Regex = Regex::new(r"\d").unwrap();
}

/// Count of digits in a candidate phone number.
pub fn digit_count(text: &str) -> usize {
    text.chars().filter(char::is_ascii_digit).count()
}
