//! Decides which cell values are worth sending to the translation backend.
//!
//! Numbers, ISO dates, very short tokens and code-like strings (IDs, SKUs,
//! punctuation) are passed through untouched without consuming a request.

use regex::Regex;
use std::sync::OnceLock;

/// Minimum share of alphabetic characters for a value to be translated
pub const MIN_ALPHA_RATIO: f64 = 0.3;

static ISO_DATE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Returns `false` for values that must be left as they are.
pub fn should_translate(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return false;
    }

    if is_numeric(trimmed) {
        return false;
    }

    let iso_date = ISO_DATE_REGEX.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
    if iso_date.is_match(trimmed) {
        return false;
    }

    let total = trimmed.chars().count();
    if total < 2 {
        return false;
    }

    let alphabetic = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    (alphabetic as f64 / total as f64) >= MIN_ALPHA_RATIO
}

/// Digits plus `.`/`,` separators only
fn is_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}
