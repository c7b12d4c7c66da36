//! Coercion helpers normalizing heterogeneous AI output into typed values.
//!
//! The extractor returns whatever the documents contain: numbers as strings
//! with French decimal commas and currency symbols, dates in `DD/MM/YYYY`,
//! energy classes buried in sentences. These functions are total: they
//! return `None` instead of failing.

use chrono::NaiveDate;
use serde_json::Value;

/// Interpret a JSON value as a finite number.
///
/// Empty strings, nulls, and missing values are absent. Strings tolerate
/// currency symbols, spacing (including non-breaking spaces from PDF text),
/// and a decimal comma.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            let cleaned: String = trimmed
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '€')
                .collect();
            let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
                cleaned.replace(',', ".")
            } else {
                cleaned
            };
            normalized.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Interpret a JSON value as an ISO `YYYY-MM-DD` date string.
///
/// `YYYY-MM-DD` passes through unchanged; `DD/MM/YYYY` is reordered; other
/// common shapes (dotted or dashed day-first dates, RFC 3339 timestamps) are
/// parsed and reduced to their date portion.
pub fn to_iso_date(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }

    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return Some(raw.to_string());
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }

    for format in ["%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    if let Ok(timestamp) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive().format("%Y-%m-%d").to_string());
    }

    None
}

/// Extract a single uppercase energy-class letter A–G.
///
/// An exact single-letter string wins; otherwise the first standalone A–G
/// token ("Classe C" → 'C'); otherwise the first A–G character anywhere in
/// the string. The last pass is knowingly lossy; it matches the historical
/// behavior callers rely on, and only fires on strings without a clean token.
pub fn to_energy_class_letter(value: &Value) -> Option<char> {
    let raw = value.as_str()?.trim();

    if raw.len() == 1 {
        let letter = raw.chars().next()?.to_ascii_uppercase();
        return ('A'..='G').contains(&letter).then_some(letter);
    }

    let standalone = raw
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() == 1)
        .filter_map(|token| token.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .find(|c| ('A'..='G').contains(c));
    if standalone.is_some() {
        return standalone;
    }

    raw.chars().find(|c| ('A'..='G').contains(c))
}
