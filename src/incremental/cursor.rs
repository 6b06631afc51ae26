//! Cursor value comparison

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// Formats accepted for naive timestamps, most common first
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Timestamp(NaiveDateTime),
    Number(f64),
    Text,
}

/// A cursor value as seen in a record or in saved state.
///
/// The raw text is kept as-is so it can be sent back to the API and stored
/// unchanged. Ordering depends on what the text looks like: timestamps
/// compare chronologically, numbers numerically, anything else as text.
/// Two values of different kinds compare as text.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorValue {
    raw: String,
    kind: Kind,
}

impl CursorValue {
    /// Classify a raw cursor string
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = classify(raw.trim());
        Self { raw, kind }
    }

    /// The text as received
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the value parsed as a timestamp
    pub fn is_timestamp(&self) -> bool {
        matches!(self.kind, Kind::Timestamp(_))
    }

    /// Compare two cursor values
    pub fn compare(&self, other: &Self) -> Ordering {
        match (&self.kind, &other.kind) {
            (Kind::Timestamp(a), Kind::Timestamp(b)) => a.cmp(b),
            (Kind::Number(a), Kind::Number(b)) => a.total_cmp(b),
            _ => self.raw.cmp(&other.raw),
        }
    }
}

impl std::fmt::Display for CursorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn classify(text: &str) -> Kind {
    if let Some(ts) = parse_timestamp(text) {
        return Kind::Timestamp(ts);
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Kind::Number(n),
        _ => Kind::Text,
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
