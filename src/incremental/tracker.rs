//! Watermark tracking for one endpoint run

use super::cursor::CursorValue;
use crate::error::{Error, Result};
use crate::path::{self, type_name, Lookup};
use crate::types::scalar_to_string;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// How an incremental endpoint filters and advances
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncrementalRule {
    /// Dotted path to the cursor field in each record (e.g. `update_time`)
    pub cursor_path: String,
    /// Query parameter that carries the starting watermark
    pub start_param: String,
    /// Watermark used when nothing has been saved yet
    pub initial_value: String,
    /// Drop records whose cursor is below the starting watermark
    pub filter_stale: bool,
}

impl IncrementalRule {
    /// Create a rule with client-side filtering on
    pub fn new(
        cursor_path: impl Into<String>,
        start_param: impl Into<String>,
        initial_value: impl Into<String>,
    ) -> Self {
        Self {
            cursor_path: cursor_path.into(),
            start_param: start_param.into(),
            initial_value: initial_value.into(),
            filter_stale: true,
        }
    }

    /// Turn client-side filtering on or off
    #[must_use]
    pub fn with_filter(mut self, filter_stale: bool) -> Self {
        self.filter_stale = filter_stale;
        self
    }

    /// The watermark a run starts from: the saved one, else the initial value
    pub fn starting_value<'a>(&'a self, saved: Option<&'a str>) -> &'a str {
        saved.unwrap_or(&self.initial_value)
    }
}

/// Verdict on a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Load the record; its cursor took part in the running maximum
    Keep,
    /// Cursor is below the starting watermark; skip the record
    DropStale,
    /// Cursor is null or missing; load the record, ignore it for the maximum
    NonComparable,
}

impl Admission {
    /// Should the record be written to the destination?
    pub fn is_loaded(self) -> bool {
        !matches!(self, Admission::DropStale)
    }
}

/// Counters kept while observing records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub kept: u64,
    pub dropped_stale: u64,
    pub non_comparable: u64,
}

/// Running maximum of the cursor field over one endpoint run
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    cursor_path: String,
    filter_stale: bool,
    start: CursorValue,
    max_seen: Option<CursorValue>,
    stats: TrackerStats,
}

impl WatermarkTracker {
    /// Start tracking from `start`, the watermark sent with the first request
    pub fn new(rule: &IncrementalRule, start: &str) -> Self {
        Self {
            cursor_path: rule.cursor_path.clone(),
            filter_stale: rule.filter_stale,
            start: CursorValue::parse(start),
            max_seen: None,
            stats: TrackerStats::default(),
        }
    }

    /// The starting watermark
    pub fn start(&self) -> &str {
        self.start.as_str()
    }

    /// Highest cursor seen so far among loaded records
    pub fn max_seen(&self) -> Option<&str> {
        self.max_seen.as_ref().map(CursorValue::as_str)
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Inspect a record's cursor and decide whether to load it.
    ///
    /// Fails when the cursor resolves to an object or array.
    pub fn observe(&mut self, record: &Value) -> Result<Admission> {
        let raw = match path::lookup(record, &self.cursor_path) {
            Lookup::Missing | Lookup::Null => {
                self.stats.non_comparable += 1;
                return Ok(Admission::NonComparable);
            }
            Lookup::Found(value) => scalar_to_string(value).ok_or_else(|| {
                Error::data_shape(
                    &self.cursor_path,
                    format!("cursor must be a scalar, found {}", type_name(value)),
                )
            })?,
        };

        let value = CursorValue::parse(raw);
        if self.filter_stale && value.compare(&self.start) == Ordering::Less {
            self.stats.dropped_stale += 1;
            return Ok(Admission::DropStale);
        }

        let advances = self
            .max_seen
            .as_ref()
            .map_or(true, |max| value.compare(max) == Ordering::Greater);
        if advances {
            self.max_seen = Some(value);
        }
        self.stats.kept += 1;
        Ok(Admission::Keep)
    }

    /// Watermark to commit after a successful run.
    ///
    /// The greater of the starting watermark and the highest cursor seen,
    /// so committing it never moves the watermark backwards.
    pub fn finish(&self) -> String {
        match &self.max_seen {
            Some(max) if max.compare(&self.start) == Ordering::Greater => max.as_str().to_string(),
            _ => self.start.as_str().to_string(),
        }
    }
}
