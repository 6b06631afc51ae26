//! Run reports
//!
//! One [`EndpointReport`] per endpoint, collected into a [`RunReport`] that
//! renders either as an aligned text table or as JSON.

use crate::error::{Error, FailureKind, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

/// Final state of an endpoint run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Why an endpoint failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl From<&Error> for Failure {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Result of one endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    /// Endpoint (and table) name
    pub endpoint: String,
    pub outcome: Outcome,
    /// Rows written to the destination
    pub rows_loaded: u64,
    /// Records skipped because their cursor was below the starting watermark
    pub dropped_stale: u64,
    /// Records loaded without a usable cursor value
    pub non_comparable: u64,
    pub pages: u32,
    /// Watermark the run started from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_before: Option<String>,
    /// Watermark stored after the run (unchanged on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    pub duration_ms: u64,
}

impl EndpointReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub endpoints: Vec<EndpointReport>,
}

impl RunReport {
    /// Report for a named endpoint
    pub fn endpoint(&self, name: &str) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|e| e.endpoint == name)
    }

    pub fn completed(&self) -> usize {
        self.endpoints.iter().filter(|e| e.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.endpoints.len() - self.completed()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Total rows written across endpoints
    pub fn total_rows(&self) -> u64 {
        self.endpoints.iter().map(|e| e.rows_loaded).sum()
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Aligned text table followed by one line per failure
    pub fn render_table(&self) -> String {
        let headers = [
            "ENDPOINT", "OUTCOME", "ROWS", "STALE", "PAGES", "WATERMARK BEFORE", "WATERMARK AFTER",
        ];
        let rows: Vec<[String; 7]> = self
            .endpoints
            .iter()
            .map(|e| {
                [
                    e.endpoint.clone(),
                    e.outcome.to_string(),
                    e.rows_loaded.to_string(),
                    e.dropped_stale.to_string(),
                    e.pages.to_string(),
                    e.watermark_before.clone().unwrap_or_else(|| "-".to_string()),
                    e.watermark_after.clone().unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();

        let mut widths = headers.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let mut out = String::new();
        let mut push_line = |cells: &[&str]| {
            let line: Vec<String> = cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            let _ = writeln!(out, "{}", line.join("  ").trim_end());
        };

        push_line(&headers);
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            push_line(&cells);
        }

        for e in &self.endpoints {
            if let Some(failure) = &e.failure {
                let _ = writeln!(out, "\n{} failed ({}): {}", e.endpoint, failure.kind, failure.reason);
            }
        }

        let _ = write!(
            out,
            "\n{} completed, {} failed, {} rows",
            self.completed(),
            self.failed(),
            self.total_rows()
        );
        out
    }
}
