//! Engine types
//!
//! Run settings and the per-endpoint lifecycle.

use crate::error::Error;
use crate::report::{EndpointReport, Failure, Outcome};
use std::time::Duration;

/// Configuration for an extraction run
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Endpoints extracted at the same time
    pub max_concurrency: usize,
    /// Abort endpoints still running after this long
    pub timeout: Option<Duration>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            timeout: None,
        }
    }
}

impl ExtractConfig {
    /// Create a new config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max concurrency (at least 1)
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set run timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Where an endpoint is in its run.
///
/// `NotStarted -> Fetching -> Fetching ... -> Completed | Failed`. Terminal
/// phases never change again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    NotStarted,
    /// Waiting on the page requested with this token (`None` for the first)
    Fetching { page_token: Option<String> },
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Move to fetching the page behind `next_token`.
    ///
    /// Returns false (and stays put) when the phase is already terminal.
    pub fn fetch(&mut self, next_token: Option<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = Self::Fetching {
            page_token: next_token,
        };
        true
    }

    /// Finish successfully; only valid while fetching
    pub fn complete(&mut self) -> bool {
        if !matches!(self, Self::Fetching { .. }) {
            return false;
        }
        *self = Self::Completed;
        true
    }

    /// Fail from any non-terminal phase
    pub fn fail(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = Self::Failed;
        true
    }
}

/// Counters for one endpoint run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// Pages fetched
    pub pages: u32,
    /// Records returned by the API
    pub records_seen: u64,
    /// Rows written to the destination
    pub rows_loaded: u64,
    /// Records dropped below the starting watermark
    pub dropped_stale: u64,
    /// Records without a usable cursor
    pub non_comparable: u64,
}

/// Mutable progress of one endpoint, readable even after the run was aborted
#[derive(Debug, Clone, Default)]
pub struct EndpointRun {
    pub endpoint: String,
    pub phase: RunPhase,
    pub stats: EndpointStats,
    pub watermark_before: Option<String>,
    pub watermark_after: Option<String>,
}

impl EndpointRun {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Turn the finished run into a report line
    pub fn into_report(self, error: Option<&Error>, duration: Duration) -> EndpointReport {
        let outcome = if self.phase == RunPhase::Completed {
            Outcome::Completed
        } else {
            Outcome::Failed
        };

        EndpointReport {
            endpoint: self.endpoint,
            outcome,
            rows_loaded: self.stats.rows_loaded,
            dropped_stale: self.stats.dropped_stale,
            non_comparable: self.stats.non_comparable,
            pages: self.stats.pages,
            watermark_before: self.watermark_before.clone(),
            watermark_after: match outcome {
                Outcome::Completed => self.watermark_after,
                Outcome::Failed => self.watermark_before,
            },
            failure: error.map(Failure::from),
            duration_ms: duration.as_millis() as u64,
        }
    }
}
