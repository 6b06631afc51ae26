//! State types for tracking extraction progress
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

/// Complete state for a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Per-endpoint state, keyed by endpoint name
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointState>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            endpoints: BTreeMap::new(),
        }
    }
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for an endpoint
    pub fn get_endpoint(&self, endpoint: &str) -> Option<&EndpointState> {
        self.endpoints.get(endpoint)
    }

    /// Get mutable state for an endpoint, creating if needed
    pub fn get_endpoint_mut(&mut self, endpoint: &str) -> &mut EndpointState {
        self.endpoints.entry(endpoint.to_string()).or_default()
    }

    /// Saved watermark for an endpoint
    pub fn watermark(&self, endpoint: &str) -> Option<&str> {
        self.endpoints.get(endpoint)?.watermark.as_deref()
    }
}

/// State for a single endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointState {
    /// Highest cursor value committed by a successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,

    /// When the endpoint last completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,

    /// Rows loaded by the last successful run
    #[serde(default)]
    pub rows_loaded: u64,
}

impl EndpointState {
    /// Record a successful run
    pub fn mark_success(&mut self, rows: u64) {
        self.last_success_at = Some(Utc::now());
        self.rows_loaded = rows;
    }
}
