//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available with these parameters
    Continue {
        /// Query parameters to add/replace on the next request
        query_params: BTreeMap<String, String>,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with a single parameter
    pub fn with_param(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut query_params = BTreeMap::new();
        query_params.insert(key.into(), value.into());
        Self::Continue { query_params }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }
}

/// Configuration for pagination behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    /// One request, no continuation
    Single,

    /// Next-page token read from the response envelope
    Cursor {
        /// Query parameter that carries the token (e.g. `start`)
        cursor_param: String,
        /// Dotted path to the token in the response
        /// (e.g. `additional_data.pagination.next_start`)
        cursor_path: String,
    },
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::Cursor {
            cursor_param: "start".to_string(),
            cursor_path: "additional_data.pagination.next_start".to_string(),
        }
    }
}

impl PaginationConfig {
    /// Create cursor pagination config
    pub fn cursor(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self::Cursor {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
        }
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Number of pages fetched so far
    pub pages: u32,
    /// Token for the next request (None before the first continuation)
    pub cursor: Option<String>,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record a fetched page
    pub fn add_page(&mut self, records: usize) {
        self.pages += 1;
        self.total_fetched += records as u64;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Query parameters for the next request, given the current state
    fn request_params(&self, state: &PaginationState) -> BTreeMap<String, String>;

    /// Process a response and determine if there's a next page.
    ///
    /// Updates `state` (cursor, done flag); fails when the envelope is not
    /// shaped the way the strategy expects.
    fn process_response(&self, body: &Value, state: &mut PaginationState) -> Result<NextPage>;
}
