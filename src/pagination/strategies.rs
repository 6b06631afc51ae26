//! Pagination strategy implementations

use super::types::{NextPage, PaginationConfig, PaginationState, Paginator};
use crate::error::{Error, Result};
use crate::path::{self, type_name, Lookup};
use crate::types::scalar_to_string;
use serde_json::Value;
use std::collections::BTreeMap;

/// Build the paginator described by a config
pub fn from_config(config: &PaginationConfig) -> Box<dyn Paginator> {
    match config {
        PaginationConfig::Single => Box::new(SinglePagePaginator),
        PaginationConfig::Cursor {
            cursor_param,
            cursor_path,
        } => Box::new(CursorPaginator::new(cursor_param, cursor_path)),
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination.
///
/// Reads the next-page token from a fixed path in the response envelope
/// (Pipedrive: `additional_data.pagination.next_start`) and sends it back
/// under `cursor_param` (`start`). A null, absent or empty token ends
/// pagination.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter name for cursor
    pub cursor_param: String,
    /// Dotted path to extract cursor from response
    pub cursor_path: String,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
        }
    }
}

impl Paginator for CursorPaginator {
    fn request_params(&self, state: &PaginationState) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if let Some(cursor) = &state.cursor {
            params.insert(self.cursor_param.clone(), cursor.clone());
        }
        params
    }

    fn process_response(&self, body: &Value, state: &mut PaginationState) -> Result<NextPage> {
        let token = match path::lookup(body, &self.cursor_path) {
            Lookup::Missing | Lookup::Null => None,
            Lookup::Found(value) => match scalar_to_string(value) {
                Some(token) => Some(token),
                None => {
                    return Err(Error::data_shape(
                        &self.cursor_path,
                        format!("next-page token must be a scalar, found {}", type_name(value)),
                    ))
                }
            },
        };

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            state.mark_done();
            return Ok(NextPage::Done);
        };

        if state.cursor.as_deref() == Some(token.as_str()) {
            state.mark_done();
            return Err(Error::data_shape(
                &self.cursor_path,
                format!("next-page token '{token}' repeated; pagination is not advancing"),
            ));
        }

        state.set_cursor(token.clone());
        Ok(NextPage::with_param(&self.cursor_param, token))
    }
}

// ============================================================================
// Single Page
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct SinglePagePaginator;

impl Paginator for SinglePagePaginator {
    fn request_params(&self, _state: &PaginationState) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn process_response(&self, _body: &Value, state: &mut PaginationState) -> Result<NextPage> {
        state.mark_done();
        Ok(NextPage::Done)
    }
}
