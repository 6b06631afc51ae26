//! State management module
//!
//! Persists one watermark per endpoint between runs, together with a little
//! bookkeeping about the last successful run.
//!
//! # Overview
//!
//! - `State` - per-endpoint state, serialized as JSON
//! - `StateManager` - shared handle with atomic file persistence
//!
//! Watermarks only ever move forward: committing a value lower than the
//! stored one keeps the stored one.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{EndpointState, State};
