// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # pipedrive-extract
//!
//! Incremental extraction of Pipedrive CRM endpoints into DuckDB tables.
//!
//! A pipeline is a YAML definition listing endpoints. Each endpoint is
//! fetched page by page through the Pipedrive cursor (`start` /
//! `additional_data.pagination.next_start`), its records are upserted into a
//! table named after the endpoint, and incremental endpoints remember the
//! highest cursor value they loaded so the next run asks only for newer
//! records.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipedrive_extract::{
//!     engine::Extractor, load_pipeline, sink::DuckDbSink, state::StateManager,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = load_pipeline("pipedrive")?;
//! let credential = pipeline.credential.resolve()?;
//! let extractor = Extractor::for_pipeline(
//!     &pipeline,
//!     Some(credential),
//!     StateManager::from_file("state.json")?,
//!     Arc::new(DuckDbSink::open("pipedrive.duckdb")?),
//! )?;
//!
//! let report = extractor
//!     .run(&pipeline.name, &pipeline.endpoints, &CancellationToken::new())
//!     .await;
//! println!("{}", report.render_table());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  loader (YAML)  →  Extractor::run  →  RunReport               │
//! └───────────────────────────────────────────────────────────────┘
//!                               │ per endpoint
//! ┌──────────┬───────────┬──────┴───────┬──────────────┬──────────┐
//! │   Auth   │   HTTP    │  Pagination  │  Incremental │   Sink   │
//! ├──────────┼───────────┼──────────────┼──────────────┼──────────┤
//! │ API key  │ Retry     │ Cursor       │ Watermark    │ DuckDB   │
//! │ Bearer   │ Rate limit│ Single page  │ Stale filter │ Memory   │
//! └──────────┴───────────┴──────────────┴──────────────┴──────────┘
//!                               │
//!                        state (JSON file)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Dotted JSON paths and item selectors
pub mod path;

/// Request authentication
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Cursor pagination
pub mod pagination;

/// Watermarks and cursor comparison
pub mod incremental;

/// Persisted watermarks
pub mod state;

/// Destination tables
pub mod sink;

/// Extraction engine
pub mod engine;

/// Run reports
pub mod report;

/// YAML loader for pipeline definitions
pub mod loader;

/// Built-in pipeline definitions
pub mod connectors;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use engine::Extractor;
pub use loader::{load_pipeline, load_pipeline_from_str, Endpoint, PipelineConfig};
pub use report::{EndpointReport, Outcome, RunReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
