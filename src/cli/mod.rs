//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Extract endpoints into DuckDB
//! - `validate` - Check a pipeline definition
//! - `endpoints` - List endpoints
//! - `state show` / `state reset` - Inspect or reset watermarks

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, StateAction};
pub use runner::Runner;
