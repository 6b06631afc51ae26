//! YAML Loader module
//!
//! Parse pipeline definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `PipelineDefinition` - the YAML file as written
//! - `PipelineConfig` / `Endpoint` - validated, resolved configuration
//! - `EndpointKind` - one variant per endpoint shape
//!
//! Every check happens at load time; a pipeline that loads can run.

mod parser;
mod types;

pub use parser::{load_pipeline, load_pipeline_from_str, parse_definition, resolve_pipeline};
pub use types::{
    CredentialSource, Endpoint, EndpointDefaults, EndpointDefinition, EndpointKind,
    HttpDefinition, IncrementalDefinition, InitialValue, PipelineConfig, PipelineDefinition,
    RunDefinition, DEFAULT_CREDENTIAL_ENV, TIMESTAMP_FORMAT,
};

#[cfg(test)]
mod tests;
