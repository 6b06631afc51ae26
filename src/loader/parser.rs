//! YAML parser for pipeline definitions
//!
//! Parses, validates and resolves pipeline YAML files.
//! Supports both the built-in pipeline (by name) and custom YAML files (by path).

use super::types::{
    Endpoint, EndpointDefinition, EndpointKind, IncrementalDefinition, PipelineConfig,
    PipelineDefinition,
};
use crate::connectors;
use crate::error::{Error, Result};
use crate::pagination::PaginationConfig;
use crate::path::Selector;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a pipeline from a built-in name or a file path
///
/// ```ignore
/// let pipeline = load_pipeline("pipedrive")?;
/// let custom = load_pipeline("./my-pipeline.yaml")?;
/// ```
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    // Built-in names have no separators and no YAML extension
    if !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.ends_with(".yaml")
        && !path_str.ends_with(".yml")
    {
        if let Some(yaml) = connectors::get_builtin(&path_str) {
            return load_pipeline_from_str(yaml);
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config(format!(
                "Pipeline '{}' not found. Built-in pipelines: {}. Or provide a path to a YAML file.",
                path.display(),
                connectors::list_builtin().join(", ")
            ))
        } else {
            Error::config(format!(
                "Failed to read pipeline file '{}': {e}",
                path.display()
            ))
        }
    })?;
    load_pipeline_from_str(&content)
}

/// Load a pipeline from a YAML string, resolving relative values against now
pub fn load_pipeline_from_str(yaml: &str) -> Result<PipelineConfig> {
    resolve_pipeline(parse_definition(yaml)?, Utc::now())
}

/// Parse YAML without validating
pub fn parse_definition(yaml: &str) -> Result<PipelineDefinition> {
    serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse pipeline YAML: {e}")))
}

/// Validate a definition and resolve it into a runnable configuration
pub fn resolve_pipeline(def: PipelineDefinition, now: DateTime<Utc>) -> Result<PipelineConfig> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Pipeline name cannot be empty"));
    }

    let base_url = url::Url::parse(&def.base_url)
        .map_err(|e| Error::invalid_value("base_url", format!("'{}': {e}", def.base_url)))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(Error::invalid_value(
            "base_url",
            format!("unsupported scheme '{}'", base_url.scheme()),
        ));
    }

    if def.endpoints.is_empty() {
        return Err(Error::config("Pipeline must have at least one endpoint"));
    }

    let names: HashSet<_> = def.endpoints.iter().map(|e| e.name.as_str()).collect();
    if names.len() != def.endpoints.len() {
        return Err(Error::config("Duplicate endpoint names found"));
    }

    if def.run.max_concurrency == 0 {
        return Err(Error::invalid_value("run.max_concurrency", "must be at least 1"));
    }
    if def.run.timeout_secs == Some(0) {
        return Err(Error::invalid_value("run.timeout_secs", "must be positive"));
    }
    if def.defaults.start_param.trim().is_empty() {
        return Err(Error::invalid_value("defaults.start_param", "cannot be empty"));
    }
    validate_pagination(&def.pagination, "pagination")?;

    let endpoints = def
        .endpoints
        .iter()
        .map(|endpoint| resolve_endpoint(&def, endpoint, now))
        .collect::<Result<Vec<_>>>()?;

    Ok(PipelineConfig {
        name: def.name,
        base_url: def.base_url,
        auth: def.auth,
        credential: def.credential,
        http: def.http,
        default_start_param: def.defaults.start_param,
        run: def.run,
        endpoints,
    })
}

fn resolve_endpoint(
    def: &PipelineDefinition,
    endpoint: &EndpointDefinition,
    now: DateTime<Utc>,
) -> Result<Endpoint> {
    let name = &endpoint.name;
    let field = |f: &str| format!("endpoints.{name}.{f}");

    if name.trim().is_empty() {
        return Err(Error::config("Endpoint name cannot be empty"));
    }
    if name.contains(['"', '\0']) {
        return Err(Error::invalid_value(field("name"), "contains characters not allowed in a table name"));
    }
    if endpoint.path.trim().is_empty() {
        return Err(Error::config(format!("Endpoint '{name}' path cannot be empty")));
    }

    let selector_raw = endpoint
        .data_selector
        .as_deref()
        .unwrap_or(&def.defaults.data_selector);
    let selector = Selector::parse(selector_raw)
        .map_err(|e| Error::invalid_value(field("data_selector"), e.to_string()))?;

    let primary_key = endpoint
        .primary_key
        .clone()
        .unwrap_or_else(|| def.defaults.primary_key.clone());
    if primary_key.is_empty() || primary_key.iter().any(|k| k.trim().is_empty()) {
        return Err(Error::invalid_value(field("primary_key"), "must name at least one field"));
    }

    let pagination = endpoint
        .pagination
        .clone()
        .unwrap_or_else(|| def.pagination.clone());
    validate_pagination(&pagination, &field("pagination"))?;

    let mut params = def.defaults.params.clone();
    params.extend(endpoint.params.clone());

    let kind = match &endpoint.incremental {
        None => EndpointKind::Plain,
        Some(inc) => resolve_incremental(inc, &def.defaults.start_param, now, &field("incremental"))?,
    };

    if let Some(rule) = kind.rule(&def.defaults.start_param) {
        if params.contains_key(&rule.start_param) {
            return Err(Error::invalid_value(
                field("incremental.start_param"),
                format!("'{}' is also a fixed query parameter", rule.start_param),
            ));
        }
        if let PaginationConfig::Cursor { cursor_param, .. } = &pagination {
            if *cursor_param == rule.start_param {
                return Err(Error::invalid_value(
                    field("incremental.start_param"),
                    format!("'{cursor_param}' is also the pagination cursor parameter"),
                ));
            }
        }
    }

    Ok(Endpoint {
        name: name.clone(),
        path: endpoint.path.trim().to_string(),
        params,
        selector,
        primary_key,
        write_disposition: endpoint
            .write_disposition
            .unwrap_or(def.defaults.write_disposition),
        pagination,
        kind,
    })
}

fn resolve_incremental(
    inc: &IncrementalDefinition,
    default_start_param: &str,
    now: DateTime<Utc>,
    field: &str,
) -> Result<EndpointKind> {
    if inc.cursor_path.trim().is_empty() {
        return Err(Error::invalid_value(format!("{field}.cursor_path"), "cannot be empty"));
    }

    let initial_value = inc.initial_value.resolve(now);
    if initial_value.trim().is_empty() {
        return Err(Error::invalid_value(format!("{field}.initial_value"), "cannot be empty"));
    }

    let cursor_path = inc.cursor_path.trim().to_string();
    match inc.start_param.as_deref().map(str::trim) {
        Some("") => Err(Error::invalid_value(format!("{field}.start_param"), "cannot be empty")),
        Some(param) if param != default_start_param => Ok(EndpointKind::SinceTimestampIncremental {
            cursor_path,
            initial_value,
            start_param: param.to_string(),
            filter_stale: inc.filter_stale,
        }),
        _ => Ok(EndpointKind::TimestampIncremental {
            cursor_path,
            initial_value,
            filter_stale: inc.filter_stale,
        }),
    }
}

fn validate_pagination(pagination: &PaginationConfig, field: &str) -> Result<()> {
    if let PaginationConfig::Cursor {
        cursor_param,
        cursor_path,
    } = pagination
    {
        if cursor_param.trim().is_empty() {
            return Err(Error::invalid_value(format!("{field}.cursor_param"), "cannot be empty"));
        }
        if cursor_path.trim().is_empty() {
            return Err(Error::invalid_value(format!("{field}.cursor_path"), "cannot be empty"));
        }
    }
    Ok(())
}
