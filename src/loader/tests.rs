//! Tests for the pipeline loader

use super::*;
use crate::auth::{AuthConfig, Location};
use crate::error::Error;
use crate::pagination::PaginationConfig;
use crate::types::WriteDisposition;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const MINIMAL: &str = r#"
name: test
base_url: https://api.example.com/v1/
endpoints:
  - name: stages
    path: stages
"#;

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
}

fn resolve(yaml: &str) -> crate::error::Result<PipelineConfig> {
    resolve_pipeline(parse_definition(yaml)?, fixed_now())
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_minimal_pipeline_defaults() {
    let pipeline = resolve(MINIMAL).unwrap();
    assert_eq!(pipeline.auth, AuthConfig::default());
    assert_eq!(
        pipeline.credential,
        CredentialSource::Env(DEFAULT_CREDENTIAL_ENV.to_string())
    );
    assert_eq!(pipeline.default_start_param, "since");
    assert_eq!(pipeline.run.max_concurrency, 4);

    let stages = pipeline.endpoint("stages").unwrap();
    assert_eq!(stages.primary_key, vec!["id".to_string()]);
    assert_eq!(stages.write_disposition, WriteDisposition::Merge);
    assert_eq!(stages.selector.as_str(), "data.*");
    assert_eq!(stages.params.get("limit").map(String::as_str), Some("100"));
    assert_eq!(stages.pagination, PaginationConfig::default());
    assert_eq!(stages.kind, EndpointKind::Plain);
    assert!(!stages.is_incremental());
}

#[test]
fn test_http_definition_to_client_config() {
    let pipeline = resolve(
        r#"
name: test
base_url: https://api.example.com/v1/
http:
  timeout_secs: 5
  max_retries: 1
  rate_limit: null
  user_agent: custom/1.0
  headers:
    Accept: application/json
endpoints:
  - name: stages
    path: stages
"#,
    )
    .unwrap();

    let config = pipeline.http.client_config(&pipeline.base_url);
    assert_eq!(config.base_url.as_deref(), Some("https://api.example.com/v1/"));
    assert_eq!(config.timeout, std::time::Duration::from_secs(5));
    assert_eq!(config.max_retries, 1);
    assert!(config.rate_limit.is_none());
    assert_eq!(config.user_agent, "custom/1.0");
}

// ============================================================================
// Endpoint shapes
// ============================================================================

#[test]
fn test_endpoint_kinds() {
    let pipeline = resolve(
        r#"
name: test
base_url: https://api.example.com/v1/
endpoints:
  - name: deals
    path: deals
    incremental:
      cursor_path: update_time
      initial_value: "2024-01-01 00:00:00"
  - name: recent_notes
    path: recents
    params:
      items: note
    incremental:
      start_param: since_timestamp
      cursor_path: data.update_time
      initial_value:
        days_ago: 30
      filter_stale: false
"#,
    )
    .unwrap();

    let deals = pipeline.endpoint("deals").unwrap();
    assert_eq!(
        deals.kind,
        EndpointKind::TimestampIncremental {
            cursor_path: "update_time".to_string(),
            initial_value: "2024-01-01 00:00:00".to_string(),
            filter_stale: true,
        }
    );
    let rule = pipeline.rule_for(deals).unwrap();
    assert_eq!(rule.start_param, "since");

    let notes = pipeline.endpoint("recent_notes").unwrap();
    assert_eq!(
        notes.kind,
        EndpointKind::SinceTimestampIncremental {
            cursor_path: "data.update_time".to_string(),
            initial_value: "2024-03-01 12:00:00".to_string(),
            start_param: "since_timestamp".to_string(),
            filter_stale: false,
        }
    );
    assert_eq!(notes.params.get("items").map(String::as_str), Some("note"));
    assert_eq!(notes.params.get("limit").map(String::as_str), Some("100"));
    assert_eq!(pipeline.rule_for(notes).unwrap().start_param, "since_timestamp");
}

#[test]
fn test_start_param_equal_to_default_is_timestamp_kind() {
    let pipeline = resolve(
        r#"
name: test
base_url: https://api.example.com/v1/
endpoints:
  - name: deals
    path: deals
    incremental:
      cursor_path: update_time
      start_param: since
      initial_value: "2024-01-01"
"#,
    )
    .unwrap();
    assert!(matches!(
        pipeline.endpoints[0].kind,
        EndpointKind::TimestampIncremental { .. }
    ));
}

#[test]
fn test_initial_value_resolution() {
    assert_eq!(
        InitialValue::Relative { days_ago: 30 }.resolve(fixed_now()),
        "2024-03-01 12:00:00"
    );
    assert_eq!(
        InitialValue::Literal("2020-01-01 00:00:00".to_string()).resolve(fixed_now()),
        "2020-01-01 00:00:00"
    );
}

#[test]
fn test_overrides_and_composite_key() {
    let pipeline = resolve(
        r#"
name: test
base_url: https://api.example.com/v1/
defaults:
  write_disposition: append
endpoints:
  - name: notes
    path: recents
    data_selector: data
    primary_key: [item, id]
    write_disposition: replace
    pagination:
      type: single
"#,
    )
    .unwrap();

    let notes = &pipeline.endpoints[0];
    assert_eq!(notes.primary_key, vec!["item".to_string(), "id".to_string()]);
    assert_eq!(notes.write_disposition, WriteDisposition::Replace);
    assert_eq!(notes.pagination, PaginationConfig::Single);
    assert_eq!(
        notes.selector.select(&json!({"data": {"id": 1}})).unwrap(),
        vec![json!({"id": 1})]
    );
}

#[test]
fn test_auth_header_config() {
    let pipeline = resolve(
        r#"
name: test
base_url: https://api.example.com/v1/
auth:
  type: api_key
  name: x-api-token
  location: header
credential:
  file: /run/secrets/token
endpoints:
  - name: stages
    path: stages
"#,
    )
    .unwrap();

    assert_eq!(
        pipeline.auth,
        AuthConfig::ApiKey {
            name: "x-api-token".to_string(),
            location: Location::Header,
        }
    );
    assert_eq!(pipeline.credential.to_string(), "file:/run/secrets/token");
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_select_endpoints() {
    let pipeline = resolve(
        r#"
name: test
base_url: https://api.example.com/v1/
endpoints:
  - name: a
    path: a
  - name: b
    path: b
"#,
    )
    .unwrap();

    assert_eq!(pipeline.select(&[]).unwrap().len(), 2);
    let picked = pipeline.select(&["b".to_string()]).unwrap();
    assert_eq!(picked[0].name, "b");

    let err = pipeline.select(&["zzz".to_string()]).unwrap_err();
    assert!(err.to_string().contains("Available: a, b"));
}

// ============================================================================
// Validation
// ============================================================================

#[test_case::test_case(
    "name: ''\nbase_url: https://x/\nendpoints: [{name: a, path: a}]" ; "empty name"
)]
#[test_case::test_case(
    "name: t\nbase_url: not a url\nendpoints: [{name: a, path: a}]" ; "bad base url"
)]
#[test_case::test_case(
    "name: t\nbase_url: ftp://x/\nendpoints: [{name: a, path: a}]" ; "bad scheme"
)]
#[test_case::test_case("name: t\nbase_url: https://x/\nendpoints: []" ; "no endpoints")]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a}, {name: a, path: b}]" ; "duplicate names"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: ''}]" ; "empty path"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a, data_selector: 'data.*.x'}]" ; "bad selector"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a, primary_key: []}]" ; "empty primary key"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nrun: {max_concurrency: 0}\nendpoints: [{name: a, path: a}]" ; "zero concurrency"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a, incremental: {cursor_path: '', initial_value: x}}]" ; "empty cursor path"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a, incremental: {cursor_path: t, initial_value: x, start_param: start}}]" ; "start param clashes with cursor param"
)]
#[test_case::test_case(
    "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a, params: {since: x}, incremental: {cursor_path: t, initial_value: x}}]" ; "start param clashes with fixed param"
)]
fn test_invalid_pipelines(yaml: &str) {
    assert!(resolve(yaml).is_err(), "expected rejection of:\n{yaml}");
}

#[test]
fn test_non_scalar_param_rejected() {
    let err = parse_definition(
        "name: t\nbase_url: https://x/\nendpoints: [{name: a, path: a, params: {items: [1, 2]}}]",
    )
    .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

// ============================================================================
// File / built-in loading
// ============================================================================

#[test]
fn test_load_builtin_pipedrive() {
    let pipeline = load_pipeline("pipedrive").unwrap();
    assert_eq!(pipeline.base_url, "https://api.pipedrive.com/v1/");
    assert_eq!(pipeline.endpoints.len(), 17);

    let names = pipeline.endpoint_names();
    for expected in [
        "currencies",
        "activity_types",
        "filters",
        "stages",
        "pipelines",
        "deals",
        "organizations",
        "persons",
        "products",
        "recent_notes",
        "recent_users",
        "recent_activities",
        "recent_deals",
        "recent_files",
        "recent_organizations",
        "recent_persons",
        "recent_products",
    ] {
        assert!(names.contains(&expected), "missing endpoint {expected}");
    }

    assert_eq!(pipeline.endpoint("activity_types").unwrap().path, "activityTypes");
    assert!(matches!(
        pipeline.endpoint("deals").unwrap().kind,
        EndpointKind::TimestampIncremental { .. }
    ));
    let notes = pipeline.endpoint("recent_notes").unwrap();
    assert_eq!(
        pipeline.rule_for(notes).unwrap().start_param,
        "since_timestamp"
    );

    // recents entries carry the record under `data`
    for endpoint in pipeline.endpoints.iter().filter(|e| e.path == "recents") {
        assert_eq!(
            pipeline.rule_for(endpoint).unwrap().cursor_path,
            "data.update_time",
            "{}",
            endpoint.name
        );
    }
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();

    let pipeline = load_pipeline(file.path()).unwrap();
    assert_eq!(pipeline.name, "test");
}

#[test]
fn test_load_unknown_name() {
    let err = load_pipeline("nonexistent").unwrap_err();
    assert!(err.to_string().contains("Built-in pipelines: pipedrive"));
}
