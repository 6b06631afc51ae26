//! Loader types
//!
//! Two layers: the `*Definition` structs mirror the YAML file, and
//! [`PipelineConfig`] / [`Endpoint`] are the validated, resolved form the
//! engine runs from. Relative initial values and defaults are resolved
//! once, while loading.

use crate::auth::{AuthConfig, Credential};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::incremental::IncrementalRule;
use crate::pagination::PaginationConfig;
use crate::path::Selector;
use crate::types::{scalar_to_string, BackoffType, WriteDisposition};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable the Pipedrive token is read from by default
pub const DEFAULT_CREDENTIAL_ENV: &str = "PIPEDRIVE_API_TOKEN";

/// Format used to render relative initial values
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Pipeline Definition (YAML)
// ============================================================================

/// Top-level pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineDefinition {
    /// Pipeline name
    pub name: String,
    /// Base URL for all requests
    pub base_url: String,
    /// How requests are authenticated
    #[serde(default)]
    pub auth: AuthConfig,
    /// Where the credential comes from at startup
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub credential: CredentialSource,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Pagination shared by all endpoints unless overridden
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Defaults applied to every endpoint
    #[serde(default)]
    pub defaults: EndpointDefaults,
    /// Run-level settings
    #[serde(default)]
    pub run: RunDefinition,
    /// Endpoint definitions
    pub endpoints: Vec<EndpointDefinition>,
}

/// Source of the API credential. The secret itself never lives in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Read from an environment variable
    Env(String),
    /// Read from a file (trailing whitespace is trimmed)
    File(PathBuf),
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Env(DEFAULT_CREDENTIAL_ENV.to_string())
    }
}

impl CredentialSource {
    /// Resolve the secret
    pub fn resolve(&self) -> Result<Credential> {
        match self {
            Self::Env(var) => Credential::from_env(var),
            Self::File(path) => Credential::from_file(path),
        }
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(var) => write!(f, "env:{var}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retries per request
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Backoff strategy between retries
    #[serde(default)]
    pub backoff: BackoffType,
    /// First retry delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for a retry delay in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Client-side rate limit; `null` disables it
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            rate_limit: default_rate_limit(),
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

impl HttpDefinition {
    /// Client configuration for a base URL
    pub fn client_config(&self, base_url: &str) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .backoff(
                self.backoff,
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_secs(self.max_backoff_secs),
            );

        builder = match self.rate_limit {
            Some(limit) => builder.rate_limit(limit),
            None => builder.no_rate_limit(),
        };
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent);
        }
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder.build()
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_secs() -> u64 {
    60
}

#[allow(clippy::unnecessary_wraps)]
fn default_rate_limit() -> Option<RateLimiterConfig> {
    Some(RateLimiterConfig::default())
}

// ============================================================================
// Defaults / Run Definition
// ============================================================================

/// Values every endpoint inherits unless it sets its own
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointDefaults {
    /// Primary key fields
    #[serde(default = "default_primary_key", deserialize_with = "one_or_many")]
    pub primary_key: Vec<String>,
    /// Write disposition
    #[serde(default)]
    pub write_disposition: WriteDisposition,
    /// Query parameters sent on every request (e.g. `limit`)
    #[serde(default = "default_params", deserialize_with = "scalar_params")]
    pub params: BTreeMap<String, String>,
    /// Item selector
    #[serde(default = "default_selector")]
    pub data_selector: String,
    /// Query parameter carrying the watermark for incremental endpoints
    #[serde(default = "default_start_param")]
    pub start_param: String,
}

impl Default for EndpointDefaults {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            write_disposition: WriteDisposition::default(),
            params: default_params(),
            data_selector: default_selector(),
            start_param: default_start_param(),
        }
    }
}

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_params() -> BTreeMap<String, String> {
    BTreeMap::from([("limit".to_string(), "100".to_string())])
}

fn default_selector() -> String {
    "data.*".to_string()
}

fn default_start_param() -> String {
    "since".to_string()
}

/// Run-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunDefinition {
    /// Endpoints extracted at the same time
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    /// Abort endpoints still running after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RunDefinition {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            timeout_secs: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

// ============================================================================
// Endpoint Definition
// ============================================================================

/// One endpoint as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointDefinition {
    /// Endpoint name; also the destination table name
    pub name: String,
    /// Path relative to the base URL
    pub path: String,
    /// Extra query parameters, merged over the defaults
    #[serde(default, deserialize_with = "scalar_params")]
    pub params: BTreeMap<String, String>,
    /// Item selector override
    #[serde(default)]
    pub data_selector: Option<String>,
    /// Primary key override
    #[serde(default, deserialize_with = "optional_one_or_many")]
    pub primary_key: Option<Vec<String>>,
    /// Write disposition override
    #[serde(default)]
    pub write_disposition: Option<WriteDisposition>,
    /// Pagination override
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,
    /// Incremental loading
    #[serde(default)]
    pub incremental: Option<IncrementalDefinition>,
}

/// Incremental loading as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IncrementalDefinition {
    /// Dotted path to the cursor field in each record
    pub cursor_path: String,
    /// Watermark used before the first successful run
    pub initial_value: InitialValue,
    /// Endpoint-specific start parameter (e.g. `since_timestamp`)
    #[serde(default)]
    pub start_param: Option<String>,
    /// Drop records below the starting watermark (default: true)
    #[serde(default = "default_filter_stale")]
    pub filter_stale: bool,
}

fn default_filter_stale() -> bool {
    true
}

/// Initial watermark: a literal or relative to load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialValue {
    /// Used verbatim
    Literal(String),
    /// `now - days_ago`, rendered as `%Y-%m-%d %H:%M:%S` (UTC)
    Relative { days_ago: u32 },
}

impl InitialValue {
    /// Resolve against a point in time
    pub fn resolve(&self, now: chrono::DateTime<chrono::Utc>) -> String {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Relative { days_ago } => (now - chrono::Duration::days(i64::from(*days_ago)))
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Shape of an endpoint, one variant per way it is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndpointKind {
    /// Full load on every run
    Plain,

    /// Incremental on a timestamp cursor, sent under the pipeline's default
    /// start parameter
    TimestampIncremental {
        cursor_path: String,
        initial_value: String,
        filter_stale: bool,
    },

    /// Incremental with an endpoint-specific start parameter
    SinceTimestampIncremental {
        cursor_path: String,
        initial_value: String,
        start_param: String,
        filter_stale: bool,
    },
}

impl EndpointKind {
    /// Incremental rule, if the endpoint is incremental
    pub fn rule(&self, default_start_param: &str) -> Option<IncrementalRule> {
        match self {
            Self::Plain => None,
            Self::TimestampIncremental {
                cursor_path,
                initial_value,
                filter_stale,
            } => Some(
                IncrementalRule::new(cursor_path, default_start_param, initial_value)
                    .with_filter(*filter_stale),
            ),
            Self::SinceTimestampIncremental {
                cursor_path,
                initial_value,
                start_param,
                filter_stale,
            } => Some(
                IncrementalRule::new(cursor_path, start_param, initial_value)
                    .with_filter(*filter_stale),
            ),
        }
    }

    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::TimestampIncremental { .. } => "incremental",
            Self::SinceTimestampIncremental { .. } => "incremental (since)",
        }
    }
}

/// A validated endpoint, ready to run
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Endpoint and table name
    pub name: String,
    /// Path relative to the base URL
    pub path: String,
    /// Query parameters sent on every page (defaults merged)
    pub params: BTreeMap<String, String>,
    /// Item selector
    pub selector: Selector,
    /// Primary key fields
    pub primary_key: Vec<String>,
    /// Write disposition
    pub write_disposition: WriteDisposition,
    /// Pagination
    pub pagination: PaginationConfig,
    /// Endpoint shape
    pub kind: EndpointKind,
}

impl Endpoint {
    /// Is this endpoint loaded incrementally?
    pub fn is_incremental(&self) -> bool {
        !matches!(self.kind, EndpointKind::Plain)
    }
}

/// A validated pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,
    /// Base URL for all requests
    pub base_url: String,
    /// Request authentication
    pub auth: AuthConfig,
    /// Where the credential comes from
    pub credential: CredentialSource,
    /// HTTP client settings
    pub http: HttpDefinition,
    /// Default watermark query parameter
    pub default_start_param: String,
    /// Run-level settings
    pub run: RunDefinition,
    /// Endpoints in definition order
    pub endpoints: Vec<Endpoint>,
}

impl PipelineConfig {
    /// Look up an endpoint by name
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Endpoints to run: all of them, or the named ones in the given order
    pub fn select(&self, names: &[String]) -> Result<Vec<Endpoint>> {
        if names.is_empty() {
            return Ok(self.endpoints.clone());
        }

        names
            .iter()
            .map(|name| {
                self.endpoint(name).cloned().ok_or_else(|| {
                    Error::config(format!(
                        "Unknown endpoint '{name}'. Available: {}",
                        self.endpoint_names().join(", ")
                    ))
                })
            })
            .collect()
    }

    /// Endpoint names in definition order
    pub fn endpoint_names(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.name.as_str()).collect()
    }

    /// Incremental rule for an endpoint of this pipeline
    pub fn rule_for(&self, endpoint: &Endpoint) -> Option<IncrementalRule> {
        endpoint.kind.rule(&self.default_start_param)
    }
}

// ============================================================================
// Deserialization helpers
// ============================================================================

/// Query parameters may be written as numbers or booleans (`limit: 100`)
fn scalar_params<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| match scalar_to_string(&value) {
            Some(v) => Ok((key, v)),
            None => Err(serde::de::Error::custom(format!(
                "query parameter '{key}' must be a string, number or boolean"
            ))),
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// `primary_key: id` or `primary_key: [item, id]`
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    OneOrMany::deserialize(deserializer).map(Into::into)
}

fn optional_one_or_many<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<OneOrMany>::deserialize(deserializer).map(|v| v.map(Into::into))
}
