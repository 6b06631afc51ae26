//! Error types for pipedrive-extract
//!
//! One error enum for the whole crate. Fetch failures are split the way an
//! operator needs to act on them: transient (retry later), fatal (fix
//! credentials or configuration) and data shape (the API answered with
//! something the endpoint definition does not describe).

use serde::Serialize;
use thiserror::Error;

/// The main error type for pipedrive-extract
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Missing credential: {message}")]
    MissingCredential { message: String },

    // ============================================================================
    // Fetch Errors
    // ============================================================================
    #[error("Transient fetch failure: {message}")]
    TransientFetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Fatal fetch failure (HTTP {status}): {message}")]
    FatalFetch { status: u16, message: String },

    #[error("Unexpected response shape at '{path}': {message}")]
    DataShape { path: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ============================================================================
    // Run Control Errors
    // ============================================================================
    #[error("Run timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Run cancelled")]
    Cancelled,

    // ============================================================================
    // State / Destination Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Destination error: {message}")]
    Sink { message: String },

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse classification of a failure, as shown in run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network trouble or 5xx/429 after retries were exhausted
    Transient,
    /// Auth, permission or other non-retryable HTTP failure
    Fatal,
    /// Selector, envelope or cursor path did not match the response
    DataShape,
    /// Run-level timeout or cancellation
    Aborted,
    /// Anything else (state, destination, configuration)
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::DataShape => "data_shape",
            Self::Aborted => "aborted",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transient fetch error
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransientFetch {
            status,
            message: message.into(),
        }
    }

    /// Create a fatal fetch error
    pub fn fatal(status: u16, message: impl Into<String>) -> Self {
        Self::FatalFetch {
            status,
            message: message.into(),
        }
    }

    /// Create a data shape error naming the offending path
    pub fn data_shape(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataShape {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a destination error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransientFetch { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Classify the error for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::TransientFetch { .. } | Error::Http(_) => FailureKind::Transient,
            Error::FatalFetch { .. } => FailureKind::Fatal,
            Error::DataShape { .. } | Error::JsonParse(_) => FailureKind::DataShape,
            Error::Timeout { .. } | Error::Cancelled => FailureKind::Aborted,
            _ => FailureKind::Internal,
        }
    }
}

/// Check if an HTTP status code is retryable: request timeout, rate
/// limiting and every server error
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Result type alias for pipedrive-extract
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
