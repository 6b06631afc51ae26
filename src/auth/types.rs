//! Auth configuration types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    Header,
    /// Place in query parameter
    #[default]
    Query,
}

/// How the credential is attached to each request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication
    None,

    /// API key in a query parameter or header
    ApiKey {
        /// Query parameter or header name (e.g. `api_token`)
        name: String,
        /// Where to place the key
        #[serde(default)]
        location: Location,
    },

    /// `Authorization: Bearer <credential>`
    Bearer,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::ApiKey {
            name: "api_token".to_string(),
            location: Location::Query,
        }
    }
}

impl AuthConfig {
    /// Whether requests need a credential at all
    pub fn requires_credential(&self) -> bool {
        !matches!(self, AuthConfig::None)
    }
}

/// A resolved secret.
///
/// `Debug` and `Display` are redacted so the value cannot end up in logs
/// or reports by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap an already-resolved secret
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingCredential {
                message: "credential is empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Resolve a credential from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let value = std::env::var(var).map_err(|_| Error::MissingCredential {
            message: format!("environment variable {var} is not set"),
        })?;
        Self::new(value)
    }

    /// Resolve a credential from a file (trailing whitespace is ignored)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let value = std::fs::read_to_string(path).map_err(|e| Error::MissingCredential {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::new(value)
    }

    /// Expose the secret for placing it on a request
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}
