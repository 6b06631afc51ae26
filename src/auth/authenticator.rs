//! Authenticator implementation
//!
//! Applies an [`AuthConfig`] and its [`Credential`] to outgoing requests.

use super::types::{AuthConfig, Credential, Location};
use crate::error::{Error, Result};
use reqwest::RequestBuilder;

/// Authenticator handles applying authentication to HTTP requests
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: AuthConfig,
    credential: Option<Credential>,
}

impl Authenticator {
    /// Create an authenticator.
    ///
    /// Fails when the auth type needs a credential and none was given.
    pub fn new(config: AuthConfig, credential: Option<Credential>) -> Result<Self> {
        if config.requires_credential() && credential.is_none() {
            return Err(Error::MissingCredential {
                message: "auth is configured but no credential was provided".to_string(),
            });
        }
        Ok(Self { config, credential })
    }

    /// An authenticator that leaves requests untouched
    pub fn none() -> Self {
        Self {
            config: AuthConfig::None,
            credential: None,
        }
    }

    /// The auth configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Apply authentication to a request builder
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        let Some(credential) = &self.credential else {
            return req;
        };

        match &self.config {
            AuthConfig::None => req,
            AuthConfig::ApiKey { name, location } => match location {
                Location::Query => req.query(&[(name.as_str(), credential.expose())]),
                Location::Header => req.header(name.as_str(), credential.expose()),
            },
            AuthConfig::Bearer => req.bearer_auth(credential.expose()),
        }
    }
}
