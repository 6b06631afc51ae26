//! Authentication module
//!
//! Supports: API key (query or header) and bearer tokens.
//!
//! The secret itself is a [`Credential`], resolved by the caller once at
//! startup and handed to the engine. Nothing in this crate reads secrets
//! on its own, and a `Credential` never prints its value.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, Credential, Location};
