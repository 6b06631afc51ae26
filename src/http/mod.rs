//! HTTP client module
//!
//! Provides the HTTP client used by the paginator.
//!
//! # Features
//!
//! - **Automatic Retries**: bounded retries with backoff for transient failures
//! - **Rate Limiting**: token bucket rate limiter using governor
//! - **Error Classification**: every failure maps onto transient, fatal or
//!   data-shape errors

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
