//! HTTP Client Factory
//!
//! Builds the reqwest client shared by HTTP-backed providers.

use std::time::Duration;

use super::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` with the given per-request timeout.
///
/// Timeouts surface from `send()` as transport errors, which providers map
/// to `LlmError::NetworkError`.
pub fn build_http_client(timeout_secs: u64) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("idea-impact/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LlmError::ProviderUnavailable {
            message: format!("failed to build HTTP client: {}", e),
        })
}
