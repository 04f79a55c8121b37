//! Model Provider Trait
//!
//! Defines the common interface for all model providers.

use async_trait::async_trait;

use super::types::{Completion, LlmError, LlmResult};

/// Trait that all model providers must implement.
///
/// A provider sends one rendered prompt to a named model and returns the raw
/// text with its token counts. Schema handling, cost and retries live above
/// this layer.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &str;

    /// Send a prompt and get a complete response.
    ///
    /// # Arguments
    /// * `model` - Model name to route the request to
    /// * `prompt` - Fully rendered prompt text
    /// * `temperature` - Sampling temperature
    async fn send(&self, model: &str, prompt: &str, temperature: f32) -> LlmResult<Completion>;

    /// Check if the provider is healthy and reachable.
    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(
    status: u16,
    body: &str,
    provider: &str,
    retry_after: Option<u32>,
) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        408 => LlmError::NetworkError {
            message: format!("{}: request timeout", provider),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after,
        },
        400 | 413 => {
            let lower = body.to_lowercase();
            if lower.contains("context_length") || lower.contains("maximum context length") {
                LlmError::ContextLengthExceeded {
                    message: body.to_string(),
                    max_tokens: None,
                }
            } else {
                LlmError::InvalidRequest {
                    message: body.to_string(),
                }
            }
        }
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
