//! OpenAI-Compatible Provider
//!
//! Implementation of the ModelProvider trait for chat-completions endpoints
//! (OpenAI and compatible gateways). One request carries one user message
//! holding the rendered prompt.

use async_trait::async_trait;
use serde::Deserialize;

use super::http_client::build_http_client;
use super::provider::{missing_api_key_error, parse_http_error, ModelProvider};
use super::types::{Completion, LlmError, LlmResult, ProviderConfig};

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible provider
pub struct OpenAICompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAICompatibleProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Get the API endpoint URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    /// Reasoning models (o1/o3/o4) reject a temperature parameter
    fn model_supports_temperature(model: &str) -> bool {
        let model = model.to_lowercase();
        !(model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4"))
    }

    /// Build the request body for the API
    fn build_request_body(&self, model: &str, prompt: &str, temperature: f32) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
            "stream": false,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        if Self::model_supports_temperature(model) {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }

    /// Parse a response from the API
    fn parse_response(response: OpenAIResponse) -> LlmResult<Completion> {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| LlmError::ParseError {
                message: "response contained no message content".to_string(),
            })?;

        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn send(&self, model: &str, prompt: &str, temperature: f32) -> LlmResult<Completion> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| missing_api_key_error(&self.config.name))?;

        let body = self.build_request_body(model, prompt, temperature);

        tracing::debug!(provider = %self.config.name, model, "sending completion request");

        let response = self
            .client
            .post(self.base_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, &self.config.name, retry_after));
        }

        let parsed: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Self::parse_response(parsed)
    }

    async fn health_check(&self) -> LlmResult<()> {
        if self.config.resolve_api_key().is_none() {
            return Err(missing_api_key_error(&self.config.name));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
