//! Model Invoker
//!
//! A single model call: render the prompt, send it to one named model,
//! optionally validate the response against a typed schema, and emit exactly
//! one usage record describing what happened.

use std::sync::Arc;

use idea_impact_core::{NullUsageSink, PromptTemplate, PromptVars, UsageRecord, UsageSink};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::pricing::CostCalculator;
use crate::provider::ModelProvider;
use crate::schema::{self, SchemaViolation};
use crate::types::{Completion, LlmError};

/// Failure kinds of a single model invocation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// Rate limit, timeout, 5xx or other retryable provider failure
    #[error("transient provider error: {0}")]
    TransientProvider(LlmError),

    /// The model answered, but not in the declared shape
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// Bad credentials, unknown model, or a prompt that cannot be rendered
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),
}

impl InvokeError {
    /// Classify a provider error
    pub fn from_provider(err: LlmError) -> Self {
        if err.is_fatal() {
            InvokeError::FatalConfig(err.to_string())
        } else {
            InvokeError::TransientProvider(err)
        }
    }

    /// Whether the same model may be tried again
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InvokeError::FatalConfig(_))
    }

    /// Provider-requested wait before retrying, in seconds
    pub fn retry_after(&self) -> Option<u32> {
        match self {
            InvokeError::TransientProvider(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Result type for model invocations
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Sends rendered prompts to a provider and accounts for every call.
#[derive(Clone)]
pub struct ModelInvoker {
    provider: Arc<dyn ModelProvider>,
    pricing: Arc<CostCalculator>,
    sink: Arc<dyn UsageSink>,
}

impl ModelInvoker {
    /// Create an invoker that discards usage records
    pub fn new(provider: Arc<dyn ModelProvider>, pricing: Arc<CostCalculator>) -> Self {
        Self {
            provider,
            pricing,
            sink: Arc::new(NullUsageSink),
        }
    }

    /// Route usage records to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Invoke a model and return its raw text.
    pub async fn invoke_text(
        &self,
        label: &str,
        template: &PromptTemplate,
        vars: &PromptVars,
        model: &str,
        temperature: f32,
    ) -> InvokeResult<String> {
        let prompt = match template.render(vars) {
            Ok(p) => p,
            Err(e) => return Err(self.render_failed(label, model, e.to_string())),
        };

        let completion = self.send(label, model, &prompt, temperature).await?;
        self.record(label, model, &completion, None);
        Ok(completion.text)
    }

    /// Invoke a model and validate its answer as `T`.
    ///
    /// The JSON Schema of `T` is appended to the rendered prompt. A response
    /// that does not parse as `T` is billed like any other and then reported
    /// as a [`InvokeError::SchemaViolation`].
    pub async fn invoke_structured<T>(
        &self,
        label: &str,
        template: &PromptTemplate,
        vars: &PromptVars,
        model: &str,
        temperature: f32,
    ) -> InvokeResult<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let mut prompt = match template.render(vars) {
            Ok(p) => p,
            Err(e) => return Err(self.render_failed(label, model, e.to_string())),
        };
        prompt.push_str(&schema::structured_instructions::<T>());

        let completion = self.send(label, model, &prompt, temperature).await?;
        match schema::validate::<T>(&completion.text) {
            Ok(value) => {
                self.record(label, model, &completion, None);
                Ok(value)
            }
            Err(violation) => {
                self.record(label, model, &completion, Some(violation.to_string()));
                Err(violation.into())
            }
        }
    }

    /// Send a prompt, recording a zero-token failure when the provider errors.
    async fn send(
        &self,
        label: &str,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> InvokeResult<Completion> {
        debug!(label, model, prompt_len = prompt.len(), "invoking model");

        self.provider
            .send(model, prompt, temperature)
            .await
            .map_err(|e| {
                self.sink.record(
                    UsageRecord::new(model, self.provider.name(), 0, 0)
                        .with_label(label)
                        .failed(e.to_string()),
                );
                InvokeError::from_provider(e)
            })
    }

    fn render_failed(&self, label: &str, model: &str, message: String) -> InvokeError {
        self.sink.record(
            UsageRecord::new(model, self.provider.name(), 0, 0)
                .with_label(label)
                .failed(message.clone()),
        );
        InvokeError::FatalConfig(message)
    }

    fn record(&self, label: &str, model: &str, completion: &Completion, error: Option<String>) {
        let input = i64::from(completion.input_tokens);
        let output = i64::from(completion.output_tokens);
        let cost = self.pricing.calculate_cost(model, input, output);

        let record = UsageRecord::new(model, self.provider.name(), input, output)
            .with_label(label)
            .with_cost(cost);
        let record = match error {
            Some(e) => record.failed(e),
            None => record,
        };
        self.sink.record(record);
    }
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("provider", &self.provider.name())
            .finish()
    }
}
