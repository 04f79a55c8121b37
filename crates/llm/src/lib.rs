//! Idea Impact LLM
//!
//! Everything between a rendered prompt and a model answer:
//! - `ModelProvider` and the OpenAI-compatible HTTP provider
//! - `ModelInvoker`, one accounted call with optional structured output
//! - `RetryingCaller`, retries plus model escalation
//! - Model pricing for usage records
//! - `ScriptedProvider` for tests and offline runs

pub mod http_client;
pub mod invoker;
pub mod mock;
pub mod openai;
pub mod pricing;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use invoker::{InvokeError, InvokeResult, ModelInvoker};
pub use mock::{ScriptedCall, ScriptedProvider};
pub use openai::OpenAICompatibleProvider;
pub use pricing::{CostCalculator, ModelPricing};
pub use provider::ModelProvider;
pub use retry::{
    CallAttempt, CallError, CallLog, CallObserver, CallOutcome, CallPolicy, RetryingCaller,
    TracingObserver,
};
pub use schema::{extract_json, validate, SchemaViolation};
pub use types::*;
