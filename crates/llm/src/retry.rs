//! Retrying Caller
//!
//! Wraps the [`ModelInvoker`] with bounded retries and a model escalation
//! ladder. Every pipeline call goes through here.
//!
//! ## Algorithm
//!
//! 1. Try the primary model up to `max_retries` times (the count includes the
//!    first attempt).
//! 2. When the budget on the current model is spent, move to the next fallback
//!    model with a fresh budget.
//! 3. A fatal configuration error skips the remaining attempts on the current
//!    model and escalates immediately.
//! 4. When every model is spent, fail with [`CallError::ExhaustedRetries`]
//!    carrying the last underlying error.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use idea_impact_core::{PromptTemplate, PromptVars, UsageSink};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::invoker::{InvokeError, InvokeResult, ModelInvoker};

/// Upper bound on a provider-requested retry delay
pub const MAX_RETRY_AFTER_SECS: u32 = 30;

/// Models, temperature and retry budget for one call site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPolicy {
    /// Model tried first
    pub primary_model: String,
    /// Models tried in order once the primary is exhausted
    #[serde(default)]
    pub fallback_models: Vec<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
    /// Attempts per model, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl CallPolicy {
    /// Create a policy with no fallbacks, temperature 0 and three attempts
    pub fn new(primary_model: impl Into<String>) -> Self {
        Self {
            primary_model: primary_model.into(),
            fallback_models: Vec::new(),
            temperature: 0.0,
            max_retries: default_max_retries(),
        }
    }

    /// Set the fallback models
    pub fn with_fallbacks<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the attempt budget per model
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Primary followed by fallbacks
    pub fn models(&self) -> Vec<&str> {
        let mut models = vec![self.primary_model.as_str()];
        models.extend(self.fallback_models.iter().map(String::as_str));
        models
    }
}

/// The only error a retrying call surfaces
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("exhausted retries after {attempts} attempts across [{}]: {last}", .models.join(", "))]
    ExhaustedRetries {
        attempts: u32,
        models: Vec<String>,
        last: InvokeError,
    },
}

impl CallError {
    /// The final underlying failure
    pub fn last_error(&self) -> &InvokeError {
        match self {
            CallError::ExhaustedRetries { last, .. } => last,
        }
    }
}

/// One attempt in a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAttempt {
    pub model: String,
    /// 1-based attempt number on this model
    pub attempt: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Every attempt made by one call, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub attempts: Vec<CallAttempt>,
}

impl CallLog {
    fn push(&mut self, attempt: CallAttempt) {
        self.attempts.push(attempt);
    }

    /// Total invocations
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Distinct models in the order they were first tried
    pub fn models_tried(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for a in &self.attempts {
            if !models.contains(&a.model) {
                models.push(a.model.clone());
            }
        }
        models
    }

    /// Model that produced the result, if any
    pub fn successful_model(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.model.as_str())
    }
}

/// Result of a call together with its attempt log
#[derive(Debug)]
pub struct CallOutcome<T> {
    pub result: Result<T, CallError>,
    pub log: CallLog,
}

impl<T> CallOutcome<T> {
    pub fn into_result(self) -> Result<T, CallError> {
        self.result
    }
}

/// Side channel for call-level events.
///
/// Injected into the [`RetryingCaller`]; every method defaults to a no-op.
pub trait CallObserver: Send + Sync {
    fn on_attempt(&self, _label: &str, _model: &str, _attempt: u32) {}
    fn on_failure(&self, _label: &str, _model: &str, _attempt: u32, _error: &InvokeError) {}
    fn on_escalate(&self, _label: &str, _from: &str, _to: &str) {}
    fn on_success(&self, _label: &str, _model: &str, _attempt: u32) {}
    fn on_exhausted(&self, _label: &str, _error: &CallError) {}
}

/// Observer that turns call events into tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_attempt(&self, label: &str, model: &str, attempt: u32) {
        debug!(label, model, attempt, "model call attempt");
    }

    fn on_failure(&self, label: &str, model: &str, attempt: u32, error: &InvokeError) {
        warn!(label, model, attempt, error = %error, "model call failed");
    }

    fn on_escalate(&self, label: &str, from: &str, to: &str) {
        info!(label, from, to, "escalating to fallback model");
    }

    fn on_success(&self, label: &str, model: &str, attempt: u32) {
        debug!(label, model, attempt, "model call succeeded");
    }

    fn on_exhausted(&self, label: &str, error: &CallError) {
        warn!(label, error = %error, "model call exhausted all retries");
    }
}

/// Retry and escalation around a [`ModelInvoker`]
#[derive(Clone)]
pub struct RetryingCaller {
    invoker: ModelInvoker,
    observer: Arc<dyn CallObserver>,
    retry_delay: Duration,
}

impl RetryingCaller {
    /// Create a caller with tracing observation and no delay between attempts
    pub fn new(invoker: ModelInvoker) -> Self {
        Self {
            invoker,
            observer: Arc::new(TracingObserver),
            retry_delay: Duration::ZERO,
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Wait this long before retrying the same model
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Route usage records from this caller's invocations to `sink`
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.invoker = self.invoker.with_sink(sink);
        self
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    /// Run `op` over the policy's models with retries and escalation.
    ///
    /// `op` receives the model name for each attempt.
    pub async fn execute<T, F, Fut>(&self, label: &str, policy: &CallPolicy, mut op: F) -> CallOutcome<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = InvokeResult<T>>,
    {
        let budget = policy.max_retries.max(1);
        let models = policy.models();
        let mut log = CallLog::default();
        let mut last: Option<InvokeError> = None;

        for (idx, model) in models.iter().enumerate() {
            if idx > 0 {
                self.observer.on_escalate(label, models[idx - 1], model);
            }

            for attempt in 1..=budget {
                self.observer.on_attempt(label, model, attempt);
                let started = Instant::now();

                match op(model.to_string()).await {
                    Ok(value) => {
                        log.push(CallAttempt {
                            model: model.to_string(),
                            attempt,
                            success: true,
                            error: None,
                            duration_ms: started.elapsed().as_millis() as u64,
                        });
                        self.observer.on_success(label, model, attempt);
                        return CallOutcome {
                            result: Ok(value),
                            log,
                        };
                    }
                    Err(err) => {
                        log.push(CallAttempt {
                            model: model.to_string(),
                            attempt,
                            success: false,
                            error: Some(err.to_string()),
                            duration_ms: started.elapsed().as_millis() as u64,
                        });
                        self.observer.on_failure(label, model, attempt, &err);

                        let retry_same = err.is_retryable() && attempt < budget;
                        let wait = self.delay_for(&err);
                        last = Some(err);

                        if !retry_same {
                            break;
                        }
                        if !wait.is_zero() {
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            }
        }

        let error = CallError::ExhaustedRetries {
            attempts: log.len() as u32,
            models: log.models_tried(),
            last: last.unwrap_or_else(|| InvokeError::FatalConfig("no models configured".to_string())),
        };
        self.observer.on_exhausted(label, &error);

        CallOutcome {
            result: Err(error),
            log,
        }
    }

    /// Free-text call with retries
    pub async fn call_text(
        &self,
        label: &str,
        policy: &CallPolicy,
        template: &PromptTemplate,
        vars: &PromptVars,
    ) -> Result<String, CallError> {
        let invoker = &self.invoker;
        let temperature = policy.temperature;
        self.execute(label, policy, |model: String| async move {
            invoker
                .invoke_text(label, template, vars, &model, temperature)
                .await
        })
        .await
        .into_result()
    }

    /// Structured call with retries; schema violations are retried
    pub async fn call_structured<T>(
        &self,
        label: &str,
        policy: &CallPolicy,
        template: &PromptTemplate,
        vars: &PromptVars,
    ) -> Result<T, CallError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let invoker = &self.invoker;
        let temperature = policy.temperature;
        self.execute(label, policy, |model: String| async move {
            invoker
                .invoke_structured::<T>(label, template, vars, &model, temperature)
                .await
        })
        .await
        .into_result()
    }

    fn delay_for(&self, err: &InvokeError) -> Duration {
        match err.retry_after() {
            Some(secs) => {
                let requested = Duration::from_secs(u64::from(secs.min(MAX_RETRY_AFTER_SECS)));
                requested.max(self.retry_delay)
            }
            None => self.retry_delay,
        }
    }
}

impl std::fmt::Debug for RetryingCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingCaller")
            .field("invoker", &self.invoker)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedProvider;
    use crate::pricing::CostCalculator;
    use crate::types::{Completion, LlmError};
    use idea_impact_core::{prompt_vars, RunLedger};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn caller(provider: &ScriptedProvider, ledger: &RunLedger) -> RetryingCaller {
        let invoker = ModelInvoker::new(Arc::new(provider.clone()), Arc::new(CostCalculator::new()))
            .with_sink(Arc::new(ledger.clone()));
        RetryingCaller::new(invoker)
    }

    fn template() -> PromptTemplate {
        PromptTemplate::new("t", "{{q}}")
    }

    fn transient() -> LlmError {
        LlmError::ServerError {
            message: "overloaded".to_string(),
            status: Some(529),
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl CallObserver for RecordingObserver {
        fn on_failure(&self, _label: &str, model: &str, attempt: u32, _error: &InvokeError) {
            self.events.lock().unwrap().push(format!("fail {model} {attempt}"));
        }
        fn on_escalate(&self, _label: &str, from: &str, to: &str) {
            self.events.lock().unwrap().push(format!("escalate {from}->{to}"));
        }
        fn on_success(&self, _label: &str, model: &str, attempt: u32) {
            self.events.lock().unwrap().push(format!("ok {model} {attempt}"));
        }
    }

    #[tokio::test]
    async fn test_primary_fails_fallback_succeeds_in_four_calls() {
        let provider = ScriptedProvider::new(|model, _| match model {
            "primary" => Err(transient()),
            _ => Ok(Completion::new("fallback answer", 5, 5)),
        });
        let ledger = RunLedger::new();
        let policy = CallPolicy::new("primary")
            .with_fallbacks(["fallback"])
            .with_max_retries(3);

        let text = caller(&provider, &ledger)
            .call_text("research", &policy, &template(), &prompt_vars([("q", "x")]))
            .await
            .unwrap();

        assert_eq!(text, "fallback answer");
        assert_eq!(provider.total_calls(), 4);
        assert_eq!(provider.calls_for("primary"), 3);
        assert_eq!(provider.calls_for("fallback"), 1);

        let records = ledger.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records.iter().filter(|r| !r.success).count(), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_escalates_immediately() {
        let provider = ScriptedProvider::new(|model, _| match model {
            "primary" => Err(LlmError::ModelNotFound {
                model: "primary".to_string(),
            }),
            _ => Ok(Completion::new("ok", 1, 1)),
        });
        let ledger = RunLedger::new();
        let policy = CallPolicy::new("primary").with_fallbacks(["fallback"]);

        let text = caller(&provider, &ledger)
            .call_text("l", &policy, &template(), &prompt_vars([("q", "x")]))
            .await
            .unwrap();
        assert_eq!(text, "ok");
        assert_eq!(provider.calls_for("primary"), 1);
        assert_eq!(provider.calls_for("fallback"), 1);
    }

    #[tokio::test]
    async fn test_fatal_without_fallback_fails_immediately() {
        let provider = ScriptedProvider::new(|_, _| {
            Err(LlmError::AuthenticationFailed {
                message: "bad key".to_string(),
            })
        });
        let ledger = RunLedger::new();
        let policy = CallPolicy::new("only");

        let err = caller(&provider, &ledger)
            .call_text("l", &policy, &template(), &prompt_vars([("q", "x")]))
            .await
            .unwrap_err();

        assert_eq!(provider.total_calls(), 1);
        assert!(matches!(err.last_error(), InvokeError::FatalConfig(_)));
    }

    #[tokio::test]
    async fn test_all_models_exhausted() {
        let provider = ScriptedProvider::new(|_, _| Err(transient()));
        let ledger = RunLedger::new();
        let policy = CallPolicy::new("a").with_fallbacks(["b"]).with_max_retries(3);

        let err = caller(&provider, &ledger)
            .call_text("l", &policy, &template(), &prompt_vars([("q", "x")]))
            .await
            .unwrap_err();

        let CallError::ExhaustedRetries {
            attempts,
            models,
            last,
        } = err;
        assert_eq!(attempts, 6);
        assert_eq!(models, vec!["a", "b"]);
        assert!(matches!(last, InvokeError::TransientProvider(_)));
        assert_eq!(ledger.len(), 6);
    }

    #[tokio::test]
    async fn test_schema_violation_retried_on_same_model() {
        #[derive(Debug, Deserialize, JsonSchema)]
        struct Answer {
            value: u32,
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let provider = ScriptedProvider::new(move |_, _| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            let text = if n == 0 { "garbage" } else { r#"{"value": 7}"# };
            Ok(Completion::new(text, 1, 1))
        });
        let ledger = RunLedger::new();
        let policy = CallPolicy::new("m").with_fallbacks(["f"]);

        let answer: Answer = caller(&provider, &ledger)
            .call_structured("l", &policy, &template(), &prompt_vars([("q", "x")]))
            .await
            .unwrap();

        assert_eq!(answer.value, 7);
        assert_eq!(provider.calls_for("m"), 2);
        assert_eq!(provider.calls_for("f"), 0);
        let records = ledger.records();
        assert!(!records[0].success);
        assert!(records[1].success);
    }

    #[tokio::test]
    async fn test_observer_and_log_follow_escalation() {
        let provider = ScriptedProvider::new(|model, _| match model {
            "primary" => Err(transient()),
            _ => Ok(Completion::new("ok", 1, 1)),
        });
        let ledger = RunLedger::new();
        let observer = Arc::new(RecordingObserver::default());
        let caller = caller(&provider, &ledger).with_observer(observer.clone());
        let policy = CallPolicy::new("primary")
            .with_fallbacks(["fallback"])
            .with_max_retries(2);
        let template = template();
        let vars = prompt_vars([("q", "x")]);

        let outcome = caller
            .execute("l", &policy, |model: String| {
                let invoker = caller.invoker().clone();
                let template = template.clone();
                let vars = vars.clone();
                async move { invoker.invoke_text("l", &template, &vars, &model, 0.0).await }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "ok");
        assert_eq!(outcome.log.len(), 3);
        assert_eq!(outcome.log.models_tried(), vec!["primary", "fallback"]);
        assert_eq!(outcome.log.successful_model(), Some("fallback"));
        assert_eq!(
            *observer.events.lock().unwrap(),
            vec![
                "fail primary 1",
                "fail primary 2",
                "escalate primary->fallback",
                "ok fallback 1",
            ]
        );
    }

    #[test]
    fn test_retry_after_is_capped() {
        let provider = ScriptedProvider::always("x");
        let caller = caller(&provider, &RunLedger::new()).with_retry_delay(Duration::from_millis(100));

        let limited = |secs| {
            InvokeError::TransientProvider(LlmError::RateLimited {
                message: "429".to_string(),
                retry_after: Some(secs),
            })
        };
        assert_eq!(caller.delay_for(&limited(2)), Duration::from_secs(2));
        assert_eq!(caller.delay_for(&limited(600)), Duration::from_secs(30));
        assert_eq!(caller.delay_for(&limited(0)), Duration::from_millis(100));
        assert_eq!(
            caller.delay_for(&InvokeError::TransientProvider(transient())),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_policy_models_order() {
        let policy = CallPolicy::new("a").with_fallbacks(["b", "c"]);
        assert_eq!(policy.models(), vec!["a", "b", "c"]);
        assert_eq!(policy.max_retries, 3);
    }
}
