//! Retrying Caller Integration Tests
//!
//! Escalation through fallback models with usage accounting.

use std::sync::Arc;

use idea_impact_core::{prompt_vars, PromptTemplate, RunLedger};
use idea_impact_llm::{
    CallError, CallPolicy, CostCalculator, LlmError, ModelInvoker, RetryingCaller,
    ScriptedProvider,
};

use crate::support::{ok, unavailable};

fn caller(provider: &ScriptedProvider, ledger: &RunLedger) -> RetryingCaller {
    RetryingCaller::new(
        ModelInvoker::new(Arc::new(provider.clone()), Arc::new(CostCalculator::new()))
            .with_sink(Arc::new(ledger.clone())),
    )
}

fn template() -> PromptTemplate {
    PromptTemplate::new("describe", "Say something about {{topic}}")
}

#[tokio::test]
async fn test_primary_down_fallback_answers_after_four_calls() {
    let provider = ScriptedProvider::new(|model, _| match model {
        "primary" => Err(unavailable()),
        _ => ok("fallback answer"),
    });
    let ledger = RunLedger::new();
    let policy = CallPolicy::new("primary")
        .with_fallbacks(["fallback"])
        .with_max_retries(3);

    let text = caller(&provider, &ledger)
        .call_text("describe", &policy, &template(), &prompt_vars([("topic", "rivers")]))
        .await
        .unwrap();

    assert_eq!(text, "fallback answer");
    assert_eq!(provider.total_calls(), 4);
    assert_eq!(provider.calls_for("primary"), 3);
    assert_eq!(provider.calls_for("fallback"), 1);

    // One usage record per invocation, failures included.
    let records = ledger.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records.iter().filter(|r| !r.success).count(), 3);
    assert!(records.iter().all(|r| r.label == "describe"));
}

#[tokio::test]
async fn test_bad_credentials_skip_straight_to_fallback() {
    let provider = ScriptedProvider::new(|model, _| match model {
        "primary" => Err(LlmError::AuthenticationFailed {
            message: "invalid key".to_string(),
        }),
        _ => ok("fallback answer"),
    });
    let ledger = RunLedger::new();
    let policy = CallPolicy::new("primary").with_fallbacks(["fallback"]);

    let text = caller(&provider, &ledger)
        .call_text("describe", &policy, &template(), &prompt_vars([("topic", "forests")]))
        .await
        .unwrap();

    assert_eq!(text, "fallback answer");
    assert_eq!(provider.calls_for("primary"), 1);
    assert_eq!(provider.calls_for("fallback"), 1);
    assert_eq!(ledger.len(), 2);
}

#[tokio::test]
async fn test_every_model_down_exhausts() {
    let provider = ScriptedProvider::new(|_, _| Err(unavailable()));
    let ledger = RunLedger::new();
    let policy = CallPolicy::new("a")
        .with_fallbacks(["b", "c"])
        .with_max_retries(2);

    let err = caller(&provider, &ledger)
        .call_text("describe", &policy, &template(), &prompt_vars([("topic", "soil")]))
        .await
        .unwrap_err();

    let CallError::ExhaustedRetries { attempts, models, .. } = err;
    assert_eq!(attempts, 6);
    assert_eq!(models, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    assert_eq!(ledger.len(), 6);
}
