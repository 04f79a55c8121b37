//! Scripted providers and wiring shared by the integration tests.

use std::sync::Arc;

use idea_impact::services::analytics::{MemoryBalanceStore, UsageLedgerService};
use idea_impact::storage::open_in_memory;
use idea_impact::{AnalysisService, CostGate};
use idea_impact_llm::{
    Completion, CostCalculator, LlmError, LlmResult, ModelInvoker, RetryingCaller,
    ScriptedProvider,
};
use idea_impact_pipeline::prompts::extract_example_answer;
use idea_impact_pipeline::{Orchestrator, PipelineConfig};
use serde_json::json;

/// Pipeline call site a prompt was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Extract,
    Expand,
    Categorize,
    Research,
    Evaluate,
    Summarize,
}

pub fn site_of(prompt: &str) -> Site {
    if prompt.starts_with("You are an analyst") {
        Site::Extract
    } else if prompt.contains("Impact statement:") {
        Site::Expand
    } else if prompt.starts_with("Group the following") {
        Site::Categorize
    } else if prompt.starts_with("You are a sustainability researcher") {
        Site::Research
    } else if prompt.starts_with("Score the net") {
        Site::Evaluate
    } else {
        Site::Summarize
    }
}

/// Statement text quoted in an expand prompt
pub fn expanded_statement(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("Impact statement: "))
        .unwrap_or_default()
}

/// Deterministic answer for every call site.
///
/// Extraction returns the worked example; each statement expands to one
/// impact; every impact lands in "Transport" except those mentioning trains,
/// which land in "Rail".
pub fn canned_answer(prompt: &str) -> String {
    match site_of(prompt) {
        Site::Extract => extract_example_answer(),
        Site::Expand => {
            json!({ "impacts": [format!("Impact of {}", expanded_statement(prompt))] }).to_string()
        }
        Site::Categorize => {
            let impacts: Vec<&str> = prompt
                .lines()
                .filter_map(|l| l.strip_prefix("- "))
                .collect();
            let (rail, transport): (Vec<&str>, Vec<&str>) =
                impacts.into_iter().partition(|i| i.contains("trains"));
            let categories: Vec<_> = [("Transport", transport), ("Rail", rail)]
                .into_iter()
                .filter(|(_, impacts)| !impacts.is_empty())
                .map(|(name, impacts)| json!({ "name": name, "impacts": impacts }))
                .collect();
            json!({ "categories": categories }).to_string()
        }
        Site::Research => "Comparable projects show mixed results.".to_string(),
        Site::Evaluate => {
            let score = if prompt.contains("Category: Rail") { -0.4 } else { 0.6 };
            json!({ "researchSummary": "Evidence reviewed", "score": score }).to_string()
        }
        Site::Summarize => "The proposal is reasonable.".to_string(),
    }
}

pub fn canned_provider() -> ScriptedProvider {
    ScriptedProvider::new(|_, prompt| Ok(Completion::new(canned_answer(prompt), 120, 40)))
}

pub fn unavailable() -> LlmError {
    LlmError::ServerError {
        message: "service unavailable".to_string(),
        status: Some(503),
    }
}

pub fn caller(provider: &ScriptedProvider) -> RetryingCaller {
    RetryingCaller::new(ModelInvoker::new(
        Arc::new(provider.clone()),
        Arc::new(CostCalculator::new()),
    ))
}

pub fn orchestrator(provider: &ScriptedProvider) -> Orchestrator {
    Orchestrator::new(caller(provider), &PipelineConfig::default())
}

/// Analysis service over in-memory stores with one funded user
pub fn service(provider: &ScriptedProvider, user: &str, balance: i64, estimate: i64) -> AnalysisService {
    let balances = Arc::new(MemoryBalanceStore::with_balances([(user, balance)]));
    let ledger = Arc::new(UsageLedgerService::from_pool(open_in_memory().unwrap()).unwrap());
    AnalysisService::new(orchestrator(provider), CostGate::new(balances, ledger), estimate)
}

pub fn ok(text: &str) -> LlmResult<Completion> {
    Ok(Completion::new(text, 10, 10))
}
