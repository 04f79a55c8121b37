use async_trait::async_trait;
use idea_impact_core::prompt_vars;
use idea_impact_llm::{CallPolicy, RetryingCaller};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::{AnalysisStage, StageOutput};
use crate::config::StageKind;
use crate::fan_out::ItemFailure;
use crate::prompts;
use crate::state::{AnalysisPatch, AnalysisState};

/// Atomic impact statements
#[derive(Debug, Deserialize, JsonSchema)]
struct StatementList {
    statements: Vec<String>,
}

/// Proposal → impact statements. Exhaustion yields an empty list.
#[derive(Debug, Clone)]
pub struct ExtractStage {
    policy: CallPolicy,
}

impl ExtractStage {
    pub fn new(policy: CallPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl AnalysisStage for ExtractStage {
    fn kind(&self) -> StageKind {
        StageKind::Extract
    }

    async fn run(&self, caller: &RetryingCaller, state: &AnalysisState) -> StageOutput {
        let vars = prompt_vars([
            ("example_proposal", prompts::EXTRACT_EXAMPLE_PROPOSAL.to_string()),
            ("example_answer", prompts::extract_example_answer()),
            ("proposal", state.proposal.prompt_text()),
        ]);

        let result = caller
            .call_structured::<StatementList>("extract", &self.policy, &prompts::extract(), &vars)
            .await;

        match result {
            Ok(list) => {
                let statements: Vec<String> = list
                    .statements
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                info!(count = statements.len(), "extracted impact statements");
                StageOutput::new(AnalysisPatch {
                    extracted_statements: Some(statements),
                    ..Default::default()
                })
            }
            Err(e) => {
                warn!(error = %e, "extraction failed, continuing with no statements");
                StageOutput::new(AnalysisPatch {
                    extracted_statements: Some(Vec::new()),
                    ..Default::default()
                })
                .with_failures(vec![ItemFailure::new("proposal", e)])
            }
        }
    }
}
