use async_trait::async_trait;
use futures_util::future::join_all;
use idea_impact_core::prompt_vars;
use idea_impact_llm::{CallPolicy, RetryingCaller};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AnalysisStage, StageOutput};
use crate::config::StageKind;
use crate::fan_out::{partition_outcomes, ItemFailure, ItemOutcome};
use crate::prompts;
use crate::state::{AnalysisPatch, AnalysisState};

/// Downstream consequences of one statement
#[derive(Debug, Deserialize, JsonSchema)]
struct ImpactList {
    impacts: Vec<String>,
}

/// Statements → downstream impacts, one concurrent call per statement.
///
/// A statement whose call is exhausted contributes nothing; the others are
/// unaffected.
#[derive(Debug, Clone)]
pub struct ExpandStage {
    policy: CallPolicy,
}

impl ExpandStage {
    pub fn new(policy: CallPolicy) -> Self {
        Self { policy }
    }

    async fn expand_one(
        &self,
        caller: &RetryingCaller,
        proposal: &str,
        statement: &str,
    ) -> ItemOutcome<Vec<String>> {
        let vars = prompt_vars([("proposal", proposal), ("statement", statement)]);

        caller
            .call_structured::<ImpactList>("expand", &self.policy, &prompts::expand(), &vars)
            .await
            .map(|list| {
                list.impacts
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .map_err(|e| ItemFailure::new(statement, e))
    }
}

#[async_trait]
impl AnalysisStage for ExpandStage {
    fn kind(&self) -> StageKind {
        StageKind::Expand
    }

    async fn run(&self, caller: &RetryingCaller, state: &AnalysisState) -> StageOutput {
        if state.extracted_statements.is_empty() {
            debug!("no statements to expand");
            return StageOutput::new(AnalysisPatch {
                downstream_impacts: Some(Vec::new()),
                ..Default::default()
            });
        }

        let proposal = state.proposal.prompt_text();
        let futures = state
            .extracted_statements
            .iter()
            .map(|statement| self.expand_one(caller, &proposal, statement));

        let outcomes = join_all(futures).await;
        let (impacts, failures) = partition_outcomes(outcomes).flatten();

        for failure in &failures {
            warn!(statement = %failure.item, error = %failure.error, "expansion failed for statement");
        }
        info!(
            statements = state.extracted_statements.len(),
            impacts = impacts.len(),
            failed = failures.len(),
            "expanded downstream impacts"
        );

        StageOutput::new(AnalysisPatch {
            downstream_impacts: Some(impacts),
            ..Default::default()
        })
        .with_failures(failures)
    }
}
