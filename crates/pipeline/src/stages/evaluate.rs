use std::collections::BTreeMap;

use async_trait::async_trait;
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

/// Finding stored for a category whose research or evaluation failed
pub const RESEARCH_FAILED_PLACEHOLDER: &str = "Research could not be completed for this category.";

/// Score stored for a category whose research or evaluation failed
const NEUTRAL_SCORE: f64 = 0.0;

/// Structured verdict for one category
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CategoryEvaluation {
    /// Concise summary of the evidence
    research_summary: String,
    /// Net impact from -1.0 to 1.0
    score: f64,
}

/// Bound a model-provided score to `[-1, 1]`; NaN becomes neutral.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        NEUTRAL_SCORE
    } else {
        score.clamp(-1.0, 1.0)
    }
}

/// Categories → research findings and scores.
///
/// Categories are processed one after another: a free-text research call,
/// then a structured evaluation that embeds the research. A category that
/// fails at either step gets the placeholder finding and a neutral score.
#[derive(Debug, Clone)]
pub struct ResearchEvaluateStage {
    research: CallPolicy,
    evaluate: CallPolicy,
}

impl ResearchEvaluateStage {
    pub fn new(research: CallPolicy, evaluate: CallPolicy) -> Self {
        Self { research, evaluate }
    }

    async fn evaluate_one(
        &self,
        caller: &RetryingCaller,
        proposal: &str,
        category: &str,
        impacts: &[String],
    ) -> ItemOutcome<(String, f64)> {
        let statements = prompts::bullet_list(impacts);

        let research_vars = prompt_vars([
            ("proposal", proposal),
            ("category", category),
            ("statements", statements.as_str()),
        ]);
        let research = caller
            .call_text("research", &self.research, &prompts::research(), &research_vars)
            .await
            .map_err(|e| ItemFailure::new(category, e))?;

        let evaluate_vars = prompt_vars([
            ("category", category),
            ("statements", statements.as_str()),
            ("research", research.as_str()),
        ]);
        let evaluation = caller
            .call_structured::<CategoryEvaluation>(
                "evaluate",
                &self.evaluate,
                &prompts::evaluate(),
                &evaluate_vars,
            )
            .await
            .map_err(|e| ItemFailure::new(category, e))?;

        let score = clamp_score(evaluation.score);
        if score != evaluation.score {
            debug!(category, raw = evaluation.score, score, "clamped category score");
        }
        Ok((evaluation.research_summary, score))
    }
}

#[async_trait]
impl AnalysisStage for ResearchEvaluateStage {
    fn kind(&self) -> StageKind {
        StageKind::ResearchEvaluate
    }

    async fn run(&self, caller: &RetryingCaller, state: &AnalysisState) -> StageOutput {
        let proposal = state.proposal.prompt_text();
        let mut findings = BTreeMap::new();
        let mut scores = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(state.grouped_categories.len());

        for (category, impacts) in &state.grouped_categories {
            let outcome = self.evaluate_one(caller, &proposal, category, impacts).await;
            let (finding, score) = match &outcome {
                Ok((finding, score)) => (finding.clone(), *score),
                Err(failure) => {
                    warn!(category = %category, error = %failure.error, "category evaluation failed");
                    (RESEARCH_FAILED_PLACEHOLDER.to_string(), NEUTRAL_SCORE)
                }
            };
            findings.insert(category.clone(), finding);
            scores.insert(category.clone(), score);
            outcomes.push(outcome);
        }

        let parts = partition_outcomes(outcomes);
        info!(
            categories = state.grouped_categories.len(),
            failed = parts.failures.len(),
            "evaluated categories"
        );

        StageOutput::new(AnalysisPatch {
            research_findings: Some(findings),
            evaluated_scores: Some(scores),
            ..Default::default()
        })
        .with_failures(parts.failures)
    }
}
