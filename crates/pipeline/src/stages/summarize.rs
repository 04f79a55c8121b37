use async_trait::async_trait;
use idea_impact_core::{prompt_vars, Recommendation};
use idea_impact_llm::{CallPolicy, RetryingCaller};
use tracing::{info, warn};

use super::{AnalysisStage, StageOutput};
use crate::config::StageKind;
use crate::fan_out::ItemFailure;
use crate::prompts;
use crate::state::{AnalysisPatch, AnalysisState};

/// Summary stored when the narrative call is exhausted
pub const SUMMARY_FAILED_MESSAGE: &str = "Summary generation failed. Please try again later.";

/// Scores and findings → recommendation and narrative.
///
/// The acceptance verdict is computed here from the scores; the model only
/// explains it.
#[derive(Debug, Clone)]
pub struct SummarizeStage {
    policy: CallPolicy,
}

impl SummarizeStage {
    pub fn new(policy: CallPolicy) -> Self {
        Self { policy }
    }
}

fn verdict(recommendation: &Recommendation) -> &'static str {
    if recommendation.acceptable {
        "acceptable as-is"
    } else {
        "not acceptable as-is"
    }
}

#[async_trait]
impl AnalysisStage for SummarizeStage {
    fn kind(&self) -> StageKind {
        StageKind::Summarize
    }

    async fn run(&self, caller: &RetryingCaller, state: &AnalysisState) -> StageOutput {
        let recommendation = Recommendation::from_scores(state.evaluated_scores.values().copied());
        info!(
            acceptable = recommendation.acceptable,
            positive = recommendation.positive_total,
            negative = recommendation.negative_total,
            "applied acceptance rule"
        );

        let scores: Vec<String> = state
            .evaluated_scores
            .iter()
            .map(|(category, score)| format!("{category}: {score:.2}"))
            .collect();
        let findings: Vec<String> = state
            .research_findings
            .iter()
            .map(|(category, finding)| format!("{category}: {finding}"))
            .collect();

        let vars = prompt_vars([
            ("proposal", state.proposal.prompt_text()),
            ("scores", prompts::bullet_list(&scores)),
            ("findings", prompts::bullet_list(&findings)),
            ("positive_total", format!("{:.2}", recommendation.positive_total)),
            ("negative_total", format!("{:.2}", recommendation.negative_total)),
            ("verdict", verdict(&recommendation).to_string()),
        ]);

        let patch = |summary: String| AnalysisPatch {
            final_summary: Some(summary),
            recommendation: Some(recommendation),
            ..Default::default()
        };

        match caller
            .call_text("summarize", &self.policy, &prompts::summarize(), &vars)
            .await
        {
            Ok(summary) => StageOutput::new(patch(summary.trim().to_string())),
            Err(e) => {
                warn!(error = %e, "summary generation failed");
                StageOutput::new(patch(SUMMARY_FAILED_MESSAGE.to_string()))
                    .with_failures(vec![ItemFailure::new("summary", e)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{caller, policy, unavailable};
    use idea_impact_core::RunLedger;
    use idea_impact_llm::{Completion, ScriptedProvider};

    fn scored(scores: &[(&str, f64)]) -> AnalysisState {
        let mut state = AnalysisState::new("Solar farm".into());
        for (name, score) in scores {
            state.evaluated_scores.insert(name.to_string(), *score);
            state
                .research_findings
                .insert(name.to_string(), format!("{name} notes"));
        }
        state
    }

    #[tokio::test]
    async fn test_verdict_computed_in_code() {
        let provider = ScriptedProvider::new(|_, prompt| {
            assert!(prompt.contains("Verdict: acceptable as-is."));
            assert!(prompt.contains("- Energy: 0.90"));
            assert!(prompt.contains("- Land: Land notes"));
            Ok(Completion::new("  Go ahead.  ", 1, 1))
        });
        let ledger = RunLedger::new();

        let out = SummarizeStage::new(policy("summarize"))
            .run(
                &caller(&provider, &ledger),
                &scored(&[("Energy", 0.9), ("Jobs", 2.0), ("Land", -0.2)]),
            )
            .await;

        let rec = out.patch.recommendation.unwrap();
        assert!(rec.acceptable);
        assert!((rec.positive_total - 2.9).abs() < 1e-9);
        assert!((rec.negative_total - 0.2).abs() < 1e-9);
        assert_eq!(out.patch.final_summary.unwrap(), "Go ahead.");
    }

    #[tokio::test]
    async fn test_failure_keeps_recommendation() {
        let provider = ScriptedProvider::new(|_, _| Err(unavailable()));
        let ledger = RunLedger::new();

        let out = SummarizeStage::new(policy("summarize"))
            .run(&caller(&provider, &ledger), &scored(&[("Energy", 1.0), ("Land", -0.2)]))
            .await;

        assert!(out.is_degraded());
        assert_eq!(out.patch.final_summary.unwrap(), SUMMARY_FAILED_MESSAGE);
        assert!(!out.patch.recommendation.unwrap().acceptable);
    }
}
