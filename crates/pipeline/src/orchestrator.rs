//! Analysis Orchestrator
//!
//! Runs the five stages strictly in order over one [`AnalysisState`],
//! merging each stage's patch before the next starts. Stages degrade
//! instead of failing, so a run always completes with a full state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use idea_impact_core::UsageSink;
use idea_impact_llm::RetryingCaller;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use crate::config::{PipelineConfig, StageKind};
use crate::stages::{
    AnalysisStage, CategorizeStage, ExpandStage, ExtractStage, ResearchEvaluateStage,
    SummarizeStage,
};
use crate::state::{AnalysisState, Proposal};

/// How one stage went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: StageKind,
    /// Whether any part of the stage fell back to defaults
    pub degraded: bool,
    pub failures: Vec<String>,
    pub duration_ms: u64,
}

/// Final state plus per-stage reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub state: AnalysisState,
    pub reports: Vec<StageReport>,
    pub total_duration_ms: u64,
}

impl AnalysisRun {
    /// Whether any stage degraded
    pub fn is_degraded(&self) -> bool {
        self.reports.iter().any(|r| r.degraded)
    }

    pub fn report(&self, stage: StageKind) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }
}

/// The standard stage sequence for a configuration
pub fn default_stages(config: &PipelineConfig) -> Vec<Arc<dyn AnalysisStage>> {
    vec![
        Arc::new(ExtractStage::new(config.extract.clone())),
        Arc::new(ExpandStage::new(config.expand.clone())),
        Arc::new(CategorizeStage::new(config.categorize.clone())),
        Arc::new(ResearchEvaluateStage::new(
            config.research.clone(),
            config.evaluate.clone(),
        )),
        Arc::new(SummarizeStage::new(config.summarize.clone())),
    ]
}

/// Entry point for analysing one proposal
#[derive(Clone)]
pub struct Orchestrator {
    caller: RetryingCaller,
    stages: Vec<Arc<dyn AnalysisStage>>,
}

impl Orchestrator {
    /// Orchestrator running the standard stages
    pub fn new(caller: RetryingCaller, config: &PipelineConfig) -> Self {
        let caller = caller.with_retry_delay(Duration::from_millis(config.retry_delay_ms));
        Self::with_stages(caller, default_stages(config))
    }

    /// Orchestrator running a custom stage sequence
    pub fn with_stages(caller: RetryingCaller, stages: Vec<Arc<dyn AnalysisStage>>) -> Self {
        Self { caller, stages }
    }

    /// Copy of this orchestrator whose usage records go to `sink`
    pub fn with_usage_sink(&self, sink: Arc<dyn UsageSink>) -> Self {
        Self {
            caller: self.caller.clone().with_usage_sink(sink),
            stages: self.stages.clone(),
        }
    }

    /// Analyse a proposal and return the final state
    pub async fn run_analysis(&self, proposal: impl Into<Proposal>) -> AnalysisState {
        self.run_analysis_with_report(proposal).await.state
    }

    /// Analyse a proposal, reporting how each stage went
    pub async fn run_analysis_with_report(&self, proposal: impl Into<Proposal>) -> AnalysisRun {
        let mut state = AnalysisState::new(proposal.into());
        let mut reports = Vec::with_capacity(self.stages.len());
        let started = Instant::now();

        for stage in &self.stages {
            let kind = stage.kind();
            let stage_started = Instant::now();

            let output = stage
                .run(&self.caller, &state)
                .instrument(info_span!("stage", stage = %kind))
                .await;

            let report = StageReport {
                stage: kind,
                degraded: output.is_degraded(),
                failures: output.failures.iter().map(ToString::to_string).collect(),
                duration_ms: stage_started.elapsed().as_millis() as u64,
            };
            if report.degraded {
                warn!(stage = %kind, failures = report.failures.len(), "stage degraded");
            }

            state.apply(output.patch);
            reports.push(report);
        }

        let total_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            statements = state.extracted_statements.len(),
            categories = state.grouped_categories.len(),
            duration_ms = total_duration_ms,
            "analysis complete"
        );

        AnalysisRun {
            state,
            reports,
            total_duration_ms,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<StageKind> = self.stages.iter().map(|s| s.kind()).collect();
        f.debug_struct("Orchestrator")
            .field("caller", &self.caller)
            .field("stages", &stages)
            .finish()
    }
}
