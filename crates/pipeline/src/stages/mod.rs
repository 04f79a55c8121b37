//! Pipeline Stages
//!
//! Each stage reads fields already present on the [`AnalysisState`] and
//! returns a patch for the fields it owns. Stages never fail: a stage whose
//! calls are exhausted degrades to its documented empty value and reports
//! the failure instead.

mod categorize;
mod evaluate;
mod expand;
mod extract;
mod summarize;

pub use categorize::CategorizeStage;
pub use evaluate::{clamp_score, ResearchEvaluateStage, RESEARCH_FAILED_PLACEHOLDER};
pub use expand::ExpandStage;
pub use extract::ExtractStage;
pub use summarize::{SummarizeStage, SUMMARY_FAILED_MESSAGE};

use async_trait::async_trait;
use idea_impact_llm::RetryingCaller;

use crate::config::StageKind;
use crate::fan_out::ItemFailure;
use crate::state::{AnalysisPatch, AnalysisState};

/// What a stage produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub patch: AnalysisPatch,
    /// Items or whole-stage calls that fell back to defaults
    pub failures: Vec<ItemFailure>,
}

impl StageOutput {
    pub fn new(patch: AnalysisPatch) -> Self {
        Self {
            patch,
            failures: Vec::new(),
        }
    }

    pub fn with_failures(mut self, failures: Vec<ItemFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One transformation of the analysis state
#[async_trait]
pub trait AnalysisStage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(&self, caller: &RetryingCaller, state: &AnalysisState) -> StageOutput;
}
