//! Idea Impact Pipeline
//!
//! Turns one proposal into a sustainability impact analysis:
//!
//! ```text
//! proposal → extract → expand (per statement, concurrent) → categorize
//!          → research + evaluate (per category, sequential) → summarize
//! ```
//!
//! Every model call goes through the retrying caller. Stages degrade to
//! empty or placeholder values rather than failing, so the orchestrator
//! always returns a complete [`AnalysisState`].

pub mod config;
pub mod fan_out;
pub mod orchestrator;
pub mod prompts;
pub mod stages;
pub mod state;

pub use config::{PipelineConfig, StageKind, StageModelConfig};
pub use fan_out::{partition_outcomes, ItemFailure, ItemOutcome, Partitioned};
pub use orchestrator::{default_stages, AnalysisRun, Orchestrator, StageReport};
pub use stages::{
    clamp_score, AnalysisStage, StageOutput, RESEARCH_FAILED_PLACEHOLDER, SUMMARY_FAILED_MESSAGE,
};
pub use state::{AnalysisPatch, AnalysisState, CategoryMap, Proposal};
