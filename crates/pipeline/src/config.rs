//! Pipeline Configuration
//!
//! Model routing per call site. Every stage goes through the retrying caller
//! with its own primary model, fallback ladder, temperature and attempt budget.

use idea_impact_core::{CoreError, CoreResult};
use idea_impact_llm::CallPolicy;
use serde::{Deserialize, Serialize};

/// Models and retry budget for one call site
pub type StageModelConfig = CallPolicy;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Extract,
    Expand,
    Categorize,
    ResearchEvaluate,
    Summarize,
}

impl StageKind {
    /// All stages, in order
    pub const ALL: [StageKind; 5] = [
        StageKind::Extract,
        StageKind::Expand,
        StageKind::Categorize,
        StageKind::ResearchEvaluate,
        StageKind::Summarize,
    ];
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Extract => write!(f, "extract"),
            StageKind::Expand => write!(f, "expand"),
            StageKind::Categorize => write!(f, "categorize"),
            StageKind::ResearchEvaluate => write!(f, "research_evaluate"),
            StageKind::Summarize => write!(f, "summarize"),
        }
    }
}

/// Per-call-site model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_extract")]
    pub extract: StageModelConfig,
    #[serde(default = "default_expand")]
    pub expand: StageModelConfig,
    #[serde(default = "default_categorize")]
    pub categorize: StageModelConfig,
    /// Free-text research call inside Research+Evaluate
    #[serde(default = "default_research")]
    pub research: StageModelConfig,
    /// Structured scoring call inside Research+Evaluate
    #[serde(default = "default_evaluate")]
    pub evaluate: StageModelConfig,
    #[serde(default = "default_summarize")]
    pub summarize: StageModelConfig,
    /// Delay before retrying the same model, in milliseconds
    #[serde(default)]
    pub retry_delay_ms: u64,
}

fn policy(primary: &str, fallback: &str, temperature: f32) -> StageModelConfig {
    CallPolicy::new(primary)
        .with_fallbacks([fallback])
        .with_temperature(temperature)
        .with_max_retries(3)
}

fn default_extract() -> StageModelConfig {
    policy("gpt-4o-mini", "gpt-4o", 0.0)
}

fn default_expand() -> StageModelConfig {
    policy("gpt-4o-mini", "gpt-4o", 0.3)
}

fn default_categorize() -> StageModelConfig {
    policy("gpt-4o-mini", "gpt-4o", 0.0)
}

fn default_research() -> StageModelConfig {
    policy("gpt-4o", "gpt-4.1", 0.5)
}

fn default_evaluate() -> StageModelConfig {
    policy("gpt-4o", "gpt-4.1", 0.0)
}

fn default_summarize() -> StageModelConfig {
    policy("gpt-4o", "gpt-4.1", 0.3)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extract: default_extract(),
            expand: default_expand(),
            categorize: default_categorize(),
            research: default_research(),
            evaluate: default_evaluate(),
            summarize: default_summarize(),
            retry_delay_ms: 0,
        }
    }
}

impl PipelineConfig {
    /// Same policy for every call site
    pub fn uniform(policy: StageModelConfig) -> Self {
        Self {
            extract: policy.clone(),
            expand: policy.clone(),
            categorize: policy.clone(),
            research: policy.clone(),
            evaluate: policy.clone(),
            summarize: policy,
            retry_delay_ms: 0,
        }
    }

    /// Call sites with their names
    pub fn call_sites(&self) -> [(&'static str, &StageModelConfig); 6] {
        [
            ("extract", &self.extract),
            ("expand", &self.expand),
            ("categorize", &self.categorize),
            ("research", &self.research),
            ("evaluate", &self.evaluate),
            ("summarize", &self.summarize),
        ]
    }

    /// Reject configurations the retrying caller cannot honour.
    ///
    /// Every call site needs a fallback model. `max_retries` may differ
    /// from the default of 3 but must be at least 1.
    pub fn validate(&self) -> CoreResult<()> {
        for (site, policy) in self.call_sites() {
            if policy.max_retries == 0 {
                return Err(CoreError::config(format!("{site}: max_retries must be at least 1")));
            }
            if policy.fallback_models.is_empty() {
                return Err(CoreError::config(format!(
                    "{site}: at least one fallback model is required"
                )));
            }
            if policy.models().iter().any(|m| m.trim().is_empty()) {
                return Err(CoreError::config(format!("{site}: model names must not be empty")));
            }
            if !(0.0..=2.0).contains(&policy.temperature) {
                return Err(CoreError::config(format!(
                    "{site}: temperature {} is outside [0, 2]",
                    policy.temperature
                )));
            }
        }
        Ok(())
    }
}
