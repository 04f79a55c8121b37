//! Analysis State
//!
//! The single aggregate threaded through the pipeline. Each stage returns an
//! [`AnalysisPatch`] naming only the fields it produced; the orchestrator
//! merges patches in stage order.

use std::collections::BTreeMap;

use idea_impact_core::Recommendation;
use serde::{Deserialize, Serialize};

/// Category name to the downstream impacts grouped under it
pub type CategoryMap = BTreeMap<String, Vec<String>>;

/// A submitted idea
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Proposal {
    /// Create an untitled proposal
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            title: None,
            text: text.into(),
        }
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Text substituted into prompts
    pub fn prompt_text(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => format!("{}\n\n{}", title, self.text),
            _ => self.text.clone(),
        }
    }
}

impl From<&str> for Proposal {
    fn from(text: &str) -> Self {
        Proposal::new(text)
    }
}

impl From<String> for Proposal {
    fn from(text: String) -> Self {
        Proposal::new(text)
    }
}

/// Everything known about one proposal's analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    pub proposal: Proposal,
    pub extracted_statements: Vec<String>,
    pub downstream_impacts: Vec<String>,
    pub grouped_categories: CategoryMap,
    pub research_findings: BTreeMap<String, String>,
    pub evaluated_scores: BTreeMap<String, f64>,
    pub final_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

impl AnalysisState {
    /// Fresh state with empty collections
    pub fn new(proposal: Proposal) -> Self {
        Self {
            proposal,
            extracted_statements: Vec::new(),
            downstream_impacts: Vec::new(),
            grouped_categories: CategoryMap::new(),
            research_findings: BTreeMap::new(),
            evaluated_scores: BTreeMap::new(),
            final_summary: String::new(),
            recommendation: None,
        }
    }

    /// Merge a stage's output. Fields absent from the patch are untouched.
    pub fn apply(&mut self, patch: AnalysisPatch) {
        let AnalysisPatch {
            extracted_statements,
            downstream_impacts,
            grouped_categories,
            research_findings,
            evaluated_scores,
            final_summary,
            recommendation,
        } = patch;

        if let Some(v) = extracted_statements {
            self.extracted_statements = v;
        }
        if let Some(v) = downstream_impacts {
            self.downstream_impacts = v;
        }
        if let Some(v) = grouped_categories {
            self.grouped_categories = v;
        }
        if let Some(v) = research_findings {
            self.research_findings = v;
        }
        if let Some(v) = evaluated_scores {
            self.evaluated_scores = v;
        }
        if let Some(v) = final_summary {
            self.final_summary = v;
        }
        if let Some(v) = recommendation {
            self.recommendation = Some(v);
        }
    }
}

/// Partial update produced by one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisPatch {
    pub extracted_statements: Option<Vec<String>>,
    pub downstream_impacts: Option<Vec<String>>,
    pub grouped_categories: Option<CategoryMap>,
    pub research_findings: Option<BTreeMap<String, String>>,
    pub evaluated_scores: Option<BTreeMap<String, f64>>,
    pub final_summary: Option<String>,
    pub recommendation: Option<Recommendation>,
}
