use async_trait::async_trait;
use idea_impact_core::prompt_vars;
use idea_impact_llm::{CallPolicy, RetryingCaller};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AnalysisStage, StageOutput};
use crate::config::StageKind;
use crate::fan_out::ItemFailure;
use crate::prompts;
use crate::state::{AnalysisPatch, AnalysisState, CategoryMap};

/// Name used when the model returns a blank category name
const UNNAMED_CATEGORY: &str = "Other";

#[derive(Debug, Deserialize, JsonSchema)]
struct CategoryList {
    categories: Vec<CategoryGroup>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CategoryGroup {
    name: String,
    #[serde(default)]
    impacts: Vec<String>,
}

/// Merge groups into a map; repeated names are combined in order.
fn merge_groups(groups: Vec<CategoryGroup>) -> CategoryMap {
    let mut map = CategoryMap::new();
    for group in groups {
        let name = match group.name.trim() {
            "" => UNNAMED_CATEGORY.to_string(),
            n => n.to_string(),
        };
        let impacts = group
            .impacts
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        map.entry(name).or_default().extend(impacts);
    }
    map
}

/// Downstream impacts → named categories. Exhaustion yields an empty map.
///
/// The impacts are joined into one block, so which statement produced
/// which impact is not carried forward.
#[derive(Debug, Clone)]
pub struct CategorizeStage {
    policy: CallPolicy,
}

impl CategorizeStage {
    pub fn new(policy: CallPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl AnalysisStage for CategorizeStage {
    fn kind(&self) -> StageKind {
        StageKind::Categorize
    }

    async fn run(&self, caller: &RetryingCaller, state: &AnalysisState) -> StageOutput {
        if state.downstream_impacts.is_empty() {
            debug!("no impacts to categorize");
            return StageOutput::new(AnalysisPatch {
                grouped_categories: Some(CategoryMap::new()),
                ..Default::default()
            });
        }

        let vars = prompt_vars([("impacts", prompts::bullet_list(&state.downstream_impacts))]);
        let result = caller
            .call_structured::<CategoryList>("categorize", &self.policy, &prompts::categorize(), &vars)
            .await;

        match result {
            Ok(list) => {
                let categories = merge_groups(list.categories);
                info!(count = categories.len(), "grouped impacts into categories");
                StageOutput::new(AnalysisPatch {
                    grouped_categories: Some(categories),
                    ..Default::default()
                })
            }
            Err(e) => {
                warn!(error = %e, "categorization failed, continuing with no categories");
                StageOutput::new(AnalysisPatch {
                    grouped_categories: Some(CategoryMap::new()),
                    ..Default::default()
                })
                .with_failures(vec![ItemFailure::new("impacts", e)])
            }
        }
    }
}
