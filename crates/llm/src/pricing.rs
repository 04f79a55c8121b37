//! Cost Calculator
//!
//! Handles cost calculation for model usage with configurable pricing.
//! Prices and costs are integer microdollars (1 USD = 1,000,000 microdollars).

use std::collections::HashMap;
use std::sync::RwLock;

use idea_impact_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Fallback input price for unknown models ($5 per million tokens)
const UNKNOWN_INPUT_PRICE: i64 = 5_000_000;
/// Fallback output price for unknown models ($15 per million tokens)
const UNKNOWN_OUTPUT_PRICE: i64 = 15_000_000;

/// Model pricing information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model name (versioned names match by prefix)
    pub model_name: String,
    /// Input token price per million tokens in microdollars
    pub input_price_per_million: i64,
    /// Output token price per million tokens in microdollars
    pub output_price_per_million: i64,
    /// Whether this is a custom/override pricing
    #[serde(default)]
    pub is_custom: bool,
}

impl ModelPricing {
    /// Create new pricing for a model
    pub fn new(
        model_name: impl Into<String>,
        input_price_per_million: i64,
        output_price_per_million: i64,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            input_price_per_million,
            output_price_per_million,
            is_custom: false,
        }
    }

    /// Calculate cost for given token counts
    pub fn calculate_cost(&self, input_tokens: i64, output_tokens: i64) -> i64 {
        let input_cost = (input_tokens * self.input_price_per_million) / 1_000_000;
        let output_cost = (output_tokens * self.output_price_per_million) / 1_000_000;
        input_cost + output_cost
    }
}

/// Default pricing data for common models
fn get_default_pricing() -> Vec<ModelPricing> {
    vec![
        // OpenAI
        ModelPricing::new("gpt-4o", 2_500_000, 10_000_000),
        ModelPricing::new("gpt-4o-mini", 150_000, 600_000),
        ModelPricing::new("gpt-4.1", 2_000_000, 8_000_000),
        ModelPricing::new("gpt-4.1-mini", 400_000, 1_600_000),
        ModelPricing::new("gpt-4-turbo", 10_000_000, 30_000_000),
        ModelPricing::new("gpt-3.5-turbo", 500_000, 1_500_000),
        ModelPricing::new("o3-mini", 1_100_000, 4_400_000),
        // Anthropic (via compatible gateways)
        ModelPricing::new("claude-3-5-sonnet", 3_000_000, 15_000_000),
        ModelPricing::new("claude-3-5-haiku", 1_000_000, 5_000_000),
        ModelPricing::new("claude-sonnet-4", 3_000_000, 15_000_000),
        // DeepSeek
        ModelPricing::new("deepseek-chat", 270_000, 1_100_000),
        ModelPricing::new("deepseek-reasoner", 550_000, 2_190_000),
        // Local models (free)
        ModelPricing::new("llama3", 0, 0),
        ModelPricing::new("mistral", 0, 0),
        ModelPricing::new("qwen2", 0, 0),
    ]
}

/// Cost calculator for computing model usage costs
#[derive(Debug)]
pub struct CostCalculator {
    /// Pricing lookup by model name
    pricing: RwLock<HashMap<String, ModelPricing>>,
    /// Custom overrides by model name
    custom_overrides: RwLock<HashMap<String, ModelPricing>>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostCalculator {
    /// Create a new cost calculator with default pricing
    pub fn new() -> Self {
        let pricing_map = get_default_pricing()
            .into_iter()
            .map(|p| (p.model_name.clone(), p))
            .collect();

        Self {
            pricing: RwLock::new(pricing_map),
            custom_overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Create a calculator with defaults plus the given overrides
    pub fn with_overrides(overrides: Vec<ModelPricing>) -> CoreResult<Self> {
        let calc = Self::new();
        for p in overrides {
            calc.set_custom_pricing(p)?;
        }
        Ok(calc)
    }

    /// Get pricing for a specific model
    pub fn get_pricing(&self, model_name: &str) -> Option<ModelPricing> {
        // Check custom overrides first
        if let Ok(custom) = self.custom_overrides.read() {
            if let Some(pricing) = custom.get(model_name) {
                return Some(pricing.clone());
            }
        }

        let pricing = self.pricing.read().ok()?;
        if let Some(p) = pricing.get(model_name) {
            return Some(p.clone());
        }

        // Match versioned models by the longest known prefix
        pricing
            .values()
            .filter(|p| model_name.starts_with(&p.model_name))
            .max_by_key(|p| p.model_name.len())
            .cloned()
    }

    /// Calculate cost in microdollars for given token counts
    pub fn calculate_cost(&self, model_name: &str, input_tokens: i64, output_tokens: i64) -> i64 {
        if let Some(pricing) = self.get_pricing(model_name) {
            pricing.calculate_cost(input_tokens, output_tokens)
        } else {
            let input_cost = (input_tokens * UNKNOWN_INPUT_PRICE) / 1_000_000;
            let output_cost = (output_tokens * UNKNOWN_OUTPUT_PRICE) / 1_000_000;
            input_cost + output_cost
        }
    }

    /// Set custom pricing override for a model
    pub fn set_custom_pricing(&self, pricing: ModelPricing) -> CoreResult<()> {
        let mut custom = self
            .custom_overrides
            .write()
            .map_err(|_| CoreError::internal("Failed to acquire custom overrides lock"))?;

        custom.insert(
            pricing.model_name.clone(),
            ModelPricing {
                is_custom: true,
                ..pricing
            },
        );

        Ok(())
    }

    /// Remove custom pricing override for a model
    pub fn remove_custom_pricing(&self, model_name: &str) -> CoreResult<bool> {
        let mut custom = self
            .custom_overrides
            .write()
            .map_err(|_| CoreError::internal("Failed to acquire custom overrides lock"))?;

        Ok(custom.remove(model_name).is_some())
    }
}
