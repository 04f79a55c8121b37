//! Settings Models
//!
//! Application configuration stored in config.json.

use std::path::PathBuf;

use idea_impact_llm::{ModelPricing, ProviderConfig};
use idea_impact_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Cost gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Amount reserved from the balance before a run starts
    #[serde(default = "default_estimated_cost")]
    pub estimated_cost_microdollars: i64,
    /// SQLite file for the usage ledger and balances (platform data dir if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_estimated_cost() -> i64 {
    50_000 // $0.05
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            estimated_cost_microdollars: default_estimated_cost(),
            database_path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenAI-compatible endpoint
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Model routing per pipeline call site
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    /// Custom model pricing overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pricing: Vec<ModelPricing>,
    /// Default tracing level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            pipeline: PipelineConfig::default(),
            billing: BillingConfig::default(),
            pricing: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.pipeline.validate().map_err(|e| e.to_string())?;

        if self.billing.estimated_cost_microdollars < 0 {
            return Err("billing.estimated_cost_microdollars cannot be negative".to_string());
        }

        if self.provider.timeout_secs == 0 {
            return Err("provider.timeout_secs must be at least 1".to_string());
        }

        if self.provider.max_tokens == 0 {
            return Err("provider.max_tokens must be at least 1".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if let Some(p) = self
            .pricing
            .iter()
            .find(|p| p.input_price_per_million < 0 || p.output_price_per_million < 0)
        {
            return Err(format!("Pricing for {} cannot be negative", p.model_name));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.billing.estimated_cost_microdollars, 50_000);
        assert_eq!(config.pipeline.extract.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = AppConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_negative_cost() {
        let mut config = AppConfig::default();
        config.billing.estimated_cost_microdollars = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_pipeline_errors_surface() {
        let mut config = AppConfig::default();
        config.pipeline.categorize.max_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("categorize"));
    }

    #[test]
    fn test_validate_negative_pricing() {
        let mut config = AppConfig::default();
        config.pricing.push(ModelPricing::new("cheap", -1, 0));
        assert!(config.validate().is_err());
    }
}
