//! Analytics Models
//!
//! Data structures for the persisted usage ledger.

use idea_impact_core::UsageRecord;
use serde::{Deserialize, Serialize};

/// A usage record as stored in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUsageRecord {
    /// Unique record identifier
    pub id: i64,
    /// User billed for the call
    pub user_id: String,
    /// Analysis run the call belonged to
    pub run_id: String,
    #[serde(flatten)]
    pub record: UsageRecord,
}

/// Aggregated usage statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UsageStats {
    /// Total input tokens
    pub total_input_tokens: i64,
    /// Total output tokens
    pub total_output_tokens: i64,
    /// Total cost in microdollars
    pub total_cost_microdollars: i64,
    /// Number of model calls
    pub request_count: i64,
    /// Number of calls that failed
    pub failed_count: i64,
}

impl UsageStats {
    /// Get total cost in dollars
    pub fn total_cost_dollars(&self) -> f64 {
        self.total_cost_microdollars as f64 / 1_000_000.0
    }

    /// Get total tokens
    pub fn total_tokens(&self) -> i64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Usage aggregated by model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Model name
    pub model_name: String,
    /// Usage statistics for this model
    pub stats: UsageStats,
}

/// Per-user usage summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub user_id: String,
    /// Number of distinct analysis runs
    pub run_count: i64,
    pub totals: UsageStats,
    /// Breakdown by model, most expensive first
    pub by_model: Vec<ModelUsage>,
}

/// Filter criteria for usage queries
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageFilter {
    /// Filter by user
    pub user_id: Option<String>,
    /// Filter by analysis run
    pub run_id: Option<String>,
    /// Filter by model name
    pub model_name: Option<String>,
    /// Start timestamp (Unix epoch, inclusive)
    pub start_timestamp: Option<i64>,
    /// End timestamp (Unix epoch, exclusive)
    pub end_timestamp: Option<i64>,
    /// Maximum number of records returned
    pub limit: Option<u32>,
}

impl UsageFilter {
    /// Create a filter for the last N days
    pub fn last_days(days: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        let start = now - (days * 24 * 60 * 60);
        Self {
            start_timestamp: Some(start),
            end_timestamp: Some(now + 1),
            ..Default::default()
        }
    }

    /// Set user filter
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set run filter
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set model filter
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// Cap the number of records
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_stats_totals() {
        let stats = UsageStats {
            total_input_tokens: 1000,
            total_output_tokens: 500,
            total_cost_microdollars: 2_500_000,
            request_count: 3,
            failed_count: 1,
        };
        assert_eq!(stats.total_tokens(), 1500);
        assert!((stats.total_cost_dollars() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_filter_builders() {
        let filter = UsageFilter::last_days(7)
            .with_user("alice")
            .with_model("gpt-4o")
            .with_limit(10);
        assert_eq!(filter.user_id.as_deref(), Some("alice"));
        assert_eq!(filter.limit, Some(10));
        let span = filter.end_timestamp.unwrap() - filter.start_timestamp.unwrap();
        assert_eq!(span, 7 * 24 * 60 * 60 + 1);
    }

    #[test]
    fn test_stored_record_flattens() {
        let stored = StoredUsageRecord {
            id: 1,
            user_id: "u".to_string(),
            run_id: "r".to_string(),
            record: UsageRecord::new("gpt-4o", "openai", 1, 2),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["model_name"], "gpt-4o");
        assert_eq!(json["run_id"], "r");
    }
}
