//! Usage Records
//!
//! One `UsageRecord` is emitted for every model invocation, successful or
//! not. Records flow into a `UsageSink`; the sink is append-only.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// A single model call's token usage and cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Model name (e.g., "gpt-4o-mini")
    pub model_name: String,
    /// Provider name (e.g., "openai")
    pub provider: String,
    /// Call site label (e.g., "extract", "evaluate")
    pub label: String,
    /// Number of input tokens
    pub input_tokens: i64,
    /// Number of output tokens
    pub output_tokens: i64,
    /// Calculated cost in microdollars (1 USD = 1,000,000 microdollars)
    pub cost_microdollars: i64,
    /// Whether the call produced a usable result
    pub success: bool,
    /// Failure description for unsuccessful calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unix timestamp of the record
    pub timestamp: i64,
}

impl UsageRecord {
    /// Create a successful usage record with zero cost
    pub fn new(
        model_name: impl Into<String>,
        provider: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            provider: provider.into(),
            label: String::new(),
            input_tokens,
            output_tokens,
            cost_microdollars: 0,
            success: true,
            error_message: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Set the call site label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set cost in microdollars
    pub fn with_cost(mut self, cost_microdollars: i64) -> Self {
        self.cost_microdollars = cost_microdollars;
        self
    }

    /// Mark the record as a failed call
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error.into());
        self
    }

    /// Get cost in dollars as f64
    pub fn cost_dollars(&self) -> f64 {
        self.cost_microdollars as f64 / 1_000_000.0
    }

    /// Get total tokens
    pub fn total_tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }
}

/// Append-only destination for usage records.
pub trait UsageSink: Send + Sync {
    /// Record one model call.
    fn record(&self, record: UsageRecord);
}

/// Sink that discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUsageSink;

impl UsageSink for NullUsageSink {
    fn record(&self, _record: UsageRecord) {}
}

/// In-memory ledger of the records emitted during one analysis run.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Default, Clone)]
pub struct RunLedger {
    records: Arc<Mutex<Vec<UsageRecord>>>,
}

impl RunLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in emission order
    pub fn records(&self) -> Vec<UsageRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove and return all records, leaving the ledger empty.
    pub fn drain(&self) -> Vec<UsageRecord> {
        match self.records.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether no record has been emitted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the cost of every held record, in microdollars
    pub fn total_cost_microdollars(&self) -> i64 {
        self.records().iter().map(|r| r.cost_microdollars).sum()
    }
}

impl UsageSink for RunLedger {
    fn record(&self, record: UsageRecord) {
        match self.records.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
