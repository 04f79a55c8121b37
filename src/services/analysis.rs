//! Analysis Service
//!
//! Gated entry point for analysing proposals on behalf of a user:
//! reserve budget, run the pipeline with a per-run usage ledger, then bill
//! the actual cost of every model call.

use std::sync::Arc;

use idea_impact_llm::{CostCalculator, ModelInvoker, OpenAICompatibleProvider, RetryingCaller};
use idea_impact_pipeline::{AnalysisRun, Orchestrator, Proposal};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::settings::AppConfig;
use crate::services::analytics::{SqliteBalanceStore, UsageLedgerService};
use crate::services::cost_gate::{CostGate, Settlement};
use crate::storage::open_pool;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths;

/// Result of one billed analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub run: AnalysisRun,
    pub settlement: Settlement,
}

impl AnalysisOutcome {
    pub fn run_id(&self) -> &str {
        &self.settlement.run_id
    }
}

/// Runs analyses behind the cost gate
#[derive(Clone)]
pub struct AnalysisService {
    orchestrator: Orchestrator,
    gate: CostGate,
    estimated_cost: i64,
}

impl AnalysisService {
    pub fn new(orchestrator: Orchestrator, gate: CostGate, estimated_cost: i64) -> Self {
        Self {
            orchestrator,
            gate,
            estimated_cost,
        }
    }

    /// Wire the provider, pricing, pipeline and SQLite stores from configuration
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;

        let provider = Arc::new(OpenAICompatibleProvider::new(config.provider.clone())?);
        let pricing = Arc::new(CostCalculator::with_overrides(config.pricing.clone())?);
        let caller = RetryingCaller::new(ModelInvoker::new(provider, pricing));
        let orchestrator = Orchestrator::new(caller, &config.pipeline);

        let db_path = match &config.billing.database_path {
            Some(path) => path.clone(),
            None => paths::database_path()?,
        };
        let pool = open_pool(&db_path)?;
        let ledger = Arc::new(UsageLedgerService::from_pool(pool.clone())?);
        let balances = Arc::new(SqliteBalanceStore::from_pool(pool)?);

        info!(database = %db_path.display(), "analysis service ready");
        Ok(Self::new(
            orchestrator,
            CostGate::new(balances, ledger),
            config.billing.estimated_cost_microdollars,
        ))
    }

    pub fn gate(&self) -> &CostGate {
        &self.gate
    }

    pub fn estimated_cost(&self) -> i64 {
        self.estimated_cost
    }

    /// Analyse a proposal and bill the user for it
    pub async fn analyze(
        &self,
        user_id: &str,
        proposal: impl Into<Proposal>,
    ) -> AppResult<AnalysisOutcome> {
        self.analyze_with_cancel(user_id, proposal, CancellationToken::new())
            .await
    }

    /// Analyse a proposal, abandoning in-flight calls when `cancel` fires.
    ///
    /// A cancelled run is still billed for the calls that completed before
    /// cancellation and returns [`AppError::Cancelled`]. Settlement writes
    /// to SQLite on the blocking pool.
    pub async fn analyze_with_cancel(
        &self,
        user_id: &str,
        proposal: impl Into<Proposal>,
        cancel: CancellationToken,
    ) -> AppResult<AnalysisOutcome> {
        let proposal = proposal.into();
        let reservation = self.gate.reserve(user_id, self.estimated_cost)?;
        let orchestrator = self
            .orchestrator
            .with_usage_sink(Arc::new(reservation.ledger().clone()));

        let run = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            run = orchestrator.run_analysis_with_report(proposal) => Some(run),
        };

        let run_id = reservation.run_id().to_string();
        let settlement = tokio::task::spawn_blocking(move || reservation.settle())
            .await
            .map_err(|e| AppError::internal(format!("settlement task failed: {e}")))??;

        match run {
            Some(run) => {
                info!(
                    user_id,
                    run_id = %run_id,
                    degraded = run.is_degraded(),
                    cost = settlement.actual_microdollars,
                    duration_ms = run.total_duration_ms,
                    "analysis complete"
                );
                Ok(AnalysisOutcome { run, settlement })
            }
            None => {
                warn!(
                    user_id,
                    run_id = %run_id,
                    billed = settlement.actual_microdollars,
                    records = settlement.records,
                    "analysis cancelled"
                );
                Err(AppError::Cancelled)
            }
        }
    }
}

impl std::fmt::Debug for AnalysisService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisService")
            .field("gate", &self.gate)
            .field("estimated_cost", &self.estimated_cost)
            .finish()
    }
}
