//! Cost Gate
//!
//! Pre-flight balance check and post-run billing. A run starts only after
//! its estimated cost has been reserved; settlement persists every usage
//! record of the run and replaces the reservation with the actual cost.

use std::sync::Arc;

use idea_impact_core::RunLedger;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::services::analytics::{BalanceStore, UsageLedgerService};
use crate::utils::error::{AppError, AppResult};

/// Outcome of billing one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub run_id: String,
    /// Number of usage records persisted
    pub records: usize,
    pub reserved_microdollars: i64,
    pub actual_microdollars: i64,
    /// Balance after settlement
    pub balance: i64,
}

/// Balance checks and run billing
#[derive(Clone)]
pub struct CostGate {
    balances: Arc<dyn BalanceStore>,
    ledger: Arc<UsageLedgerService>,
}

impl CostGate {
    pub fn new(balances: Arc<dyn BalanceStore>, ledger: Arc<UsageLedgerService>) -> Self {
        Self { balances, ledger }
    }

    pub fn balances(&self) -> &Arc<dyn BalanceStore> {
        &self.balances
    }

    pub fn ledger(&self) -> &Arc<UsageLedgerService> {
        &self.ledger
    }

    /// Whether the user's balance covers `estimated_cost`
    pub fn has_sufficient_balance(&self, user_id: &str, estimated_cost: i64) -> AppResult<bool> {
        Ok(self.balances.get_balance(user_id)? >= estimated_cost)
    }

    /// Reserve `estimated_cost` for a new run.
    ///
    /// Fails with [`AppError::InsufficientBalance`] without touching the
    /// balance when the user cannot cover it.
    pub fn reserve(&self, user_id: &str, estimated_cost: i64) -> AppResult<Reservation> {
        match self.balances.try_reserve(user_id, estimated_cost)? {
            Some(balance) => {
                let run_id = uuid::Uuid::new_v4().to_string();
                info!(user_id, run_id = %run_id, reserved = estimated_cost, balance, "reserved analysis budget");
                Ok(Reservation {
                    gate: self.clone(),
                    user_id: user_id.to_string(),
                    run_id,
                    reserved: estimated_cost,
                    ledger: RunLedger::new(),
                    persisted: None,
                    settled: false,
                })
            }
            None => {
                let balance = self.balances.get_balance(user_id)?;
                warn!(user_id, balance, required = estimated_cost, "insufficient balance");
                Err(AppError::insufficient_balance(user_id, balance, estimated_cost))
            }
        }
    }
}

impl std::fmt::Debug for CostGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostGate")
            .field("ledger", &self.ledger)
            .finish()
    }
}

/// Records of a run that are already in the usage ledger
#[derive(Debug, Clone, Copy)]
struct Persisted {
    records: usize,
    actual: i64,
}

/// Budget held for one run.
///
/// Usage records of the run go into [`Reservation::ledger`]. Settlement
/// first persists the records, then charges their cost; a failed step is
/// retried on the next attempt without writing the records twice. A
/// reservation dropped unsettled makes one more attempt with the records
/// collected so far.
pub struct Reservation {
    gate: CostGate,
    user_id: String,
    run_id: String,
    reserved: i64,
    ledger: RunLedger,
    persisted: Option<Persisted>,
    settled: bool,
}

impl Reservation {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Sink for this run's usage records
    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Persist the run's records and charge the actual cost.
    ///
    /// On error nothing is lost: the records stay in the run ledger and the
    /// reservation stays open, so the call can be repeated.
    pub fn try_settle(&mut self) -> AppResult<Settlement> {
        if self.settled {
            return Err(AppError::internal(format!("run {} is already settled", self.run_id)));
        }

        let persisted = match self.persisted {
            Some(persisted) => persisted,
            None => {
                let records = self.ledger.records();
                let actual: i64 = records.iter().map(|r| r.cost_microdollars).sum();
                self.gate
                    .ledger
                    .record_run(&self.user_id, &self.run_id, &records)?;
                let persisted = Persisted {
                    records: records.len(),
                    actual,
                };
                self.persisted = Some(persisted);
                persisted
            }
        };

        let balance = self
            .gate
            .balances
            .settle(&self.user_id, self.reserved, persisted.actual)?;
        self.settled = true;
        self.ledger.drain();

        info!(
            user_id = %self.user_id,
            run_id = %self.run_id,
            records = persisted.records,
            reserved = self.reserved,
            actual = persisted.actual,
            balance,
            "settled analysis run"
        );

        Ok(Settlement {
            run_id: self.run_id.clone(),
            records: persisted.records,
            reserved_microdollars: self.reserved,
            actual_microdollars: persisted.actual,
            balance,
        })
    }

    /// Settle, consuming the reservation.
    ///
    /// If this fails, dropping the reservation makes one more attempt.
    pub fn settle(mut self) -> AppResult<Settlement> {
        self.try_settle()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(run_id = %self.run_id, "reservation dropped before settlement, billing completed calls");
        if let Err(e) = self.try_settle() {
            error!(
                run_id = %self.run_id,
                user_id = %self.user_id,
                unbilled_records = self.ledger.len(),
                error = %e,
                "failed to settle dropped reservation"
            );
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("user_id", &self.user_id)
            .field("run_id", &self.run_id)
            .field("reserved", &self.reserved)
            .field("records", &self.ledger.len())
            .field("settled", &self.settled)
            .finish()
    }
}
