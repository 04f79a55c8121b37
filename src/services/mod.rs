//! Services
//!
//! Business logic services for the application.
//! Services handle billing and gated analysis and are called by the CLI.

pub mod analysis;
pub mod analytics;
pub mod cost_gate;

pub use analysis::{AnalysisOutcome, AnalysisService};
pub use analytics::{BalanceStore, MemoryBalanceStore, SqliteBalanceStore, UsageLedgerService};
pub use cost_gate::{CostGate, Reservation, Settlement};
