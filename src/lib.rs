//! Idea Impact - Application Library
//!
//! Wires the analysis pipeline to configuration, persistence and billing.
//! It includes:
//! - Gated analysis service (balance check, per-run usage ledger, settlement)
//! - Storage layer (SQLite pool, JSON config)
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, BillingConfig};
pub use services::{AnalysisOutcome, AnalysisService, CostGate};
pub use storage::ConfigService;
pub use utils::error::{AppError, AppResult};
