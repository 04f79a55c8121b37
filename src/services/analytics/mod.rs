//! Usage Ledger and Balances
//!
//! Persisted usage records plus the balance stores the cost gate reserves
//! against.

mod balance;
mod service;

pub use balance::*;
pub use service::*;
