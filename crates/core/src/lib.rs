//! Idea Impact Core
//!
//! Foundational types shared by every crate in the Idea Impact workspace.
//! This crate has no dependency on model providers, storage or the async
//! runtime.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `template` - Prompt templates with `{{name}}` placeholders
//! - `usage` - Per-call usage records and the sink they are emitted into
//! - `scoring` - Vote-based impact scoring
//! - `recommendation` - The 10x asymmetry acceptance rule

pub mod error;
pub mod recommendation;
pub mod scoring;
pub mod template;
pub mod usage;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Prompt Templates ───────────────────────────────────────────────────
pub use template::{prompt_vars, PromptTemplate, PromptVars};

// ── Usage Records ──────────────────────────────────────────────────────
pub use usage::{NullUsageSink, RunLedger, UsageRecord, UsageSink};

// ── Scoring Rules ──────────────────────────────────────────────────────
pub use recommendation::{is_acceptable, Recommendation, ASYMMETRY_FACTOR};
pub use scoring::{score, ImpactScore};
