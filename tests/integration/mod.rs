//! Integration Tests Module
//!
//! End-to-end tests for the analysis pipeline, the retrying caller and the
//! cost gate, driven by scripted model providers and in-memory SQLite.

// Shared scripted providers and wiring helpers
mod support;

// Full pipeline runs against a scripted model
mod pipeline_test;

// Retry and fallback escalation through the public caller
mod retry_test;

// Balance checks, settlement and cancellation billing
mod cost_gate_test;

// Configuration file handling
mod config_test;
