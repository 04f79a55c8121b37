//! Data Models
//!
//! Configuration and persisted usage structures.

pub mod analytics;
pub mod settings;

pub use analytics::*;
pub use settings::*;
