//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use idea_impact_core::CoreError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors from the shared core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Model provider setup errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The user cannot cover the estimated cost of a run
    #[error("Insufficient balance for user {user_id}: balance {balance}, required {required} microdollars")]
    InsufficientBalance {
        user_id: String,
        balance: i64,
        required: i64,
    },

    /// The caller cancelled a run
    #[error("Analysis cancelled")]
    Cancelled,

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an insufficient balance error
    pub fn insufficient_balance(user_id: impl Into<String>, balance: i64, required: i64) -> Self {
        Self::InsufficientBalance {
            user_id: user_id.into(),
            balance,
            required,
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<idea_impact_llm::LlmError> for AppError {
    fn from(err: idea_impact_llm::LlmError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// Convert AppError to a string for display at the CLI boundary
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
