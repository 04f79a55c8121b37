//! SQLite Database
//!
//! Connection pools for the usage ledger and balances, using rusqlite with
//! r2d2 connection pooling.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_parent_dir;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Open a pooled database file, creating parent directories as needed
pub fn open_pool(path: &Path) -> AppResult<DbPool> {
    ensure_parent_dir(path)?;

    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        // Concurrent analyses settle against the same file
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
    });
    Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))
}

/// Create an in-memory database for testing.
///
/// The pool holds a single connection so every caller sees the same data.
pub fn open_in_memory() -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::memory();
    Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))
}
