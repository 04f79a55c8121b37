//! User Balances
//!
//! Per-user balances in microdollars. Every mutation is a single atomic
//! operation per user so concurrent analyses cannot double-spend.

use dashmap::DashMap;
use rusqlite::{params, OptionalExtension};

use crate::storage::DbPool;
use crate::utils::error::{AppError, AppResult};

/// Atomic per-user balance operations
pub trait BalanceStore: Send + Sync {
    /// Current balance; unknown users have zero
    fn get_balance(&self, user_id: &str) -> AppResult<i64>;

    /// Add funds, returning the new balance
    fn credit(&self, user_id: &str, amount: i64) -> AppResult<i64>;

    /// Remove funds unconditionally, returning the new balance
    fn debit(&self, user_id: &str, amount: i64) -> AppResult<i64>;

    /// Deduct `amount` only if the balance covers it.
    ///
    /// Returns the new balance, or `None` when the balance is insufficient
    /// (in which case nothing changes).
    fn try_reserve(&self, user_id: &str, amount: i64) -> AppResult<Option<i64>>;

    /// Replace a reservation with the actual cost: `balance += reserved - actual`
    fn settle(&self, user_id: &str, reserved: i64, actual: i64) -> AppResult<i64> {
        self.adjust(user_id, reserved - actual)
    }

    /// Apply a signed delta, returning the new balance
    fn adjust(&self, user_id: &str, delta: i64) -> AppResult<i64>;
}

fn check_amount(amount: i64) -> AppResult<()> {
    if amount < 0 {
        return Err(AppError::validation(format!(
            "Amount must not be negative: {}",
            amount
        )));
    }
    Ok(())
}

// ============================================================================
// SQLite
// ============================================================================

/// Balances persisted in the `balances` table
pub struct SqliteBalanceStore {
    pool: DbPool,
}

impl SqliteBalanceStore {
    /// Create a balance store from an existing database pool
    pub fn from_pool(pool: DbPool) -> AppResult<Self> {
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                user_id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl BalanceStore for SqliteBalanceStore {
    fn get_balance(&self, user_id: &str) -> AppResult<i64> {
        let conn = self.pool.get()?;
        let balance = conn
            .query_row(
                "SELECT balance FROM balances WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance.unwrap_or(0))
    }

    fn credit(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        check_amount(amount)?;
        self.adjust(user_id, amount)
    }

    fn debit(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        check_amount(amount)?;
        self.adjust(user_id, -amount)
    }

    fn try_reserve(&self, user_id: &str, amount: i64) -> AppResult<Option<i64>> {
        check_amount(amount)?;
        if amount == 0 {
            return self.get_balance(user_id).map(Some);
        }

        let conn = self.pool.get()?;
        let balance = conn
            .query_row(
                "UPDATE balances SET balance = balance - ?2, updated_at = ?3
                 WHERE user_id = ?1 AND balance >= ?2
                 RETURNING balance",
                params![user_id, amount, chrono::Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }

    fn adjust(&self, user_id: &str, delta: i64) -> AppResult<i64> {
        let conn = self.pool.get()?;
        let balance = conn.query_row(
            "INSERT INTO balances (user_id, balance, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE
             SET balance = balance + excluded.balance, updated_at = excluded.updated_at
             RETURNING balance",
            params![user_id, delta, chrono::Utc::now().timestamp()],
            |row| row.get(0),
        )?;
        Ok(balance)
    }
}

impl std::fmt::Debug for SqliteBalanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBalanceStore")
            .field("pool_size", &self.pool.state().connections)
            .finish()
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local balances; each user's entry is locked for the duration of
/// an operation.
#[derive(Debug, Default)]
pub struct MemoryBalanceStore {
    balances: DashMap<String, i64>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given balances
    pub fn with_balances<I, S>(balances: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            balances: balances.into_iter().map(|(u, b)| (u.into(), b)).collect(),
        }
    }
}

impl BalanceStore for MemoryBalanceStore {
    fn get_balance(&self, user_id: &str) -> AppResult<i64> {
        Ok(self.balances.get(user_id).map(|b| *b).unwrap_or(0))
    }

    fn credit(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        check_amount(amount)?;
        self.adjust(user_id, amount)
    }

    fn debit(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        check_amount(amount)?;
        self.adjust(user_id, -amount)
    }

    fn try_reserve(&self, user_id: &str, amount: i64) -> AppResult<Option<i64>> {
        check_amount(amount)?;
        let mut entry = self.balances.entry(user_id.to_string()).or_insert(0);
        if *entry < amount {
            return Ok(None);
        }
        *entry -= amount;
        Ok(Some(*entry))
    }

    fn adjust(&self, user_id: &str, delta: i64) -> AppResult<i64> {
        let mut entry = self.balances.entry(user_id.to_string()).or_insert(0);
        *entry += delta;
        Ok(*entry)
    }
}
