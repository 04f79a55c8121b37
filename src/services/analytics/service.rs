//! Usage Ledger Service
//!
//! Persists every usage record of every analysis run in SQLite and answers
//! usage queries. Provides schema initialization, migrations, and queries.

use idea_impact_core::UsageRecord;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::models::analytics::{ModelUsage, StoredUsageRecord, UsageFilter, UsageStats, UsageSummary};
use crate::storage::DbPool;
use crate::utils::error::{AppError, AppResult};

/// Ledger service for persisted usage data
pub struct UsageLedgerService {
    pool: DbPool,
}

impl UsageLedgerService {
    /// Create a ledger service from an existing database pool
    pub fn from_pool(pool: DbPool) -> AppResult<Self> {
        let service = Self { pool };
        service.init_schema()?;
        Ok(service)
    }

    /// Initialize the ledger database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS usage_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                run_id TEXT NOT NULL,
                model_name TEXT NOT NULL,
                provider TEXT NOT NULL,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                cost_microdollars INTEGER NOT NULL DEFAULT 0,
                success INTEGER NOT NULL DEFAULT 1,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_usage_records_user ON usage_records(user_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_usage_records_run ON usage_records(run_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_usage_records_timestamp ON usage_records(timestamp)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.apply_migrations(&conn)?;

        Ok(())
    }

    /// Apply database migrations
    fn apply_migrations(&self, conn: &rusqlite::Connection) -> AppResult<()> {
        let current_version: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM ledger_schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        // Migration 1: Initial schema (already applied above)
        if current_version < 1 {
            conn.execute(
                "INSERT INTO ledger_schema_version (version, applied_at) VALUES (1, ?1)",
                params![chrono::Utc::now().timestamp()],
            )?;
        }

        // Migration 2: Call site label and failure message
        if current_version < 2 {
            conn.execute(
                "ALTER TABLE usage_records ADD COLUMN label TEXT NOT NULL DEFAULT ''",
                [],
            )?;
            conn.execute("ALTER TABLE usage_records ADD COLUMN error_message TEXT", [])?;
            conn.execute(
                "INSERT INTO ledger_schema_version (version, applied_at) VALUES (2, ?1)",
                params![chrono::Utc::now().timestamp()],
            )?;
        }

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Persist all records of one run in a single transaction
    pub fn record_run(
        &self,
        user_id: &str,
        run_id: &str,
        records: &[UsageRecord],
    ) -> AppResult<Vec<i64>> {
        let conn = self.get_connection()?;
        let mut ids = Vec::with_capacity(records.len());

        let tx = conn.unchecked_transaction()?;

        for record in records {
            tx.execute(
                "INSERT INTO usage_records
                 (user_id, run_id, model_name, provider, label, input_tokens, output_tokens,
                  cost_microdollars, success, error_message, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    user_id,
                    run_id,
                    record.model_name,
                    record.provider,
                    record.label,
                    record.input_tokens,
                    record.output_tokens,
                    record.cost_microdollars,
                    record.success,
                    record.error_message,
                    record.timestamp,
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;
        Ok(ids)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// List stored records, newest first
    pub fn list_usage_records(&self, filter: &UsageFilter) -> AppResult<Vec<StoredUsageRecord>> {
        let conn = self.get_connection()?;
        let (clause, params_vec) = Self::filter_clause(filter);

        let mut sql = format!(
            "SELECT id, user_id, run_id, model_name, provider, label, input_tokens,
                    output_tokens, cost_microdollars, success, error_message, timestamp
             FROM usage_records WHERE 1=1{}
             ORDER BY timestamp DESC, id DESC",
            clause
        );
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_refs.as_slice(), Self::row_to_stored_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Aggregate statistics over the filtered records
    pub fn get_usage_stats(&self, filter: &UsageFilter) -> AppResult<UsageStats> {
        let conn = self.get_connection()?;
        let (clause, params_vec) = Self::filter_clause(filter);

        let sql = format!(
            "SELECT COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0),
                    COALESCE(SUM(cost_microdollars), 0), COUNT(*),
                    COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0)
             FROM usage_records WHERE 1=1{}",
            clause
        );
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let stats = conn.query_row(&sql, params_refs.as_slice(), Self::row_to_stats)?;
        Ok(stats)
    }

    /// Totals, run count and per-model breakdown for one user
    pub fn usage_summary(&self, user_id: &str) -> AppResult<UsageSummary> {
        let totals = self.get_usage_stats(&UsageFilter::default().with_user(user_id))?;
        let conn = self.get_connection()?;

        let run_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT run_id) FROM usage_records WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT model_name, COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0),
                    COALESCE(SUM(cost_microdollars), 0), COUNT(*),
                    COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0)
             FROM usage_records WHERE user_id = ?1
             GROUP BY model_name
             ORDER BY 4 DESC, model_name ASC",
        )?;
        let by_model = stmt
            .query_map(params![user_id], |row| {
                Ok(ModelUsage {
                    model_name: row.get(0)?,
                    stats: UsageStats {
                        total_input_tokens: row.get(1)?,
                        total_output_tokens: row.get(2)?,
                        total_cost_microdollars: row.get(3)?,
                        request_count: row.get(4)?,
                        failed_count: row.get(5)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UsageSummary {
            user_id: user_id.to_string(),
            run_count,
            totals,
            by_model,
        })
    }

    /// Count stored records
    pub fn count_usage_records(&self, filter: &UsageFilter) -> AppResult<i64> {
        let conn = self.get_connection()?;
        let (clause, params_vec) = Self::filter_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM usage_records WHERE 1=1{}", clause);
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// WHERE fragment and parameters for a filter
    fn filter_clause(filter: &UsageFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut sql = String::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref user) = filter.user_id {
            sql.push_str(" AND user_id = ?");
            params_vec.push(Box::new(user.clone()));
        }
        if let Some(ref run) = filter.run_id {
            sql.push_str(" AND run_id = ?");
            params_vec.push(Box::new(run.clone()));
        }
        if let Some(ref model) = filter.model_name {
            sql.push_str(" AND model_name = ?");
            params_vec.push(Box::new(model.clone()));
        }
        if let Some(start) = filter.start_timestamp {
            sql.push_str(" AND timestamp >= ?");
            params_vec.push(Box::new(start));
        }
        if let Some(end) = filter.end_timestamp {
            sql.push_str(" AND timestamp < ?");
            params_vec.push(Box::new(end));
        }

        (sql, params_vec)
    }

    fn row_to_stored_record(row: &rusqlite::Row) -> rusqlite::Result<StoredUsageRecord> {
        Ok(StoredUsageRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            run_id: row.get(2)?,
            record: UsageRecord {
                model_name: row.get(3)?,
                provider: row.get(4)?,
                label: row.get(5)?,
                input_tokens: row.get(6)?,
                output_tokens: row.get(7)?,
                cost_microdollars: row.get(8)?,
                success: row.get(9)?,
                error_message: row.get(10)?,
                timestamp: row.get(11)?,
            },
        })
    }

    fn row_to_stats(row: &rusqlite::Row) -> rusqlite::Result<UsageStats> {
        Ok(UsageStats {
            total_input_tokens: row.get(0)?,
            total_output_tokens: row.get(1)?,
            total_cost_microdollars: row.get(2)?,
            request_count: row.get(3)?,
            failed_count: row.get(4)?,
        })
    }
}

impl std::fmt::Debug for UsageLedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageLedgerService")
            .field("pool_size", &self.pool.state().connections)
            .finish()
    }
}
