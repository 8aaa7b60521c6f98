//! Ledger Store - the durable table of applied migrations
//!
//! All ledger SQL is rendered once, in [`LedgerQueries`], from the dialect of
//! the connection. Nothing else in the engine builds ledger statements.

use tracing::debug;

use super::definitions::MigrationRecord;
use crate::backends::{DatabasePool, DatabaseValue, SqlDialect};
use crate::error::{MigrationError, MigrationResult};

/// Ledger statements rendered for one dialect and table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQueries {
    pub create_table: String,
    pub table_exists: String,
    pub select_by_name: String,
    pub insert: String,
    pub delete: String,
    pub most_recent: String,
    pub list_all: String,
}

impl LedgerQueries {
    pub fn new(dialect: &dyn SqlDialect, table: &str) -> Self {
        let p1 = dialect.placeholder(1);
        Self {
            create_table: dialect.ledger_table_ddl(table),
            table_exists: format!(
                "SELECT 1 AS present FROM information_schema.tables WHERE table_schema = {} AND LOWER(table_name) = LOWER({})",
                dialect.current_schema(),
                p1
            ),
            select_by_name: format!("SELECT name FROM {} WHERE name = {}", table, p1),
            insert: format!("INSERT INTO {} (name) VALUES ({})", table, p1),
            delete: format!("DELETE FROM {} WHERE name = {}", table, p1),
            most_recent: format!("SELECT name FROM {} ORDER BY id DESC LIMIT {}", table, p1),
            list_all: format!(
                "SELECT id, name, {} AS created_at FROM {} ORDER BY id ASC",
                dialect.timestamp_as_text("created_at"),
                table
            ),
        }
    }
}

/// Check that a ledger table name is a plain SQL identifier
pub fn validate_table_name(table: &str) -> MigrationResult<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(MigrationError::configuration(format!(
            "Invalid migrations table name '{}'",
            table
        )))
    }
}

/// Applied-migration ledger backed by one table
pub struct LedgerStore<'a> {
    pool: &'a dyn DatabasePool,
    table: &'a str,
    queries: LedgerQueries,
}

impl<'a> LedgerStore<'a> {
    pub fn new(pool: &'a dyn DatabasePool, table: &'a str) -> Self {
        Self {
            queries: LedgerQueries::new(pool.dialect(), table),
            pool,
            table,
        }
    }

    /// Create the ledger table if it does not exist
    pub async fn ensure_schema(&self) -> MigrationResult<()> {
        self.pool
            .execute(&self.queries.create_table, &[])
            .await
            .map_err(|e| self.error("Failed to create migrations table", e))?;
        Ok(())
    }

    /// Whether the ledger table exists, without creating it
    pub async fn table_exists(&self) -> MigrationResult<bool> {
        let row = self
            .pool
            .fetch_optional(&self.queries.table_exists, &[DatabaseValue::from(self.table)])
            .await
            .map_err(|e| self.error("Failed to look up migrations table", e))?;
        Ok(row.is_some())
    }

    /// Whether a migration with this name has been recorded
    pub async fn exists(&self, name: &str) -> MigrationResult<bool> {
        let row = self
            .pool
            .fetch_optional(&self.queries.select_by_name, &[DatabaseValue::from(name)])
            .await
            .map_err(|e| self.error(&format!("Failed to check migration '{}'", name), e))?;
        Ok(row.is_some())
    }

    /// Record a migration as applied now
    pub async fn insert(&self, name: &str) -> MigrationResult<()> {
        self.pool
            .execute(&self.queries.insert, &[DatabaseValue::from(name)])
            .await
            .map_err(|e| self.error(&format!("Failed to record migration '{}'", name), e))?;
        debug!("Recorded migration {} in {}", name, self.table);
        Ok(())
    }

    /// Remove the record for a migration; absent records are ignored
    pub async fn delete(&self, name: &str) -> MigrationResult<()> {
        let removed = self
            .pool
            .execute(&self.queries.delete, &[DatabaseValue::from(name)])
            .await
            .map_err(|e| self.error(&format!("Failed to remove migration '{}'", name), e))?;
        debug!("Removed {} ledger row(s) for {}", removed, name);
        Ok(())
    }

    /// Names of the `limit` most recently applied migrations, newest first.
    ///
    /// A `limit` below 1 is treated as 1.
    pub async fn most_recently_applied(&self, limit: i64) -> MigrationResult<Vec<String>> {
        let limit = limit.max(1);
        let rows = self
            .pool
            .fetch_all(&self.queries.most_recent, &[DatabaseValue::Int64(limit)])
            .await
            .map_err(|e| self.error("Failed to query applied migrations", e))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.get_string("name")?;
            if !name.is_empty() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Every ledger row in apply order
    pub async fn records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let rows = self
            .pool
            .fetch_all(&self.queries.list_all, &[])
            .await
            .map_err(|e| self.error("Failed to list applied migrations", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(MigrationRecord {
                    id: row.get_i64("id")?,
                    name: row.get_string("name")?,
                    applied_at: row.get_optional_string("created_at")?,
                })
            })
            .collect()
    }

    fn error(&self, context: &str, err: MigrationError) -> MigrationError {
        MigrationError::persistence(format!("{}: {}", context, err.message()))
    }
}
