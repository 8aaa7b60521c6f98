//! PostgreSQL Backend Implementation
//!
//! PostgreSQL dialect plus the sqlx-backed pool and transaction used by the
//! migration engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row, TypeInfo};

use super::core::*;
use super::DatabaseBackendType;
use crate::error::{MigrationError, MigrationResult};

/// PostgreSQL SQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    fn ledger_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id SERIAL PRIMARY KEY, name VARCHAR(255) NOT NULL, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
            table
        )
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn timestamp_as_text(&self, column: &str) -> String {
        format!("CAST({} AS TEXT)", column)
    }

    fn current_schema(&self) -> &'static str {
        "current_schema()"
    }

    fn parse_connection_url(&self, url: &str) -> MigrationResult<ResolvedConnection> {
        let url = url.trim().trim_matches('"');
        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
            return Err(MigrationError::configuration(
                "Invalid PostgreSQL URL scheme",
            ));
        }

        let config = DatabaseConnectionConfig::from_url(url, 5432)?;

        Ok(ResolvedConnection {
            backend: DatabaseBackendType::PostgreSQL,
            connection_string: url.to_string(),
            config,
        })
    }
}

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn create_pool(
        &self,
        connection: &ResolvedConnection,
        config: DatabasePoolConfig,
    ) -> MigrationResult<Arc<dyn DatabasePool>> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&connection.connection_string)
            .await
            .map_err(|e| {
                MigrationError::configuration(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        Ok(Arc::new(PostgresPool::new(pool)))
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Pool<Postgres>,
    dialect: PostgresDialect,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            dialect: PostgresDialect,
        }
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::persistence(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<DatabaseRow>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrationError::persistence(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(decode_row).collect()
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Option<DatabaseRow>> {
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrationError::persistence(format!("Query fetch failed: {}", e)))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn begin_transaction(&self) -> MigrationResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await.map_err(|e| {
            MigrationError::persistence(format!("Failed to start transaction: {}", e))
        })?;

        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
    async fn execute_batch(&mut self, sql: &str) -> MigrationResult<()> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| MigrationError::persistence("Transaction already completed"))?;

        // Unprepared text goes over the simple query protocol, so several
        // statements may be sent at once.
        sqlx::Executor::execute(&mut **tx, sql)
            .await
            .map_err(|e| MigrationError::persistence(e.to_string()))?;

        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> MigrationResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrationError::persistence("Transaction already completed"))?;

        tx.commit()
            .await
            .map_err(|e| MigrationError::persistence(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> MigrationResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| MigrationError::persistence("Transaction already completed"))?;

        tx.rollback().await.map_err(|e| {
            MigrationError::persistence(format!("Transaction rollback failed: {}", e))
        })
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::String(s) => query.bind(s.clone()),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> MigrationResult<DatabaseRow> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        let value = match column.type_info().name() {
            "INT2" => row.try_get::<Option<i16>, _>(index)?.map(|v| DatabaseValue::Int64(v.into())),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(|v| DatabaseValue::Int64(v.into())),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(DatabaseValue::Int64),
            _ => row.try_get::<Option<String>, _>(index)?.map(DatabaseValue::String),
        };
        values.push(value.unwrap_or(DatabaseValue::Null));
    }

    Ok(DatabaseRow::new(columns, values))
}
