//! Migration Runner - applies pending migrations
//!
//! Walks the catalog in ascending name order and applies every migration the
//! ledger does not know yet, recording each one right after its script
//! commits. A failure stops the run; migrations applied before it stay
//! applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::catalog::MigrationCatalog;
use super::definitions::{MigrationConfig, MigrationRunResult, MigrationStatus};
use super::executor::{is_blank, ScriptExecutor};
use super::ledger::{validate_table_name, LedgerStore};
use crate::backends::{self, DatabasePool, DatabasePoolConfig};
use crate::error::{MigrationError, MigrationResult};

/// Migration runner bound to one connection and one migrations directory
pub struct MigrationRunner {
    pool: Arc<dyn DatabasePool>,
    config: MigrationConfig,
    catalog: MigrationCatalog,
}

impl MigrationRunner {
    /// Create a runner over an already opened connection
    pub fn new(pool: Arc<dyn DatabasePool>, config: MigrationConfig) -> MigrationResult<Self> {
        validate_table_name(&config.migrations_table)?;
        let catalog = MigrationCatalog::new(config.migrations_dir.clone());
        Ok(Self {
            pool,
            config,
            catalog,
        })
    }

    /// Resolve the dialect of `database_url`, open the connection and create a runner
    pub async fn from_url(database_url: &str, config: MigrationConfig) -> MigrationResult<Self> {
        validate_table_name(&config.migrations_table)?;
        let pool = backends::connect(database_url, DatabasePoolConfig::default()).await?;
        Self::new(pool, config)
    }

    pub fn pool(&self) -> &dyn DatabasePool {
        self.pool.as_ref()
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> LedgerStore<'_> {
        LedgerStore::new(self.pool.as_ref(), &self.config.migrations_table)
    }

    pub fn executor(&self) -> ScriptExecutor<'_> {
        ScriptExecutor::new(self.pool.as_ref())
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();
        let ledger = self.ledger();
        let executor = self.executor();

        ledger.ensure_schema().await?;

        let entries = self.catalog.list()?;
        let mut result = MigrationRunResult::default();

        for entry in &entries {
            if ledger.exists(&entry.name).await? {
                debug!("Skipping already applied migration {}", entry.name);
                result.skipped_count += 1;
                continue;
            }

            let sql = entry.read_up()?.ok_or_else(|| {
                MigrationError::not_found(entry.up_script_path.display().to_string())
            })?;

            info!("Applying migration: {}", entry.name);

            // Blank scripts are not sent to the server, but still count as applied.
            if is_blank(&sql) {
                info!("{} has an empty up.sql; recording it without executing", entry.name);
            } else {
                executor.run_script(&entry.name, &sql).await?;
            }

            ledger.insert(&entry.name).await?;
            info!("Migration applied: {}", entry.name);
            result.applied_migrations.push(entry.name.clone());
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    /// Status of every migration known to the catalog or the ledger.
    ///
    /// Catalog entries come first in name order, followed by ledger names
    /// whose directory no longer exists. Read-only: a missing ledger table
    /// means nothing has been applied.
    pub async fn status(&self) -> MigrationResult<Vec<(String, MigrationStatus)>> {
        let ledger = self.ledger();

        let records = if ledger.table_exists().await? {
            ledger.records().await?
        } else {
            debug!("No {} table yet", self.config.migrations_table);
            Vec::new()
        };
        let mut applied: HashMap<String, Option<String>> = records
            .iter()
            .map(|record| (record.name.clone(), record.applied_at.clone()))
            .collect();

        let mut statuses = Vec::new();
        for entry in self.catalog.list()? {
            let status = match applied.remove(&entry.name) {
                Some(applied_at) => MigrationStatus::Applied { applied_at },
                None => MigrationStatus::Pending,
            };
            statuses.push((entry.name, status));
        }

        for record in records {
            if let Some(applied_at) = applied.remove(&record.name) {
                statuses.push((record.name, MigrationStatus::Missing { applied_at }));
            }
        }

        Ok(statuses)
    }

    /// Release the connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
