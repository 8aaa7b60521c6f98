//! Migration Rollback - undoes the most recently applied migrations
//!
//! Ledger rows are undone newest first, the exact reverse of apply order.
//! Each down script runs in its own transaction and its ledger row is
//! removed only once the script commits.

use std::time::Instant;

use tracing::{info, warn};

use super::definitions::RollbackResult;
use super::executor::is_blank;
use super::runner::MigrationRunner;
use crate::error::{MigrationError, MigrationResult};

/// Extension trait for MigrationRunner to add rollback functionality
#[allow(async_fn_in_trait)]
pub trait MigrationRollback {
    /// Roll back the `steps` most recently applied migrations.
    ///
    /// `steps` below 1 is treated as 1.
    async fn rollback(&self, steps: i64) -> MigrationResult<RollbackResult>;
}

impl MigrationRollback for MigrationRunner {
    async fn rollback(&self, steps: i64) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();
        let ledger = self.ledger();
        let executor = self.executor();

        ledger.ensure_schema().await?;

        let to_rollback = ledger.most_recently_applied(steps.max(1)).await?;
        let mut result = RollbackResult::default();

        if to_rollback.is_empty() {
            result.execution_time_ms = start_time.elapsed().as_millis();
            return Ok(result);
        }

        info!(
            "Rolling back {} migration{}",
            to_rollback.len(),
            if to_rollback.len() > 1 { "s" } else { "" }
        );

        let entries = self.catalog().list()?;

        for name in to_rollback {
            let entry = entries.iter().find(|e| e.name == name).ok_or_else(|| {
                MigrationError::not_found(format!(
                    "migration {} in {}",
                    name,
                    self.catalog().dir().display()
                ))
            })?;

            info!("Rolling back migration: {}", name);

            match entry.read_down()? {
                Some(sql) if !is_blank(&sql) => {
                    executor.run_script(&name, &sql).await?;
                }
                _ => {
                    warn!(
                        "The down.sql file for migration {} is either empty or missing",
                        name
                    );
                    result.missing_down_scripts.push(name.clone());
                }
            }

            ledger.delete(&name).await?;
            info!("Migration rolled back: {}", name);
            result.rolled_back_migrations.push(name);
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }
}
