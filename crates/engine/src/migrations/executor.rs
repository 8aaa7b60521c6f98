//! Transactional Executor - runs one migration script atomically
//!
//! A transaction wraps exactly one script. Nothing spans several migrations,
//! so a failure leaves every earlier migration of the batch in place.

use tracing::{debug, warn};

use crate::backends::DatabasePool;
use crate::error::{MigrationError, MigrationResult};

/// Whether a script contains nothing but whitespace
pub fn is_blank(sql: &str) -> bool {
    sql.trim().is_empty()
}

/// Executes migration scripts inside their own transaction
pub struct ScriptExecutor<'a> {
    pool: &'a dyn DatabasePool,
}

impl<'a> ScriptExecutor<'a> {
    pub fn new(pool: &'a dyn DatabasePool) -> Self {
        Self { pool }
    }

    /// Run `sql` as one statement batch, committing on success and rolling
    /// back on failure. Errors carry the migration name and driver message.
    pub async fn run_script(&self, migration: &str, sql: &str) -> MigrationResult<()> {
        let mut transaction = self.pool.begin_transaction().await.map_err(|e| {
            MigrationError::execution(migration, format!("Failed to start transaction: {}", e.message()))
        })?;

        debug!("Executing script for {}:\n{}", migration, sql);

        match transaction.execute_batch(sql).await {
            Ok(()) => transaction.commit().await.map_err(|e| {
                MigrationError::execution(migration, format!("Failed to commit: {}", e.message()))
            }),
            Err(e) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    warn!(
                        "Failed to roll back transaction for {}: {}",
                        migration,
                        rollback_err.message()
                    );
                }
                Err(MigrationError::execution(migration, e.message()))
            }
        }
    }
}
