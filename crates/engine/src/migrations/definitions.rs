//! Migration Definitions - Core types shared by the catalog, ledger and engines

use std::path::PathBuf;

/// Default name of the ledger table
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

/// File holding the forward script inside a migration directory
pub const UP_SCRIPT: &str = "up.sql";

/// File holding the reverse script inside a migration directory
pub const DOWN_SCRIPT: &str = "down.sql";

/// A migration discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    /// Directory name, `<14-digit timestamp>_<label>`
    pub name: String,
    pub up_script_path: PathBuf,
    pub down_script_path: PathBuf,
}

/// A row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    /// Timestamp as rendered by the database
    pub applied_at: Option<String>,
}

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory holding one sub-directory per migration
    pub migrations_dir: PathBuf,
    /// Table name for tracking applied migrations
    pub migrations_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Default)]
pub struct MigrationRunResult {
    /// Names of migrations applied by this run, in order
    pub applied_migrations: Vec<String>,
    /// Number of catalog entries already present in the ledger
    pub skipped_count: usize,
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Default)]
pub struct RollbackResult {
    /// Names of migrations removed from the ledger, in undo order
    pub rolled_back_migrations: Vec<String>,
    /// Subset of `rolled_back_migrations` whose down script was empty or absent
    pub missing_down_scripts: Vec<String>,
    pub execution_time_ms: u128,
}

impl RollbackResult {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back_migrations.len()
    }
}

/// State of one migration name across the catalog and the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// On disk and recorded in the ledger
    Applied { applied_at: Option<String> },
    /// On disk, not yet applied
    Pending,
    /// Recorded in the ledger but its directory is gone
    Missing { applied_at: Option<String> },
}
