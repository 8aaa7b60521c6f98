//! Migration System
//!
//! Discovery of migrations on disk, the applied-migration ledger and the
//! apply/rollback engines built on top of them.

pub mod catalog;
pub mod definitions;
pub mod executor;
pub mod ledger;
pub mod rollback;
pub mod runner;

pub use catalog::{MigrationCatalog, TIMESTAMP_FORMAT};
pub use definitions::*;
pub use executor::ScriptExecutor;
pub use ledger::{LedgerQueries, LedgerStore};
pub use rollback::MigrationRollback;
pub use runner::MigrationRunner;
