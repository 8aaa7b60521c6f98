//! Database Backend Abstractions
//!
//! Dialect resolution from a connection URL and the backends (MySQL,
//! PostgreSQL) the engine can open a connection with.

pub mod core;
pub mod mysql;
pub mod postgres;

use std::sync::Arc;

use tracing::debug;

pub use self::core::*;
pub use self::mysql::{MySqlBackend, MySqlDialect};
pub use self::postgres::{PostgresBackend, PostgresDialect};

use crate::error::{MigrationError, MigrationResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    MySQL,
}

impl DatabaseBackendType {
    /// Detect the backend from the scheme of a connection URL
    pub fn from_url(url: &str) -> MigrationResult<Self> {
        let url = url.trim().trim_matches('"');
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| {
                MigrationError::configuration(
                    "Database URL must look like <dialect>://<user>:<password>@<host>:<port>/<database>",
                )
            })?;
        scheme.parse()
    }

    /// Dialect rendering SQL for this backend
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            DatabaseBackendType::PostgreSQL => &PostgresDialect,
            DatabaseBackendType::MySQL => &MySqlDialect,
        }
    }

    fn backend(&self) -> Box<dyn DatabaseBackend> {
        match self {
            DatabaseBackendType::PostgreSQL => Box::new(PostgresBackend::new()),
            DatabaseBackendType::MySQL => Box::new(MySqlBackend::new()),
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgres"),
            DatabaseBackendType::MySQL => write!(f, "mysql"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "mysql" => Ok(DatabaseBackendType::MySQL),
            other => Err(MigrationError::configuration(format!(
                "Unsupported database dialect '{}', expected mysql or postgres",
                other
            ))),
        }
    }
}

/// Resolve the dialect of a connection URL and parse it into a connection target
pub fn resolve_database_url(url: &str) -> MigrationResult<ResolvedConnection> {
    let backend_type = DatabaseBackendType::from_url(url)?;
    backend_type.dialect().parse_connection_url(url)
}

/// Open the connection used for one invocation
pub async fn connect(
    url: &str,
    config: DatabasePoolConfig,
) -> MigrationResult<Arc<dyn DatabasePool>> {
    let resolved = resolve_database_url(url)?;
    debug!(
        backend = %resolved.backend,
        host = %resolved.config.host,
        database = %resolved.config.database,
        "opening database connection"
    );
    resolved.backend.backend().create_pool(&resolved, config).await
}
