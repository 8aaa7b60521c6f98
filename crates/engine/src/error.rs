//! Error types for the migration engine
//!
//! Every component returns these instead of terminating the process; the
//! command layer decides how they are reported and which exit code is used.

use thiserror::Error;

/// Result type alias for engine operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error kinds surfaced by the migration engine
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Bad or missing connection URL / project configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Missing migrations directory, migration entry or script file
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Ledger read or write failure
    #[error("Ledger error: {message}")]
    Persistence { message: String },

    /// A migration script failed to execute
    #[error("Migration '{migration}' failed: {message}")]
    Execution { migration: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn execution(migration: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            migration: migration.into(),
            message: message.into(),
        }
    }

    /// Underlying message without the error-kind prefix
    pub fn message(&self) -> String {
        match self {
            Self::Configuration { message } | Self::Persistence { message } => message.clone(),
            Self::Execution { message, .. } => message.clone(),
            Self::NotFound { path } => path.clone(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Name of the migration this error refers to, when there is one
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::Execution { migration, .. } => Some(migration),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::Persistence {
            message: err.to_string(),
        }
    }
}
