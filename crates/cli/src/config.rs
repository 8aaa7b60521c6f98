//! Project settings: the `sqlshift.config.json` file, the `.env` file and
//! command-line overrides, resolved against the working directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlshift_engine::migrations::DEFAULT_MIGRATIONS_TABLE;
use sqlshift_engine::{MigrationConfig, MigrationError, MigrationResult};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "sqlshift.config.json";
pub const ENV_FILE_NAME: &str = ".env";
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Variable holding the connection string
pub const DATABASE_URL_VAR: &str = "SQLSHIFT_DATABASE_URL";
/// Consulted when [`DATABASE_URL_VAR`] is unset
pub const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const DATABASE_URL_FORMAT: &str = "<dialect>://<username>:<password>@<host>:<port>/<database>";

/// Contents of `sqlshift.config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_table: Option<String>,
}

impl ProjectConfig {
    /// Read the config file in `project_root`; a missing file yields defaults
    pub fn load(project_root: &Path) -> MigrationResult<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| {
            MigrationError::configuration(format!("Invalid {}: {}", path.display(), e))
        })
    }
}

/// Everything a command needs to know about the project
#[derive(Debug, Clone)]
pub struct Settings {
    project_root: PathBuf,
    file: ProjectConfig,
    dir_override: Option<PathBuf>,
}

impl Settings {
    pub fn load(project_root: PathBuf, dir_override: Option<PathBuf>) -> MigrationResult<Self> {
        let file = ProjectConfig::load(&project_root)?;
        Ok(Self {
            project_root,
            file,
            dir_override,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Migrations directory: `--dir`, then `directoryPath`, then `<root>/migrations`.
    /// Relative paths are taken from the project root.
    pub fn migrations_dir(&self) -> PathBuf {
        let dir = self
            .dir_override
            .as_ref()
            .or(self.file.directory_path.as_ref())
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR));

        if dir.is_absolute() {
            dir
        } else {
            self.project_root.join(dir)
        }
    }

    pub fn migrations_table(&self) -> &str {
        self.file
            .migrations_table
            .as_deref()
            .unwrap_or(DEFAULT_MIGRATIONS_TABLE)
    }

    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig {
            migrations_dir: self.migrations_dir(),
            migrations_table: self.migrations_table().to_string(),
        }
    }

    /// Load `<root>/.env` into the process environment and read the connection string
    pub fn database_url(&self) -> MigrationResult<String> {
        load_env_file(&self.project_root)?;
        database_url_from(|key| std::env::var(key).ok())
    }
}

/// Load `.env` without overriding variables that are already set
fn load_env_file(project_root: &Path) -> MigrationResult<()> {
    let path = project_root.join(ENV_FILE_NAME);
    match dotenvy::from_path(&path) {
        Ok(()) => {
            debug!("Loaded {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!("No {} found", path.display());
            Ok(())
        }
        Err(e) => Err(MigrationError::configuration(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn database_url_from<F>(lookup: F) -> MigrationResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    [DATABASE_URL_VAR, FALLBACK_DATABASE_URL_VAR]
        .into_iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or_else(|| {
            MigrationError::configuration(format!(
                "{} is not set. Add it to {} in the format {}={}",
                DATABASE_URL_VAR, ENV_FILE_NAME, DATABASE_URL_VAR, DATABASE_URL_FORMAT
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load(temp_dir.path().to_path_buf(), None).unwrap();

        assert_eq!(settings.migrations_dir(), temp_dir.path().join("migrations"));
        assert_eq!(settings.migrations_table(), "migrations");
    }

    #[test]
    fn test_config_file_is_camel_case() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{"directoryPath": "/srv/app/db", "migrationsTable": "schema_history"}"#,
        )
        .unwrap();

        let settings = Settings::load(temp_dir.path().to_path_buf(), None).unwrap();
        let config = settings.migration_config();
        assert_eq!(config.migrations_dir, PathBuf::from("/srv/app/db"));
        assert_eq!(config.migrations_table, "schema_history");
    }

    #[test]
    fn test_relative_directory_resolves_against_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{"directoryPath": "db/migrations"}"#,
        )
        .unwrap();

        let settings = Settings::load(temp_dir.path().to_path_buf(), None).unwrap();
        assert_eq!(settings.migrations_dir(), temp_dir.path().join("db/migrations"));
    }

    #[test]
    fn test_dir_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{"directoryPath": "/srv/app/db"}"#,
        )
        .unwrap();

        let settings =
            Settings::load(temp_dir.path().to_path_buf(), Some(PathBuf::from("other"))).unwrap();
        assert_eq!(settings.migrations_dir(), temp_dir.path().join("other"));
    }

    #[test]
    fn test_malformed_config_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();

        let err = Settings::load(temp_dir.path().to_path_buf(), None).unwrap_err();
        assert!(matches!(err, MigrationError::Configuration { .. }));
    }

    #[test]
    fn test_database_url_prefers_primary_variable() {
        let url = database_url_from(lookup(&[
            (DATABASE_URL_VAR, "postgres://app:pw@localhost:5432/shop"),
            (FALLBACK_DATABASE_URL_VAR, "mysql://other:pw@localhost:3306/other"),
        ]))
        .unwrap();
        assert_eq!(url, "postgres://app:pw@localhost:5432/shop");
    }

    #[test]
    fn test_database_url_falls_back() {
        let url = database_url_from(lookup(&[
            (DATABASE_URL_VAR, "  "),
            (FALLBACK_DATABASE_URL_VAR, "mysql://app:pw@localhost:3306/shop"),
        ]))
        .unwrap();
        assert_eq!(url, "mysql://app:pw@localhost:3306/shop");
    }

    #[test]
    fn test_database_url_missing_explains_format() {
        let err = database_url_from(lookup(&[])).unwrap_err();
        assert!(matches!(err, MigrationError::Configuration { .. }));
        assert!(err.to_string().contains(DATABASE_URL_FORMAT));
    }

    #[test]
    fn test_missing_env_file_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_env_file(temp_dir.path()).is_ok());
    }
}
