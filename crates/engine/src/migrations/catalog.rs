//! Migration Catalog - discovers migrations on disk
//!
//! Every immediate sub-directory of the migrations directory is one
//! migration, holding an `up.sql` and a `down.sql` script. The catalog is
//! recomputed on every run and never persisted.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::{debug, warn};

use super::definitions::{MigrationEntry, DOWN_SCRIPT, UP_SCRIPT};
use crate::error::{MigrationError, MigrationResult};

/// Format of the timestamp prefix of a migration name
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{14}_.+$").expect("valid migration name pattern"))
}

impl MigrationEntry {
    /// Entry for the migration directory `name` under `dir`
    pub fn new(dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        let root = dir.join(&name);
        Self {
            up_script_path: root.join(UP_SCRIPT),
            down_script_path: root.join(DOWN_SCRIPT),
            name,
        }
    }

    /// Contents of `up.sql`, or `None` when the file does not exist
    pub fn read_up(&self) -> MigrationResult<Option<String>> {
        read_script(&self.up_script_path)
    }

    /// Contents of `down.sql`, or `None` when the file does not exist
    pub fn read_down(&self) -> MigrationResult<Option<String>> {
        read_script(&self.down_script_path)
    }

    /// Whether the name carries the fixed-width timestamp prefix
    pub fn has_timestamp_prefix(&self) -> bool {
        name_pattern().is_match(&self.name)
    }
}

fn read_script(path: &Path) -> MigrationResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(sql) => Ok(Some(sql)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MigrationError::not_found(format!(
            "{} ({})",
            path.display(),
            e
        ))),
    }
}

/// Migrations found in one directory
#[derive(Debug, Clone)]
pub struct MigrationCatalog {
    dir: PathBuf,
}

impl MigrationCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List migrations in ascending name order, which is creation order
    pub fn list(&self) -> MigrationResult<Vec<MigrationEntry>> {
        if !self.dir.is_dir() {
            return Err(MigrationError::not_found(format!(
                "migrations directory {}",
                self.dir.display()
            )));
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let file_type = dir_entry.file_type()?;
            let file_name = dir_entry.file_name();

            let Some(name) = file_name.to_str() else {
                warn!("Skipping migration directory with non UTF-8 name: {:?}", file_name);
                continue;
            };

            if !file_type.is_dir() {
                debug!("Skipping non-directory entry in migrations directory: {}", name);
                continue;
            }

            let entry = MigrationEntry::new(&self.dir, name);
            if !entry.has_timestamp_prefix() {
                warn!(
                    "Migration '{}' does not start with a 14-digit timestamp; ordering may not follow creation time",
                    name
                );
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Loaded {} migrations from {}", entries.len(), self.dir.display());
        Ok(entries)
    }

    /// Look up one migration by name
    pub fn find(&self, name: &str) -> MigrationResult<Option<MigrationEntry>> {
        Ok(self.list()?.into_iter().find(|entry| entry.name == name))
    }

    /// Scaffold `<timestamp>_<label>/{up,down}.sql`, creating the directory when missing
    pub fn create(&self, label: &str, now: NaiveDateTime) -> MigrationResult<MigrationEntry> {
        let label = label.split_whitespace().collect::<Vec<_>>().join("_");
        if label.is_empty() {
            return Err(MigrationError::configuration("Migration name must not be empty"));
        }
        if label.contains('/') || label.contains('\\') {
            return Err(MigrationError::configuration(format!(
                "Migration name '{}' must not contain path separators",
                label
            )));
        }

        let name = format!("{}_{}", now.format(TIMESTAMP_FORMAT), label);
        let entry = MigrationEntry::new(&self.dir, name);

        fs::create_dir_all(self.dir.join(&entry.name))?;
        for path in [&entry.up_script_path, &entry.down_script_path] {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!("Created migration {}", entry.name);
        Ok(entry)
    }
}
