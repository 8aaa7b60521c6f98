use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{
    ProjectConfig, Settings, CONFIG_FILE_NAME, DATABASE_URL_FORMAT, DATABASE_URL_VAR,
    ENV_FILE_NAME,
};

/// Create the migrations directory, the `.env` template and the config file
pub fn run(settings: &Settings) -> Result<()> {
    let migrations_dir = settings.migrations_dir();
    fs::create_dir_all(&migrations_dir)
        .with_context(|| format!("Failed to create {}", migrations_dir.display()))?;

    let env_path = settings.project_root().join(ENV_FILE_NAME);
    if append_env_template(&env_path)? {
        println!("Added {} to {}", DATABASE_URL_VAR, env_path.display());
    }

    let config_path = settings.project_root().join(CONFIG_FILE_NAME);
    let config = ProjectConfig {
        directory_path: Some(migrations_dir),
        migrations_table: None,
    };
    if write_config_if_absent(&config_path, &config)? {
        println!("Created {}", config_path.display());
    }

    println!("Initialization complete");
    Ok(())
}

/// Append the connection string template unless the variable is already present
fn append_env_template(path: &Path) -> Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    let prefix = format!("{}=", DATABASE_URL_VAR);
    if existing
        .lines()
        .any(|line| line.trim_start().starts_with(&prefix))
    {
        return Ok(false);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{}{}", prefix, DATABASE_URL_FORMAT)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(true)
}

fn write_config_if_absent(path: &Path, config: &ProjectConfig) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("Failed to create {}", path.display())),
    };

    let content = serde_json::to_string_pretty(config)?;
    writeln!(file, "{}", content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
