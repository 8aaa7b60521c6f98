use anyhow::{Context, Result};
use chrono::Local;
use sqlshift_engine::{MigrationCatalog, MigrationRollback, MigrationRunner, MigrationStatus};
use tracing::debug;

use crate::config::Settings;

/// Scaffold a new migration directory with empty up/down scripts
pub fn create(settings: &Settings, name: &str) -> Result<()> {
    let catalog = MigrationCatalog::new(settings.migrations_dir());
    let entry = catalog
        .create(name, Local::now().naive_local())
        .with_context(|| format!("Failed to create migration '{}'", name))?;

    println!("Created migration: {}", entry.name);
    println!("  {}", entry.up_script_path.display());
    println!("  {}", entry.down_script_path.display());
    Ok(())
}

async fn connect(settings: &Settings) -> Result<MigrationRunner> {
    let url = settings.database_url()?;
    let runner = MigrationRunner::from_url(&url, settings.migration_config())
        .await
        .context("Failed to connect to the database")?;
    debug!(
        "Connected to {}, migrations in {}",
        runner.pool().dialect().backend_type(),
        runner.catalog().dir().display()
    );
    Ok(runner)
}

/// Apply every pending migration
pub async fn run(settings: &Settings) -> Result<()> {
    let runner = connect(settings).await?;
    let result = runner.run_migrations().await;
    runner.close().await;
    let result = result?;

    if result.applied_count() == 0 {
        println!("No migrations to run");
        return Ok(());
    }

    for name in &result.applied_migrations {
        println!("Applied {}", name);
    }
    println!(
        "All migrations complete: {} applied in {} ms",
        result.applied_count(),
        result.execution_time_ms
    );
    Ok(())
}

/// Undo the `steps` most recently applied migrations (absent or 0 means 1)
pub async fn rollback(settings: &Settings, steps: Option<u32>) -> Result<()> {
    let steps = steps.unwrap_or(1).max(1);

    let runner = connect(settings).await?;
    let result = runner.rollback(i64::from(steps)).await;
    runner.close().await;
    let result = result?;

    if result.rolled_back_count() == 0 {
        println!("Nothing to rollback");
        return Ok(());
    }

    for name in &result.rolled_back_migrations {
        if result.missing_down_scripts.contains(name) {
            println!("Rolled back {} (no down.sql, record removed)", name);
        } else {
            println!("Rolled back {}", name);
        }
    }
    println!("{}", rollback_summary(result.rolled_back_count()));
    Ok(())
}

/// Print every migration with its applied state
pub async fn status(settings: &Settings) -> Result<()> {
    let runner = connect(settings).await?;
    let statuses = runner.status().await;
    runner.close().await;
    let statuses = statuses?;

    if statuses.is_empty() {
        println!("No migrations found in {}", settings.migrations_dir().display());
        return Ok(());
    }

    println!("Migration Status:");
    for (name, status) in &statuses {
        println!("  {}", status_line(name, status));
    }

    let pending = statuses
        .iter()
        .filter(|(_, status)| *status == MigrationStatus::Pending)
        .count();
    println!("{} pending", pending);
    Ok(())
}

fn rollback_summary(count: usize) -> String {
    format!(
        "Rolled back {} migration{}",
        count,
        if count == 1 { "" } else { "s" }
    )
}

fn status_line(name: &str, status: &MigrationStatus) -> String {
    match status {
        MigrationStatus::Applied { applied_at } => match applied_at {
            Some(at) => format!("[applied] {} ({})", name, at),
            None => format!("[applied] {}", name),
        },
        MigrationStatus::Pending => format!("[pending] {}", name),
        MigrationStatus::Missing { .. } => format!("[missing] {} (directory not found)", name),
    }
}
