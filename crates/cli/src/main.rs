mod commands;
mod config;
mod logging;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use config::Settings;
use logging::LoggingConfig;

#[derive(Parser, Debug)]
#[command(name = "sqlshift", version)]
#[command(about = "Apply and roll back versioned SQL migrations against MySQL and PostgreSQL")]
struct Cli {
    /// Migrations directory (overrides directoryPath in sqlshift.config.json)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Create the migrations directory, a .env template and sqlshift.config.json
    Init,

    /// Create a new migration with empty up.sql and down.sql
    Create {
        /// Migration label, appended to the timestamp
        name: String,
    },

    /// Run all pending migrations
    Migrate,

    /// Roll back the last migration, or the last [steps] migrations
    Rollback {
        /// Number of migrations to undo (default 1)
        steps: Option<u32>,
    },

    /// Show applied, pending and missing migrations
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    if let Err(e) = logging::init_logging(logging.with_json(cli.log_json)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match std::env::current_dir() {
        Ok(project_root) => run(cli, &project_root).await,
        Err(e) => Err(e).context("Failed to read the working directory"),
    };
    ExitCode::from(exit_status(result, &mut io::stderr()))
}

/// Map a command outcome to a process status, reporting failures on `stderr`
fn exit_status(result: Result<()>, stderr: &mut impl Write) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(stderr, "Error: {:#}", e);
            1
        }
    }
}

async fn run(cli: Cli, project_root: &Path) -> Result<()> {
    let settings = Settings::load(project_root.to_path_buf(), cli.dir)?;

    match cli.command {
        Commands::Init => commands::init::run(&settings),
        Commands::Create { name } => commands::migrate::create(&settings, &name),
        Commands::Migrate => commands::migrate::run(&settings).await,
        Commands::Rollback { steps } => commands::migrate::rollback(&settings, steps).await,
        Commands::Status => commands::migrate::status(&settings).await,
    }
}
