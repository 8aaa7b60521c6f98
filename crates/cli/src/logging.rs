//! Logging setup for the sqlshift binary.
//!
//! Log lines go to stderr so that command output on stdout stays clean.

use std::io;

use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for the CLI
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level used when no filter is given (e.g., "info", "debug")
    pub level: String,
    /// Environment filter (e.g. "sqlshift=debug,sqlshift_engine=info")
    pub env_filter: Option<String>,
    /// Emit one JSON object per line instead of plain text
    pub json_format: bool,
    /// Include the module target in each line
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            env_filter: Some("sqlshift=info,sqlshift_engine=info".to_string()),
            json_format: false,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    /// Debug output for both the CLI and the engine
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            env_filter: Some("sqlshift=debug,sqlshift_engine=debug".to_string()),
            json_format: false,
            include_target: true,
        }
    }

    pub fn with_json(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }

    fn filter_directive(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `config`.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stderr)
                    .with_target(config.include_target),
            )
            .try_init()?;
    }

    tracing::debug!(
        target: "sqlshift::logging",
        "Logging initialized (filter: {}, format: {})",
        config.filter_directive(),
        if config.json_format { "JSON" } else { "text" }
    );

    Ok(())
}
