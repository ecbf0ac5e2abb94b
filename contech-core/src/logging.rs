//! Tracing setup shared by the CLI and tests
//!
//! Settings live in the `[logging]` section of the config file. `RUST_LOG`
//! takes precedence over `level` when set.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{ContechError, ContechResult, ErrorContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    /// Append events to this file instead of stderr
    pub file: Option<PathBuf>,
    /// Source file and line on every event
    pub source_location: bool,
    /// Extra filter directives such as `contech_session=debug`
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            file: None,
            source_location: false,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Debug output for the contech crates, the configured level for everything else
    pub fn verbose(mut self) -> Self {
        self.directives.extend(
            ["contech_core", "contech_identity", "contech_session", "contech"]
                .iter()
                .map(|target| format!("{}=debug", target)),
        );
        self
    }

    fn filter(&self) -> ContechResult<EnvFilter> {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        for directive in &self.directives {
            let parsed = directive.parse::<Directive>().map_err(|e| ContechError::Config {
                message: format!("Invalid log directive '{}'", directive),
                source: Some(Box::new(e)),
                context: ErrorContext::new("logging")
                    .with_operation("parse_directive")
                    .with_hint("Use target=level, e.g. contech_session=debug"),
            })?;
            filter = filter.add_directive(parsed);
        }

        Ok(filter)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> ContechResult<()> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let file = match &config.file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ContechError::Config {
                    message: format!("Cannot open log file {}", path.display()),
                    source: Some(Box::new(e)),
                    context: ErrorContext::new("logging").with_operation("open_log_file"),
                })?,
        ),
        None => None,
    };

    let layer = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_ansi(file.is_none());

    let installed = match (config.format, file) {
        (LogFormat::Json, Some(file)) => registry
            .with(layer.json().with_writer(Mutex::new(file)))
            .try_init(),
        (LogFormat::Json, None) => registry
            .with(layer.json().with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Pretty, Some(file)) => registry
            .with(layer.pretty().with_writer(Mutex::new(file)))
            .try_init(),
        (LogFormat::Pretty, None) => registry
            .with(layer.pretty().with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Compact, Some(file)) => registry
            .with(layer.compact().with_writer(Mutex::new(file)))
            .try_init(),
        (LogFormat::Compact, None) => registry
            .with(layer.compact().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| ContechError::Config {
        message: "Logging is already initialized".to_string(),
        source: Some(Box::new(e)),
        context: ErrorContext::new("logging").with_operation("init"),
    })
}

/// `log_operation_start!("sign_in")`, optionally followed by extra fields
#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr $(, $($field:tt)+)?) => {
        $crate::tracing::info!(op = $operation, $($($field)+,)? "operation started")
    };
}

#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr $(, $($field:tt)+)?) => {
        $crate::tracing::info!(op = $operation, $($($field)+,)? "operation completed")
    };
}

/// The error is recorded with its `Display` form
#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr $(, $($field:tt)+)?) => {
        $crate::tracing::warn!(op = $operation, error = %$error, $($($field)+,)? "operation failed")
    };
}
