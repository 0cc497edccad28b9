//! Structured logging setup.
//!
//! JSON formatting for production, pretty formatting for development, plus
//! optional file output with daily rotation. No OpenTelemetry exporter: this
//! is a short-lived CLI process, not a long-running service, so there is no
//! trace collector for it to report to.

use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormatConfig, LoggingSettings};

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

/// Configuration for logging setup, derived from `LoggingSettings` plus
/// environment overrides.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormatConfig,
    pub output: LogOutput,
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    pub enable_rotation: bool,
    pub environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = environment == "production" || environment == "prod";

        Self {
            format: if is_production {
                LogFormatConfig::Json
            } else {
                LogFormatConfig::Pretty
            },
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "fabric-ontology".to_string(),
            enable_rotation: false,
            environment,
        }
    }
}

impl LoggingConfig {
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let mut config = Self::default();
        config.format = settings.format;
        config.enable_rotation = settings.rotation.enabled;
        if let Some(file) = &settings.file {
            config.output = LogOutput::File;
            if let Some(parent) = file.parent() {
                config.log_dir = parent.to_path_buf();
            }
            if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                config.log_file_prefix = stem.to_string();
            }
        }
        config
    }
}

/// Initialize structured logging. Returns a `WorkerGuard` that must be held
/// for the lifetime of the process to ensure buffered logs are flushed.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if config.environment == "production" || config.environment == "prod"
        {
            "info"
        } else {
            "debug"
        };
        EnvFilter::new(default_level)
    });

    let (writer, guard) = match config.output {
        LogOutput::Stdout => {
            let (non_blocking, guard) = tracing_appender::non_blocking(io::stdout());
            (non_blocking, Some(guard))
        }
        LogOutput::Stderr => {
            let (non_blocking, guard) = tracing_appender::non_blocking(io::stderr());
            (non_blocking, Some(guard))
        }
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir).context("failed to create log directory")?;
            let file_appender = if config.enable_rotation {
                tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix)
            } else {
                tracing_appender::rolling::never(&config.log_dir, &config.log_file_prefix)
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (non_blocking, Some(guard))
        }
    };

    let registry = tracing_subscriber::registry();
    match config.format {
        LogFormatConfig::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_line_number(true)
                .with_filter(env_filter);
            registry.with(fmt_layer).init();
        }
        LogFormatConfig::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_target(true)
                .with_filter(env_filter);
            registry.with(fmt_layer).init();
        }
    }

    tracing::info!(environment = %config.environment, "logging initialized");
    Ok(guard)
}
