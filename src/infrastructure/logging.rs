//! Logging system configuration and initialization
//!
//! - Console output, plain or JSON
//! - Optional daily-rolling file output through a non-blocking writer
//! - UTC timestamps
//! - `RUST_LOG` overrides the configured level

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Utc;
use tracing::{Subscriber, info};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter, time::FormatTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// File name prefix for the rolling log file
pub const LOG_FILE_NAME: &str = "statwatch.log";

/// Keeps the non-blocking file writer alive; flushes on drop
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Custom time formatter for UTC with millisecond precision
struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Console output, JSON or plain depending on `json`
fn console_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_timer(UtcTimeFormatter)
            .with_target(true)
            .boxed()
    } else {
        fmt::Layer::new()
            .with_writer(writer)
            .with_timer(UtcTimeFormatter)
            .with_target(false)
            .boxed()
    }
}

/// Build the level filter, quieting dependency internals unless tracing
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level '{}': {}", level, e))?;

    if !level.to_lowercase().contains("trace") {
        for directive in ["sqlx::query=warn", "sqlx=warn", "reqwest=info", "hyper=warn", "h2=warn", "tokio=info"] {
            filter = filter.add_directive(directive.parse().map_err(|e| anyhow!("Invalid directive '{}': {}", directive, e))?);
        }
    }

    Ok(filter)
}

/// Initialize logging with the given configuration.
///
/// Returns a guard that must be held for the life of the process when file
/// output is enabled.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = build_env_filter(&config.level)?;
    let registry = Registry::default().with(env_filter);

    let mut file_guard = None;

    match (&config.log_dir, config.console_output) {
        (Some(log_dir), console) => {
            std::fs::create_dir_all(log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

            let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);
            let (file_writer, guard) = non_blocking(file_appender);
            file_guard = Some(guard);

            // The file always gets JSON so it can be shipped as-is
            let file_layer = fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(true)
                .with_ansi(false);

            registry
                .with(file_layer)
                .with(console.then(|| console_layer(config.json_format, std::io::stdout)))
                .try_init()
                .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;
        }
        (None, true) => {
            registry
                .with(console_layer(config.json_format, std::io::stdout))
                .try_init()
                .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;
        }
        (None, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);
    if let Some(dir) = &config.log_dir {
        info!("Log directory: {:?}", dir);
    }

    Ok(LoggingGuard { _file_guard: file_guard })
}

/// Log process information for diagnostics
pub fn log_system_info() {
    info!("=== Statwatch System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    info!("====================================");
}
