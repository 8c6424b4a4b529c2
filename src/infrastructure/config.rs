//! Configuration infrastructure
//!
//! All settings come from the process environment and are validated once at
//! startup. A missing or malformed required value is a `ConfigError` and the
//! process refuses to start.

#![allow(clippy::uninlined_format_args)]

use config::{Config, ConfigBuilder, Environment, builder::DefaultState};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { key, reason: reason.into() }
    }
}

/// How the trigger endpoint reports on the run it started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Wait for the run and report its outcome to the caller
    Sync,
    /// Acknowledge immediately; failures only reach the diagnostics sink
    Background,
}

impl TriggerMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(Self::Sync),
            "background" | "fire-and-forget" => Ok(Self::Background),
            other => Err(ConfigError::invalid(
                "TRIGGER_MODE",
                format!("expected 'sync' or 'background', got '{}'", other),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Background => "background",
        }
    }
}

/// Shared secret for the trigger endpoint. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct TriggerSecret(String);

impl TriggerSecret {
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.chars().count() < defaults::MIN_SECRET_LEN {
            return Err(ConfigError::invalid(
                "SCRAPER_API_KEY",
                format!("must be at least {} characters", defaults::MIN_SECRET_LEN),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for TriggerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TriggerSecret(***)")
    }
}

/// Trigger endpoint settings
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub secret: TriggerSecret,
    pub mode: TriggerMode,
    pub rate_per_minute: NonZeroU32,
}

/// Scraper settings
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub source_url: Url,
    pub country: String,
    pub fetch_timeout: Duration,
    /// Overrides the structural path to the stat cards
    pub stat_base_path: Option<String>,
    /// Overrides the selector of the number inside each stat card
    pub stat_value_selector: Option<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Directory for the rolling log file; file output is off when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            log_dir: None,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub trigger: TriggerConfig,
    pub scraper: ScraperConfig,
    /// Store credentials, e.g. `sqlite:data/samples.db`
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Webhook receiving diagnostic events, if any
    pub diagnostics_url: Option<Url>,
    pub logging: LoggingConfig,
}

/// Settings as they arrive from the environment, before validation
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    scraper_api_key: Option<String>,
    database_url: Option<String>,
    source_url: Option<String>,
    country: Option<String>,
    trigger_mode: Option<String>,
    trigger_rate_per_minute: Option<u32>,
    fetch_timeout_seconds: Option<u64>,
    bind_addr: Option<String>,
    stat_base_path: Option<String>,
    stat_value_selector: Option<String>,
    diagnostics_url: Option<String>,
    log_level: Option<String>,
    log_json: Option<bool>,
    log_console: Option<bool>,
    log_dir: Option<String>,
}

impl AppConfig {
    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(Environment::default()))
    }

    /// Load and validate configuration from any prepared builder
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let secret = raw
            .scraper_api_key
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SCRAPER_API_KEY"))?;
        let secret = TriggerSecret::new(secret)?;

        let database_url = non_blank(raw.database_url).ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let source_url = parse_http_url(
            "SOURCE_URL",
            &non_blank(raw.source_url).unwrap_or_else(|| defaults::SOURCE_URL.to_string()),
        )?;

        let country = match raw.country {
            Some(c) if c.trim().is_empty() => return Err(ConfigError::invalid("COUNTRY", "must not be empty")),
            Some(c) => c.trim().to_string(),
            None => defaults::COUNTRY.to_string(),
        };

        let mode = match non_blank(raw.trigger_mode) {
            Some(m) => TriggerMode::parse(&m)?,
            None => TriggerMode::Sync,
        };

        let rate_per_minute = NonZeroU32::new(raw.trigger_rate_per_minute.unwrap_or(defaults::TRIGGER_RATE_PER_MINUTE))
            .ok_or_else(|| ConfigError::invalid("TRIGGER_RATE_PER_MINUTE", "must be greater than 0"))?;

        let timeout_secs = raw.fetch_timeout_seconds.unwrap_or(defaults::FETCH_TIMEOUT_SECONDS);
        if !(1..=defaults::MAX_FETCH_TIMEOUT_SECONDS).contains(&timeout_secs) {
            return Err(ConfigError::invalid(
                "FETCH_TIMEOUT_SECONDS",
                format!("must be between 1 and {}", defaults::MAX_FETCH_TIMEOUT_SECONDS),
            ));
        }

        let bind_addr = non_blank(raw.bind_addr)
            .unwrap_or_else(|| defaults::BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

        let diagnostics_url = non_blank(raw.diagnostics_url)
            .map(|u| parse_http_url("DIAGNOSTICS_URL", &u))
            .transpose()?;

        let logging = LoggingConfig {
            level: non_blank(raw.log_level).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
            json_format: raw.log_json.unwrap_or(defaults::LOG_JSON_FORMAT),
            console_output: raw.log_console.unwrap_or(defaults::LOG_CONSOLE_OUTPUT),
            log_dir: non_blank(raw.log_dir).map(PathBuf::from),
        };

        Ok(Self {
            trigger: TriggerConfig { secret, mode, rate_per_minute },
            scraper: ScraperConfig {
                source_url,
                country,
                fetch_timeout: Duration::from_secs(timeout_secs),
                stat_base_path: non_blank(raw.stat_base_path),
                stat_value_selector: non_blank(raw.stat_value_selector),
            },
            database_url,
            bind_addr,
            diagnostics_url,
            logging,
        })
    }

    /// Log the effective configuration without secrets
    pub fn log_summary(&self) {
        info!("🔧 Configuration loaded:");
        info!("   source_url: {}", self.scraper.source_url);
        info!("   country: {}", self.scraper.country);
        info!("   fetch_timeout: {:?}", self.scraper.fetch_timeout);
        info!("   trigger_mode: {}", self.trigger.mode.as_str());
        info!("   trigger_rate_per_minute: {}", self.trigger.rate_per_minute);
        info!("   bind_addr: {}", self.bind_addr);
        info!("   diagnostics forwarding: {}", self.diagnostics_url.is_some());
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_http_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(key, format!("unsupported scheme '{}'", other))),
    }
}

/// Default configuration values
pub mod defaults {
    /// Statistics page observed when SOURCE_URL is not set
    pub const SOURCE_URL: &str = "https://covid19.gov.ao/";

    /// Country label stamped on every sample
    pub const COUNTRY: &str = "angola";

    /// Shortest accepted trigger secret
    pub const MIN_SECRET_LEN: usize = 9;

    /// Trigger attempts allowed per minute
    pub const TRIGGER_RATE_PER_MINUTE: u32 = 30;

    /// Default request timeout in seconds
    pub const FETCH_TIMEOUT_SECONDS: u64 = 30;

    /// Upper bound for the configurable request timeout
    pub const MAX_FETCH_TIMEOUT_SECONDS: u64 = 120;

    pub const BIND_ADDR: &str = "0.0.0.0:3000";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cret-trigger-key";

    fn builder_with(pairs: &[(&str, &str)]) -> ConfigBuilder<DefaultState> {
        pairs.iter().fold(Config::builder(), |builder, (key, value)| {
            builder.set_override(*key, *value).unwrap()
        })
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![("scraper_api_key", SECRET), ("database_url", "sqlite::memory:")]
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_builder(builder_with(&minimal())).unwrap();

        assert_eq!(config.scraper.source_url.as_str(), defaults::SOURCE_URL);
        assert_eq!(config.scraper.country, "angola");
        assert_eq!(config.scraper.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.trigger.mode, TriggerMode::Sync);
        assert_eq!(config.trigger.rate_per_minute.get(), 30);
        assert_eq!(config.trigger.secret.as_bytes(), SECRET.as_bytes());
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.diagnostics_url.is_none());
        assert!(config.logging.log_dir.is_none());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = AppConfig::from_builder(builder_with(&[("database_url", "sqlite::memory:")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SCRAPER_API_KEY")));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let err = AppConfig::from_builder(builder_with(&[
            ("scraper_api_key", "12345678"),
            ("database_url", "sqlite::memory:"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SCRAPER_API_KEY", .. }));
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        let err = AppConfig::from_builder(builder_with(&[("scraper_api_key", SECRET)])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_malformed_source_url_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("source_url", "not a url"));
        let err = AppConfig::from_builder(builder_with(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SOURCE_URL", .. }));

        let mut pairs = minimal();
        pairs.push(("source_url", "ftp://example.com/"));
        assert!(AppConfig::from_builder(builder_with(&pairs)).is_err());
    }

    #[test]
    fn test_unknown_trigger_mode_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("trigger_mode", "eventually"));
        let err = AppConfig::from_builder(builder_with(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TRIGGER_MODE", .. }));
    }

    #[test]
    fn test_overrides_are_applied() {
        let mut pairs = minimal();
        pairs.extend([
            ("trigger_mode", "background"),
            ("country", "  cabo-verde "),
            ("fetch_timeout_seconds", "5"),
            ("trigger_rate_per_minute", "2"),
            ("diagnostics_url", "https://hooks.example.com/diag"),
            ("log_json", "true"),
            ("log_dir", "/tmp/statwatch-logs"),
        ]);
        let config = AppConfig::from_builder(builder_with(&pairs)).unwrap();

        assert_eq!(config.trigger.mode, TriggerMode::Background);
        assert_eq!(config.scraper.country, "cabo-verde");
        assert_eq!(config.scraper.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.trigger.rate_per_minute.get(), 2);
        assert_eq!(config.diagnostics_url.unwrap().host_str(), Some("hooks.example.com"));
        assert!(config.logging.json_format);
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/tmp/statwatch-logs")));
    }

    #[test]
    fn test_out_of_range_timeout_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("fetch_timeout_seconds", "0"));
        assert!(AppConfig::from_builder(builder_with(&pairs)).is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = TriggerSecret::new(SECRET).unwrap();
        assert!(!format!("{:?}", secret).contains(SECRET));
    }
}
