//! Infrastructure layer for storage, fetching, parsing, and process plumbing
//!
//! Concrete adapters behind the domain interfaces, plus configuration and
//! logging setup.

pub mod config;  // Environment configuration and validation
pub mod database_connection;
pub mod diagnostics_reporter;
pub mod http_client;
pub mod logging;  // Logging infrastructure
pub mod sample_repository;
pub mod stat_extractor;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, TriggerMode, TriggerSecret};
pub use database_connection::DatabaseConnection;
pub use diagnostics_reporter::{DiagnosticsHandle, DiagnosticsReporter};
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::{LoggingGuard, init_logging, log_system_info};
pub use sample_repository::SqliteSampleRepository;
pub use stat_extractor::{FieldSlot, ParsingError, StatExtractor, StatLayout};
