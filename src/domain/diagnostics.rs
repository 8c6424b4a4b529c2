//! Diagnostic events
//!
//! Recoverable anomalies (a missing stat element, a degraded store read, a
//! failed background run) are reported as structured events rather than
//! errors. Where they end up is decided by the `DiagnosticSink` implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// A message plus structured context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub message: String,
    pub level: DiagnosticLevel,
    pub context: BTreeMap<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            context: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    /// Attach a context entry
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}

/// Destination for diagnostic events.
///
/// Recording must never block the caller or fail; sinks drop events they
/// cannot deliver.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}
