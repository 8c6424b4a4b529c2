//! Repository interfaces for sample history
//!
//! The store is append-only and time-ordered per country.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::sample::Sample;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("failed to read samples: {0}")]
    Read(String),

    #[error("failed to write sample: {0}")]
    Write(String),

    #[error("sample timestamp {attempted} is not after the latest stored timestamp {latest} for '{country}'")]
    OutOfOrder {
        country: String,
        attempted: String,
        latest: String,
    },
}

impl StoreError {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_) | Self::OutOfOrder { .. })
    }
}

#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Durably append a sample. Must not drop the record silently.
    async fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// Most recently persisted sample for `country`, or `None` when there is none
    async fn latest(&self, country: &str) -> Result<Option<Sample>, StoreError>;

    /// Every sample for `country`, oldest first
    async fn all(&self, country: &str) -> Result<Vec<Sample>, StoreError>;
}
