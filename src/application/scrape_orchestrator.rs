//! # Scrape Orchestrator
//!
//! Runs one Fetch → Extract → Compare → (Persist) pass. Only a fetch failure
//! or a write failure fails a run; a missing stat or an unreadable store
//! degrades instead.
//!
//! At most one run is in flight at a time. A run needs a `RunPermit`, and
//! asking for one while another run holds it fails with
//! `ScrapeError::RunInProgress` rather than queueing.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::domain::change_detector::changed;
use crate::domain::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::domain::fetcher::{FetchError, PageFetcher};
use crate::domain::repositories::{SampleRepository, StoreError};
use crate::domain::sample::{Sample, truncate_to_micros};
use crate::infrastructure::stat_extractor::StatExtractor;

/// Diagnostic message for the degraded-read fallback
pub const LATEST_UNAVAILABLE_MESSAGE: &str = "latest sample unavailable";

/// What the orchestrator needs to know about its deployment
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub source_url: String,
    pub country: String,
}

/// Stages of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Fetching,
    Extracting,
    Comparing,
    Persisting,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Comparing => "comparing",
            Self::Persisting => "persisting",
        }
    }
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Indicators matched the latest stored sample; nothing was written
    Unchanged,
    /// A new sample was appended
    Persisted(Sample),
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Persisted(_) => "persisted",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("a scrape run is already in progress")]
    RunInProgress,
}

impl ScrapeError {
    /// Stage the run was in when it failed
    pub fn stage(&self) -> RunStage {
        match self {
            Self::Fetch(_) => RunStage::Fetching,
            Self::Store(_) => RunStage::Persisting,
            Self::RunInProgress => RunStage::Idle,
        }
    }

    /// Stable, caller-safe category
    pub fn category(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "FETCH_FAILED",
            Self::Store(_) => "STORE_WRITE_FAILED",
            Self::RunInProgress => "RUN_IN_PROGRESS",
        }
    }
}

/// Result of looking up the latest stored sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousSample {
    Found(Sample),
    /// The store has no sample yet
    Empty,
    /// The store could not be read; compared as if empty so the run persists
    Degraded(StoreError),
}

impl PreviousSample {
    pub fn as_option(&self) -> Option<&Sample> {
        match self {
            Self::Found(sample) => Some(sample),
            Self::Empty | Self::Degraded(_) => None,
        }
    }
}

/// Exclusive right to run; released on drop
pub struct RunPermit {
    _guard: OwnedMutexGuard<()>,
}

/// Timestamp for a new sample: now, but always after the previous sample
pub fn next_timestamp(previous: Option<&Sample>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = truncate_to_micros(now);
    match previous {
        Some(previous) if now <= previous.timestamp => previous.timestamp + Duration::microseconds(1),
        _ => now,
    }
}

pub struct ScrapeOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    extractor: StatExtractor,
    repository: Arc<dyn SampleRepository>,
    diagnostics: Arc<dyn DiagnosticSink>,
    settings: ScrapeSettings,
    run_lock: Arc<Mutex<()>>,
}

impl ScrapeOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: StatExtractor,
        repository: Arc<dyn SampleRepository>,
        diagnostics: Arc<dyn DiagnosticSink>,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            repository,
            diagnostics,
            settings,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.settings
    }

    /// Claim the single run slot without waiting
    pub fn try_begin(&self) -> Result<RunPermit, ScrapeError> {
        self.run_lock
            .clone()
            .try_lock_owned()
            .map(|guard| RunPermit { _guard: guard })
            .map_err(|_| ScrapeError::RunInProgress)
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Claim the run slot and execute one run
    pub async fn run(&self) -> Result<RunOutcome, ScrapeError> {
        let permit = self.try_begin()?;
        self.run_with_permit(permit).await
    }

    /// Execute one run under an already-claimed permit
    pub async fn run_with_permit(&self, permit: RunPermit) -> Result<RunOutcome, ScrapeError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape_run", %run_id, country = %self.settings.country);
        let result = self.execute().instrument(span).await;
        drop(permit);
        result
    }

    async fn execute(&self) -> Result<RunOutcome, ScrapeError> {
        debug!(stage = RunStage::Fetching.as_str(), url = %self.settings.source_url, "Fetching source page");
        let content = self.fetcher.fetch(&self.settings.source_url).await.map_err(|e| {
            warn!(error = %e, "Scrape run failed while fetching");
            ScrapeError::Fetch(e)
        })?;

        debug!(stage = RunStage::Extracting.as_str(), bytes = content.len(), "Extracting stats");
        let next = self.extractor.extract(&content);

        debug!(stage = RunStage::Comparing.as_str(), "Comparing with latest sample");
        let previous = self.load_previous().await;

        if !changed(previous.as_option(), &next) {
            info!("Stats unchanged, nothing to persist");
            return Ok(RunOutcome::Unchanged);
        }

        debug!(stage = RunStage::Persisting.as_str(), "Persisting new sample");
        let timestamp = next_timestamp(previous.as_option(), Utc::now());
        let sample = Sample::stamp(next, self.settings.country.clone(), timestamp);

        self.repository.append(&sample).await.map_err(|e| {
            warn!(error = %e, "Scrape run failed while persisting");
            ScrapeError::Store(e)
        })?;

        info!(
            primary_count = ?sample.primary_count,
            suspects = ?sample.suspects,
            recovered = ?sample.recovered,
            deaths = ?sample.deaths,
            "Persisted new sample"
        );
        Ok(RunOutcome::Persisted(sample))
    }

    /// Latest sample, with read failures turned into the named degraded fallback
    pub async fn load_previous(&self) -> PreviousSample {
        match self.repository.latest(&self.settings.country).await {
            Ok(Some(sample)) => PreviousSample::Found(sample),
            Ok(None) => {
                info!("No stored sample yet, first observation will be persisted");
                PreviousSample::Empty
            }
            Err(e) => {
                warn!(error = %e, "Latest sample unavailable, persisting unconditionally");
                self.diagnostics.record(
                    DiagnosticEvent::warning(LATEST_UNAVAILABLE_MESSAGE)
                        .with("country", self.settings.country.as_str())
                        .with("error", e.to_string()),
                );
                PreviousSample::Degraded(e)
            }
        }
    }
}
