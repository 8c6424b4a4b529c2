//! Test utilities for statwatch
//!
//! Fakes for the pipeline's collaborators plus an isolated in-memory
//! database, so tests never touch the network or shared state.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::scrape_orchestrator::{ScrapeOrchestrator, ScrapeSettings};
use crate::domain::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::domain::fetcher::{FetchError, PageFetcher};
use crate::domain::repositories::{SampleRepository, StoreError};
use crate::domain::sample::Sample;
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::sample_repository::SqliteSampleRepository;
use crate::infrastructure::stat_extractor::{StatExtractor, StatLayout};

pub const TEST_COUNTRY: &str = "angola";
pub const TEST_SOURCE_URL: &str = "https://stats.example.org/";

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Create a new in-memory test database; each call is isolated
    pub async fn new() -> anyhow::Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    pub fn repository(&self) -> SqliteSampleRepository {
        SqliteSampleRepository::new(self.connection.pool().clone())
    }
}

/// Diagnostics sink that keeps every event for inspection
#[derive(Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Render a statistics page with one card per value.
///
/// `None` renders the card without its number element.
pub fn stats_page(values: &[Option<&str>]) -> String {
    let cards: String = values
        .iter()
        .map(|value| match value {
            Some(v) => format!(r#"<div class="stat"><span class="big-number text-black">{v}</span><p>label</p></div>"#),
            None => r#"<div class="stat"><p>label</p></div>"#.to_string(),
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head><title>Stats</title></head>
<body>
<section class="lastsection container box effect7">
  <div><div><div><div>
    <div class="stat-header"><h2>Situação</h2></div>
    {cards}
  </div></div></div></div>
</section>
</body></html>"#
    )
}

/// Fetcher that replays scripted responses and counts calls
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<String, FetchError>>>,
    fallback: Result<String, FetchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    /// Always answer with `body`
    pub fn always(body: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Ok(body.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with `error`
    pub fn failing(error: FetchError) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer with `responses` in order, then keep repeating the last one
    pub fn sequence(responses: Vec<Result<String, FetchError>>) -> Self {
        let mut queue: VecDeque<_> = responses.into();
        let fallback = queue.pop_back().unwrap_or_else(|| Ok(String::new()));
        Self {
            responses: Mutex::new(queue),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, to keep a run in flight
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// In-memory repository with switchable read/write failures
#[derive(Default)]
pub struct FakeSampleRepository {
    samples: Mutex<Vec<Sample>>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
    appends: AtomicUsize,
}

impl FakeSampleRepository {
    pub fn with_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: Mutex::new(samples),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }

    /// Number of append calls, successful or not
    pub fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SampleRepository for FakeSampleRepository {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Write("backend unavailable".to_string()));
        }
        self.samples.lock().unwrap().push(sample.clone());
        Ok(())
    }

    async fn latest(&self, country: &str) -> Result<Option<Sample>, StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(StoreError::Read("backend unavailable".to_string()));
        }
        Ok(self
            .samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.country == country)
            .max_by_key(|s| s.timestamp)
            .cloned())
    }

    async fn all(&self, country: &str) -> Result<Vec<Sample>, StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(StoreError::Read("backend unavailable".to_string()));
        }
        let mut samples: Vec<Sample> = self
            .samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.country == country)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }
}

/// Shared handles to the fakes behind one orchestrator
pub struct Fakes {
    pub fetcher: Arc<ScriptedFetcher>,
    pub repository: Arc<FakeSampleRepository>,
    pub diagnostics: Arc<RecordingDiagnostics>,
}

impl Fakes {
    pub fn new(fetcher: ScriptedFetcher, repository: FakeSampleRepository) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            repository: Arc::new(repository),
            diagnostics: Arc::new(RecordingDiagnostics::default()),
        }
    }

    /// Orchestrator over these fakes with the default page layout
    pub fn orchestrator(&self) -> ScrapeOrchestrator {
        let extractor = StatExtractor::new(&StatLayout::default(), self.diagnostics.clone()).unwrap();
        ScrapeOrchestrator::new(
            self.fetcher.clone(),
            extractor,
            self.repository.clone(),
            self.diagnostics.clone(),
            ScrapeSettings {
                source_url: TEST_SOURCE_URL.to_string(),
                country: TEST_COUNTRY.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = TestDatabase::new().await.unwrap();
        assert!(!db.connection.pool().is_closed());
    }

    #[tokio::test]
    async fn test_scripted_fetcher_replays_in_order() {
        let fetcher = ScriptedFetcher::sequence(vec![
            Ok("first".to_string()),
            Err(FetchError::Timeout { url: "u".to_string() }),
            Ok("last".to_string()),
        ]);

        assert_eq!(fetcher.fetch("u").await.unwrap(), "first");
        assert!(fetcher.fetch("u").await.is_err());
        assert_eq!(fetcher.fetch("u").await.unwrap(), "last");
        assert_eq!(fetcher.fetch("u").await.unwrap(), "last");
        assert_eq!(fetcher.calls(), 4);
    }
}
