//! Trigger gate
//!
//! Authenticates run requests against the shared secret, throttles them and
//! hands accepted ones to the orchestrator, either inline or as a tracked
//! background task.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::application::scrape_orchestrator::{RunOutcome, ScrapeError, ScrapeOrchestrator};
use crate::domain::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::infrastructure::config::{TriggerConfig, TriggerMode, TriggerSecret};

/// Diagnostic message for a background run that failed
pub const BACKGROUND_FAILURE_MESSAGE: &str = "background scrape run failed";

/// What the caller gets back for an accepted trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReceipt {
    /// The run finished inline
    Completed(RunOutcome),
    /// The run was started in the background
    Accepted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("invalid or no api key")]
    Unauthorized,

    #[error("too many trigger requests")]
    RateLimited,

    #[error("a scrape run is already in progress")]
    Busy,

    #[error(transparent)]
    RunFailed(ScrapeError),
}

impl From<ScrapeError> for TriggerError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::RunInProgress => Self::Busy,
            other => Self::RunFailed(other),
        }
    }
}

pub struct TriggerGate {
    secret: TriggerSecret,
    mode: TriggerMode,
    limiter: DefaultDirectRateLimiter,
    orchestrator: Arc<ScrapeOrchestrator>,
    diagnostics: Arc<dyn DiagnosticSink>,
    tracker: TaskTracker,
}

impl TriggerGate {
    pub fn new(
        config: &TriggerConfig,
        orchestrator: Arc<ScrapeOrchestrator>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            secret: config.secret.clone(),
            mode: config.mode,
            limiter: RateLimiter::direct(Quota::per_minute(config.rate_per_minute)),
            orchestrator,
            diagnostics,
            tracker: TaskTracker::new(),
        }
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    /// Compare a presented credential with the secret in constant time
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(presented) if !presented.is_empty() => bool::from(presented.as_bytes().ct_eq(self.secret.as_bytes())),
            _ => false,
        }
    }

    /// Handle one trigger request
    pub async fn handle(&self, presented: Option<&str>) -> Result<TriggerReceipt, TriggerError> {
        if !self.authorize(presented) {
            debug!("Trigger request rejected: invalid or missing credential");
            return Err(TriggerError::Unauthorized);
        }

        // Only authenticated requests draw from the quota
        if self.limiter.check().is_err() {
            warn!("Trigger request throttled");
            return Err(TriggerError::RateLimited);
        }

        let permit = self.orchestrator.try_begin().map_err(|e| {
            info!("Trigger request rejected: run already in progress");
            TriggerError::from(e)
        })?;

        match self.mode {
            TriggerMode::Sync => {
                let outcome = self.orchestrator.run_with_permit(permit).await?;
                Ok(TriggerReceipt::Completed(outcome))
            }
            TriggerMode::Background => {
                let orchestrator = Arc::clone(&self.orchestrator);
                let diagnostics = Arc::clone(&self.diagnostics);
                self.tracker.spawn(async move {
                    if let Err(e) = orchestrator.run_with_permit(permit).await {
                        diagnostics.record(
                            DiagnosticEvent::error(BACKGROUND_FAILURE_MESSAGE)
                                .with("stage", e.stage().as_str())
                                .with("category", e.category())
                                .with("error", e.to_string()),
                        );
                    }
                });
                debug!("Scrape run started in background");
                Ok(TriggerReceipt::Accepted)
            }
        }
    }

    /// Stop accepting background work and wait for in-flight runs.
    ///
    /// Returns false if runs were still going when `grace` ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !drained {
            warn!(pending = self.tracker.len(), "Background runs still in flight at shutdown");
        }
        drained
    }
}
