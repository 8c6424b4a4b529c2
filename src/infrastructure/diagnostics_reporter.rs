//! Diagnostics reporter
//!
//! Every event is written to the log. When a webhook is configured the event
//! is also queued to a background task that POSTs it as JSON. Recording
//! never blocks: if the queue is full the event is dropped from forwarding
//! (it has already been logged).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use url::Url;

use crate::domain::diagnostics::{DiagnosticEvent, DiagnosticLevel, DiagnosticSink};

/// Channel buffer size
const CHANNEL_BUFFER: usize = 64;

/// HTTP request timeout for forwarding
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands sent to the reporter task.
enum ReporterCommand {
    Send(Box<DiagnosticEvent>),
    Shutdown,
}

/// Cheap-to-clone sink handed to the pipeline
#[derive(Clone)]
pub struct DiagnosticsHandle {
    tx: Option<mpsc::Sender<ReporterCommand>>,
}

impl DiagnosticsHandle {
    /// A sink that only writes events to the log
    pub fn log_only() -> Self {
        Self { tx: None }
    }

    pub fn is_forwarding(&self) -> bool {
        self.tx.is_some()
    }

    /// Ask the reporter to deliver what is queued and stop.
    pub async fn shutdown(&self) {
        if let Some(tx) = &self.tx {
            // Waits for room so the shutdown is not lost behind a full queue
            let _ = tx.send(ReporterCommand::Shutdown).await;
        }
    }
}

fn log_event(event: &DiagnosticEvent) {
    let context = serde_json::to_string(&event.context).unwrap_or_default();
    match event.level {
        DiagnosticLevel::Warning => warn!(diagnostic = %event.message, context = %context, "Diagnostic event"),
        DiagnosticLevel::Error => error!(diagnostic = %event.message, context = %context, "Diagnostic event"),
    }
}

impl DiagnosticSink for DiagnosticsHandle {
    fn record(&self, event: DiagnosticEvent) {
        log_event(&event);
        if let Some(tx) = &self.tx {
            if tx.try_send(ReporterCommand::Send(Box::new(event))).is_err() {
                warn!("Diagnostics queue full or closed, event not forwarded");
            }
        }
    }
}

/// Background task forwarding events to a webhook
pub struct DiagnosticsReporter {
    rx: mpsc::Receiver<ReporterCommand>,
    http_client: reqwest::Client,
    endpoint: Url,
}

impl DiagnosticsReporter {
    /// Create a new reporter and its handle.
    ///
    /// The reporter must be spawned as a task using `run()`.
    pub fn new(endpoint: Url) -> (Self, DiagnosticsHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        let reporter = Self { rx, http_client, endpoint };
        (reporter, DiagnosticsHandle { tx: Some(tx) })
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(mut self) {
        debug!(endpoint = %self.endpoint, "Diagnostics reporter started");

        while let Some(command) = self.rx.recv().await {
            match command {
                ReporterCommand::Send(event) => self.deliver(&event).await,
                ReporterCommand::Shutdown => {
                    // Drain what was queued before the shutdown request
                    while let Ok(ReporterCommand::Send(event)) = self.rx.try_recv() {
                        self.deliver(&event).await;
                    }
                    break;
                }
            }
        }

        debug!("Diagnostics reporter stopped");
    }

    async fn deliver(&self, event: &DiagnosticEvent) {
        match self.http_client.post(self.endpoint.clone()).json(event).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(diagnostic = %event.message, "Diagnostic event forwarded");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Diagnostics endpoint rejected event");
            }
            Err(e) => {
                warn!(error = %e, "Failed to forward diagnostic event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_events_are_forwarded_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/diag")
            .match_body(Matcher::PartialJson(json!({
                "message": "stat element missing",
                "level": "warning",
                "context": { "index": 3 }
            })))
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let endpoint = Url::parse(&format!("{}/diag", server.url())).unwrap();
        let (reporter, handle) = DiagnosticsReporter::new(endpoint);
        let task = tokio::spawn(reporter.run());

        handle.record(DiagnosticEvent::warning("stat element missing").with("index", 3));
        handle.shutdown().await;
        task.await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_log_only_handle_accepts_events() {
        let handle = DiagnosticsHandle::log_only();
        assert!(!handle.is_forwarding());
        handle.record(DiagnosticEvent::error("background scrape run failed"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reporter_stops_when_handles_drop() {
        let endpoint = Url::parse("http://127.0.0.1:9/diag").unwrap();
        let (reporter, handle) = DiagnosticsReporter::new(endpoint);
        let task = tokio::spawn(reporter.run());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
