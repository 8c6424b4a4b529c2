//! Statwatch - change-detecting statistics scraper
//!
//! Reads a public statistics page on demand, extracts its four headline
//! counts and appends them to a history store only when they differ from
//! the latest stored sample. Runs are started through a shared-secret
//! trigger endpoint; the history is served back as JSON.

// Module declarations
pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{ApiState, build_router};
use crate::application::{ScrapeOrchestrator, ScrapeSettings, TriggerGate};
use crate::domain::diagnostics::DiagnosticSink;
use crate::infrastructure::{
    AppConfig, DatabaseConnection, DiagnosticsHandle, DiagnosticsReporter, HttpClient, HttpClientConfig,
    SqliteSampleRepository, StatExtractor, StatLayout, init_logging, log_system_info,
};

/// Extra time background runs get at shutdown beyond the fetch timeout
const SHUTDOWN_GRACE_MARGIN: Duration = Duration::from_secs(5);

/// A fully wired service, ready to serve
pub struct App {
    router: axum::Router,
    gate: Arc<TriggerGate>,
    diagnostics: DiagnosticsHandle,
    reporter_task: Option<JoinHandle<()>>,
    database: DatabaseConnection,
    shutdown_grace: Duration,
}

impl App {
    /// Open the store, build the pipeline and the router
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let database = DatabaseConnection::new(&config.database_url)
            .await
            .context("failed to open sample store")?;
        database.migrate().await.context("failed to prepare sample store")?;

        let (diagnostics, reporter_task) = match &config.diagnostics_url {
            Some(endpoint) => {
                let (reporter, handle) = DiagnosticsReporter::new(endpoint.clone());
                (handle, Some(tokio::spawn(reporter.run())))
            }
            None => (DiagnosticsHandle::log_only(), None),
        };
        let sink: Arc<dyn DiagnosticSink> = Arc::new(diagnostics.clone());

        let fetcher = HttpClient::new(HttpClientConfig {
            timeout: config.scraper.fetch_timeout,
            ..HttpClientConfig::default()
        })?;
        let layout = StatLayout::with_overrides(
            config.scraper.stat_base_path.clone(),
            config.scraper.stat_value_selector.clone(),
        );
        let extractor = StatExtractor::new(&layout, Arc::clone(&sink))?;
        let repository = Arc::new(SqliteSampleRepository::new(database.pool().clone()));

        let orchestrator = ScrapeOrchestrator::new(
            Arc::new(fetcher),
            extractor,
            repository.clone(),
            Arc::clone(&sink),
            ScrapeSettings {
                source_url: config.scraper.source_url.to_string(),
                country: config.scraper.country.clone(),
            },
        );
        let gate = Arc::new(TriggerGate::new(&config.trigger, Arc::new(orchestrator), sink));
        let router = build_router(ApiState::new(Arc::clone(&gate), repository, config.scraper.country.clone()));

        Ok(Self {
            router,
            gate,
            diagnostics,
            reporter_task,
            database,
            shutdown_grace: config.scraper.fetch_timeout + SHUTDOWN_GRACE_MARGIN,
        })
    }

    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    /// Serve until `shutdown` is cancelled, then release everything
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        info!(addr = %listener.local_addr()?, "Listening");

        let token = shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .context("server error")?;

        self.shutdown().await;
        Ok(())
    }

    /// Wait for background runs, flush diagnostics and close the store
    pub async fn shutdown(self) {
        info!("Shutting down");
        self.gate.shutdown(self.shutdown_grace).await;

        self.diagnostics.shutdown().await;
        if let Some(task) = self.reporter_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Diagnostics reporter ended abnormally");
            }
        }

        self.database.close().await;
        info!("Shutdown complete");
    }
}

/// Resolve when the process is asked to stop
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    token.cancel();
}

/// Load configuration from the environment and run the service
pub async fn run() -> Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    let _logging_guard = init_logging(&config.logging)?;
    log_system_info();
    config.log_summary();

    let app = App::build(&config).await?;
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    app.serve(listener, shutdown).await
}
