//! The reconcile loop.
//!
//! # Responsibilities
//! - Run fetch → filter → render → install once per tick
//! - Catch and log every tick failure; never exit because of one
//! - Sleep between ticks and stop on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::Settings;
use crate::discovery::{parse_endpoints, ApiClient, EndpointSource};
use crate::error::{ConfdError, ConfdResult};
use crate::install::{CommandRunner, InstallOutcome, Installer, SystemRunner};
use crate::observability::metrics;
use crate::render::{MiniJinjaEngine, Renderer, RunMetadata, TemplateEngine};
use crate::resilience::RetryDelay;

/// Drives reconcile ticks.
pub struct Reconciler<S, E, R: CommandRunner = SystemRunner> {
    source: S,
    renderer: Arc<Renderer<E>>,
    installer: Installer<R>,
    delay: RetryDelay,
}

impl Reconciler<ApiClient, MiniJinjaEngine, SystemRunner> {
    /// Build the production reconciler from settings.
    pub fn from_settings(settings: &Settings) -> ConfdResult<Self> {
        let template_dir = &settings.render.template_dir;
        Ok(Self::new(
            ApiClient::new(settings.api.clone()),
            Renderer::new(template_dir, MiniJinjaEngine::new(template_dir)),
            Installer::new(&settings.install)?,
            RetryDelay::new(
                Duration::from_secs(settings.interval_secs),
                Duration::from_secs(settings.backoff_max_secs),
            ),
        ))
    }
}

impl<S, E, R> Reconciler<S, E, R>
where
    S: EndpointSource,
    E: TemplateEngine + 'static,
    R: CommandRunner,
{
    pub fn new(source: S, renderer: Renderer<E>, installer: Installer<R>, delay: RetryDelay) -> Self {
        Self {
            source,
            renderer: Arc::new(renderer),
            installer,
            delay,
        }
    }

    pub fn installer(&self) -> &Installer<R> {
        &self.installer
    }

    /// One pass of fetch, filter, render and install.
    pub async fn tick(&self) -> ConfdResult<InstallOutcome> {
        let body = self.source.fetch().await?;
        let services = parse_endpoints(&body)?;
        metrics::record_services(services.len());

        let extra = RunMetadata::now();
        let renderer = self.renderer.clone();
        let candidate = tokio::task::spawn_blocking(move || renderer.render(&services, &extra))
            .await
            .map_err(|e| ConfdError::Render(format!("Render task failed: {}", e)))??;

        self.installer.install(&candidate).await
    }

    /// Run one tick with logging and metrics, inside its own span.
    pub async fn run_once(&self, tick: u64) -> ConfdResult<InstallOutcome> {
        let span = tracing::info_span!("reconcile", tick);
        async {
            let started = Instant::now();
            tracing::info!(at = %chrono::Local::now(), "Run started");

            let result = self.tick().await;
            let elapsed = started.elapsed();

            match &result {
                Ok(outcome) => {
                    metrics::record_tick(outcome.as_str(), elapsed);
                    tracing::info!(outcome = outcome.as_str(), elapsed_ms = elapsed.as_millis() as u64, "Run finished");
                }
                Err(e) => {
                    metrics::record_tick(e.kind(), elapsed);
                    log_failure(e);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Reconcile forever until shutdown is signalled.
    ///
    /// A tick in progress always completes; shutdown is only observed while
    /// sleeping between ticks.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.delay.delay(0).as_secs(),
            backoff = self.delay.is_backoff_enabled(),
            destination = ?self.installer.destination(),
            "Reconciler starting"
        );

        let mut tick = 0u64;
        let mut failures = 0u32;

        loop {
            tick += 1;
            failures = match self.run_once(tick).await {
                Ok(_) => 0,
                Err(_) => failures.saturating_add(1),
            };
            metrics::record_consecutive_failures(failures);

            let wait = self.delay.delay(failures);
            tracing::debug!(wait_ms = wait.as_millis() as u64, failures, "Sleeping until next run");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

fn log_failure(err: &ConfdError) {
    match err {
        ConfdError::Reload(_) => {
            tracing::error!(kind = err.kind(), error = %err, "New config installed but haproxy reload failed");
        }
        ConfdError::Validation { path, .. } => {
            tracing::error!(kind = err.kind(), scratch = ?path, error = %err, "Candidate config rejected, keeping current config");
        }
        _ => {
            tracing::error!(kind = err.kind(), error = %err, "Execution failed");
        }
    }
}
