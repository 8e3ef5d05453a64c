//! haproxy-confd
//!
//! Watches annotated endpoints on the cluster API and keeps haproxy.cfg in
//! sync with them.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────────┐   JSON   ┌──────────┐ ServiceMap ┌──────────┐ bytes ┌────────────┐
//!   │ API server │ ───────▶ │ discovery│ ─────────▶ │  render  │ ────▶ │  install   │
//!   │ /api/v1/   │          │ client + │            │ *.conf   │       │ check, diff│
//!   │ endpoints  │          │ filter   │            │ *.tmpl   │       │ swap,reload│
//!   └────────────┘          └──────────┘            └──────────┘       └────────────┘
//!                                  ▲                                         │
//!                                  └──────── reconcile (every interval) ─────┘
//! ```
//!
//! Settings come from command line flags, or from environment variables when
//! no flags are given.

use std::net::SocketAddr;

use anyhow::Context;

use haproxy_confd::config::load_settings;
use haproxy_confd::lifecycle::{signals, Shutdown};
use haproxy_confd::observability::{logging, metrics};
use haproxy_confd::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings().context("Failed to load settings")?;

    logging::init_logging(&settings.log_level);

    tracing::info!("haproxy-confd v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        api_servers = ?settings.api.servers,
        failover = settings.api.failover,
        interval_secs = settings.interval_secs,
        template_dir = ?settings.render.template_dir,
        destination = ?settings.install.destination,
        "Configuration loaded"
    );

    if let Some(addr) = &settings.metrics_address {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid metrics address {}", addr))?;
        metrics::init_metrics(addr).context("Failed to start metrics endpoint")?;
    }

    let reconciler = Reconciler::from_settings(&settings)?;

    if settings.once {
        reconciler.run_once(1).await?;
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    let signal_task = tokio::spawn(async move {
        match signals::wait_for_termination().await {
            Ok(signal) => {
                tracing::info!(signal, "Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => {
                // Keep reconciling; only an external kill stops us now.
                tracing::error!(error = %e, "Failed to listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        }
    });

    reconciler.run(shutdown_rx).await;
    signal_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
