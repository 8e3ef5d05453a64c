//! Reconcile metrics.
//!
//! # Metrics
//! - `confd_ticks_total` (counter): ticks by outcome (`unchanged`, `installed`
//!   or the error kind)
//! - `confd_tick_duration_seconds` (histogram): wall time per tick
//! - `confd_services` (gauge): services in the last parsed map
//! - `confd_consecutive_failures` (gauge): failed ticks since the last success
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_tick(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("confd_ticks_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("confd_tick_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_services(count: usize) {
    ::metrics::gauge!("confd_services").set(count as f64);
}

pub fn record_consecutive_failures(count: u32) {
    ::metrics::gauge!("confd_consecutive_failures").set(f64::from(count));
}
