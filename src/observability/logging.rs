//! Structured logging.
//!
//! The configured level applies to this crate; `RUST_LOG`, when set, takes
//! precedence so dependencies can be traced too.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FALLBACK_DIRECTIVE: &str = "haproxy_confd=info,warn";

/// Turn a configured level into a filter directive.
///
/// A bare level such as `DEBUG` or `warning` is scoped to this crate, anything
/// else is taken as a full directive.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    let scoped = match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => level.as_str(),
        "warning" => "warn",
        "critical" | "fatal" => "error",
        _ => return level,
    };
    format!("haproxy_confd={},warn", scoped)
}

/// Parse the configured level into a filter.
pub fn log_filter(level: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    EnvFilter::try_new(filter_directive(level))
}

/// Install the tracing subscriber for the process.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| log_filter(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
