//! Settings validation.
//!
//! Semantic checks that run once before the loop starts. All problems are
//! reported together rather than stopping at the first.
//!
//! Certificate, key and CA file existence is not checked here: those files
//! may appear later and are checked at the start of every fetch instead.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::Settings;
use crate::observability::logging::log_filter;

/// A single semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no API servers configured")]
    NoApiServers,

    #[error("API server {url:?} is not a valid http(s) URL: {reason}")]
    InvalidApiServer { url: String, reason: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{0} command is empty")]
    EmptyCommand(&'static str),

    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Validate resolved settings.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.api.servers.is_empty() {
        errors.push(ValidationError::NoApiServers);
    }
    for server in &settings.api.servers {
        match Url::parse(server) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::InvalidApiServer {
                url: server.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidApiServer {
                url: server.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if settings.interval_secs == 0 {
        errors.push(ValidationError::ZeroDuration("interval"));
    }
    if settings.api.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("fetch timeout"));
    }
    if settings.install.command_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("command timeout"));
    }

    if settings.install.check_cmd.trim().is_empty() {
        errors.push(ValidationError::EmptyCommand("syntax check"));
    }
    if settings.install.reload_cmd.trim().is_empty() {
        errors.push(ValidationError::EmptyCommand("reload"));
    }

    if log_filter(&settings.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(settings.log_level.clone()));
    }

    if let Some(addr) = &settings.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
