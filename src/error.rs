//! Error definitions shared by every reconcile stage.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can end a reconcile tick.
///
/// Every variant is recoverable at the driver level: the tick is abandoned and
/// the next one starts after the configured interval.
#[derive(Debug, Error)]
pub enum ConfdError {
    /// Invalid settings or missing certificate/key/CA files.
    #[error("Configuration error: {0}")]
    Config(String),

    /// API server unreachable or returned a non-success status.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Response body or an annotated endpoint record could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Fragment directory could not be read or a template failed to render.
    #[error("Render error: {0}")]
    Render(String),

    /// The syntax check rejected the candidate config.
    #[error("Syntax check of {path:?} failed: {detail}")]
    Validation { path: PathBuf, detail: String },

    /// Writing, fingerprinting or moving the candidate config failed.
    #[error("Install error: {0}")]
    Install(String),

    /// The reload command failed after the new config was installed.
    #[error("Reload failed: {0}")]
    Reload(String),
}

impl ConfdError {
    /// Short label used for metrics and structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfdError::Config(_) => "config",
            ConfdError::Fetch(_) => "fetch",
            ConfdError::Parse(_) => "parse",
            ConfdError::Render(_) => "render",
            ConfdError::Validation { .. } => "validation",
            ConfdError::Install(_) => "install",
            ConfdError::Reload(_) => "reload",
        }
    }
}

/// Result type for reconcile operations.
pub type ConfdResult<T> = Result<T, ConfdError>;
