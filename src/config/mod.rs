//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! argv present?
//!     yes → loader.rs Cli (clap) → Settings::from_cli
//!     no  → loader.rs Settings::from_env
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → handed to each component's constructor
//! ```
//!
//! # Design Decisions
//! - Command line and environment are exclusive sources, never merged
//! - Every field has a default except the API server list
//! - File existence for TLS material is checked per fetch, not at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, Cli};
pub use schema::{ApiSettings, CaSource, InstallSettings, RenderSettings, Settings, TlsSettings};
