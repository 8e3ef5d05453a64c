//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load settings → Validate → Init logging/metrics → Build components → Loop
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → loop exits after the current tick
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
