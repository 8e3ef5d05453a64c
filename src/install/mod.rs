//! Config installation subsystem.
//!
//! # Data Flow
//! ```text
//! candidate bytes
//!     → scratch file (haproxy.cfg.XXXXXXXX)
//!     → syntax check command <scratch>      fail → Validation error, scratch kept
//!     → fingerprint.rs (destination vs scratch)
//!         equal   → remove scratch, Unchanged
//!         differ  → rename over destination → reload command
//! ```

pub mod command;
pub mod fingerprint;
pub mod installer;

pub use command::{CommandLine, CommandOutput, CommandRunner, SystemRunner};
pub use installer::{InstallOutcome, Installer};
