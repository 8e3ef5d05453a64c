//! Reconcile subsystem.
//!
//! # Data Flow
//! ```text
//! every interval:
//!     discovery (fetch + filter) → render → install
//!     any error → logged, tick abandoned, nothing installed
//!     sleep (fixed interval or backoff) → repeat
//! ```
//!
//! # Design Decisions
//! - One tick at a time; ticks never overlap
//! - No terminal state except shutdown
//! - Each tick runs in its own tracing span

pub mod driver;

pub use driver::Reconciler;
