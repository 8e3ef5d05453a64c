//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! tick failed → consecutive failure count + 1 → backoff.rs → sleep
//! tick ok     → count reset → fixed interval → sleep
//! ```
//!
//! # Design Decisions
//! - The reconciler never gives up; there is no retry limit
//! - Backoff is opt-in; by default every tick waits the same interval
//! - Every external call (API, syntax check, reload) has its own timeout

pub mod backoff;

pub use backoff::RetryDelay;
