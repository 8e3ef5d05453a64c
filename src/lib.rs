//! haproxy-confd library.
//!
//! Generates an haproxy config from annotated cluster endpoints and installs it
//! only when it changed and passed haproxy's own syntax check.

pub mod config;
pub mod discovery;
pub mod error;
pub mod install;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod render;
pub mod resilience;

pub use config::Settings;
pub use error::{ConfdError, ConfdResult};
pub use reconcile::Reconciler;
