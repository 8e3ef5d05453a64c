//! Endpoint discovery subsystem.
//!
//! # Data Flow
//! ```text
//! client.rs (GET /api/v1/endpoints, first server or ordered failover)
//!     → raw JSON body
//!     → filter.rs (annotation filter, structural checks)
//!     → ServiceMap (domain → proto/port/addresses)
//! ```
//!
//! # Design Decisions
//! - Only records annotated with both `domain` and `proto` are considered
//! - The map is rebuilt from scratch every tick
//! - Proxy bypass is a client setting, the process environment is untouched

pub mod client;
pub mod filter;
pub mod types;

pub use client::{ApiClient, EndpointSource};
pub use filter::parse_endpoints;
pub use types::{ServiceEntry, ServiceMap};
