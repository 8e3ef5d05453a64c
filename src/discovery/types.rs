//! Endpoint record types and the derived service map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation naming the exposed domain.
pub const DOMAIN_ANNOTATION: &str = "domain";
/// Annotation naming the protocol tag.
pub const PROTO_ANNOTATION: &str = "proto";

/// Body of `GET /api/v1/endpoints`.
///
/// Items stay untyped until their annotations are inspected, so records that
/// do not opt in are never rejected for their shape.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsList {
    pub items: Vec<serde_json::Value>,
}

/// An endpoint record that carries both required annotations.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointRecord {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A group of addresses sharing the same ports.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSubset {
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointAddress {
    pub ip: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointPort {
    pub port: u16,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// A service exposed under one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    /// Protocol tag; `http` and `https` get shared frontends in templates.
    pub proto: String,
    pub port: u16,
    /// Addresses in discovery order, duplicates kept.
    pub addresses: Vec<String>,
}

impl ServiceEntry {
    /// `ip:port` pairs for logging.
    pub fn endpoints(&self) -> Vec<String> {
        self.addresses
            .iter()
            .map(|ip| format!("{}:{}", ip, self.port))
            .collect()
    }
}

/// Domain → service, rebuilt every tick.
pub type ServiceMap = BTreeMap<String, ServiceEntry>;
