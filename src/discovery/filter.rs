//! Annotation filtering.
//!
//! # Responsibilities
//! - Skip records without both `domain` and `proto` annotations
//! - Reject annotated records whose subset/port/address structure is unusable
//! - Build the domain-keyed service map
//!
//! # Design Decisions
//! - One malformed annotated record fails the whole tick; no partial map
//! - Later records overwrite earlier ones with the same domain

use serde_json::Value;

use crate::discovery::types::{
    EndpointRecord, EndpointsList, ServiceEntry, ServiceMap, DOMAIN_ANNOTATION, PROTO_ANNOTATION,
};
use crate::error::{ConfdError, ConfdResult};

/// Parse a raw API response body into a service map.
pub fn parse_endpoints(body: &[u8]) -> ConfdResult<ServiceMap> {
    let list: EndpointsList = serde_json::from_slice(body)
        .map_err(|e| ConfdError::Parse(format!("Failed to parse JSON response from API: {}", e)))?;
    build_service_map(&list)
}

/// Build the service map from a decoded endpoint list.
pub fn build_service_map(list: &EndpointsList) -> ConfdResult<ServiceMap> {
    tracing::info!(records = list.items.len(), "Checking annotations of retrieved endpoints");

    let mut services = ServiceMap::new();

    for item in &list.items {
        let name = item
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>");

        let (Some(domain), Some(proto)) = (
            annotation(item, name, DOMAIN_ANNOTATION)?,
            annotation(item, name, PROTO_ANNOTATION)?,
        ) else {
            tracing::debug!(endpoint = %name, "Skipping endpoint, no matching annotations");
            continue;
        };

        let entry = service_entry(item, name, proto)?;
        tracing::info!(
            domain = %domain,
            proto = %entry.proto,
            endpoints = ?entry.endpoints(),
            "Found service"
        );

        if services.insert(domain.to_string(), entry).is_some() {
            tracing::debug!(domain = %domain, endpoint = %name, "Domain seen before, replacing entry");
        }
    }

    Ok(services)
}

/// Look up one annotation. Absent is `None`; present but not a string is an error.
fn annotation<'a>(item: &'a Value, name: &str, key: &str) -> ConfdResult<Option<&'a str>> {
    let Some(value) = item
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(|a| a.get(key))
    else {
        return Ok(None);
    };
    value.as_str().map(Some).ok_or_else(|| {
        ConfdError::Parse(format!(
            "Endpoint {}: annotation {:?} is not a string",
            name, key
        ))
    })
}

fn service_entry(item: &Value, name: &str, proto: &str) -> ConfdResult<ServiceEntry> {
    let record: EndpointRecord = serde_json::from_value(item.clone())
        .map_err(|e| ConfdError::Parse(format!("Failed to parse endpoint {}: {}", name, e)))?;

    let subset = record
        .subsets
        .first()
        .ok_or_else(|| ConfdError::Parse(format!("Endpoint {} has no subsets", name)))?;
    let port = subset
        .ports
        .first()
        .ok_or_else(|| ConfdError::Parse(format!("Endpoint {} has no ports", name)))?;
    if subset.addresses.is_empty() {
        return Err(ConfdError::Parse(format!("Endpoint {} has no addresses", name)));
    }

    Ok(ServiceEntry {
        proto: proto.to_string(),
        port: port.port,
        addresses: subset.addresses.iter().map(|a| a.ip.clone()).collect(),
    })
}
