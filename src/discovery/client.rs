//! Cluster API client.
//!
//! # Responsibilities
//! - Check TLS material before any network call
//! - Build a per-tick HTTP client (CA, client identity, proxy bypass)
//! - Fetch `/api/v1/endpoints` from the configured API servers

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Certificate, Client, Identity};

use crate::config::{ApiSettings, CaSource};
use crate::error::{ConfdError, ConfdResult};

/// Path of the endpoints listing relative to an API server base URL.
pub const ENDPOINTS_PATH: &str = "/api/v1/endpoints";

/// Source of the raw endpoint listing.
pub trait EndpointSource: Send + Sync {
    /// Fetch the raw JSON body of the endpoint listing.
    fn fetch(&self) -> impl Future<Output = ConfdResult<Vec<u8>>> + Send;
}

/// Fetches endpoints over HTTP(S) from one or more API servers.
#[derive(Debug, Clone)]
pub struct ApiClient {
    settings: ApiSettings,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Self {
        Self { settings }
    }

    /// Build the HTTP client for one tick.
    ///
    /// Fails with a configuration error when certificate, key or CA files are
    /// missing or unreadable, before anything touches the network.
    pub async fn build_client(&self) -> ConfdResult<Client> {
        let tls = &self.settings.tls;
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .user_agent(concat!("haproxy-confd/", env!("CARGO_PKG_VERSION")));

        if self.settings.ignore_proxy {
            builder = builder.no_proxy();
        }

        match &tls.ca {
            CaSource::SystemRoots => {}
            CaSource::File(path) => {
                let pem = read_pem(path, "CA").await?;
                let cert = Certificate::from_pem(&pem).map_err(|e| {
                    ConfdError::Config(format!("Invalid CA certificate {:?}: {}", path, e))
                })?;
                builder = builder.add_root_certificate(cert);
            }
            CaSource::Insecure => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        match (&tls.client_cert, &tls.client_key) {
            (Some(cert_path), Some(key_path)) => {
                let mut pem = read_pem(cert_path, "cert").await?;
                let key = read_pem(key_path, "key").await?;
                pem.push(b'\n');
                pem.extend_from_slice(&key);
                let identity = Identity::from_pem(&pem).map_err(|e| {
                    ConfdError::Config(format!(
                        "Invalid client identity {:?}/{:?}: {}",
                        cert_path, key_path, e
                    ))
                })?;
                builder = builder.identity(identity);
            }
            (Some(cert_path), None) => {
                return Err(ConfdError::Config(format!(
                    "Client cert {:?} given without a key file",
                    cert_path
                )));
            }
            (None, Some(key_path)) => {
                return Err(ConfdError::Config(format!(
                    "Client key {:?} given without a cert file",
                    key_path
                )));
            }
            (None, None) => {}
        }

        builder
            .build()
            .map_err(|e| ConfdError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    /// GET the endpoint listing from a single API server.
    pub async fn fetch_from(&self, client: &Client, server: &str) -> ConfdResult<Vec<u8>> {
        let url = endpoints_url(server);
        tracing::info!(
            api_server = %server,
            client_cert = self.settings.tls.client_cert.is_some(),
            verify = self.settings.tls.ca != CaSource::Insecure,
            "Getting endpoints from API"
        );

        let response = client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ConfdError::Fetch(format!("Failed to load endpoints from {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConfdError::Fetch(format!(
                "API {} returned {}: {}",
                server,
                status,
                body.trim()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ConfdError::Fetch(format!("Failed to read response from {}: {}", url, e)))?;

        tracing::info!(api_server = %server, status = %status, bytes = body.len(), "Received endpoints");
        Ok(body.to_vec())
    }
}

impl EndpointSource for ApiClient {
    async fn fetch(&self) -> ConfdResult<Vec<u8>> {
        let client = self.build_client().await?;

        let Some(primary) = self.settings.servers.first() else {
            return Err(ConfdError::Config("No API servers configured".to_string()));
        };

        if !self.settings.failover {
            return self.fetch_from(&client, primary).await;
        }

        let mut failures = Vec::new();
        for (i, server) in self.settings.servers.iter().enumerate() {
            match self.fetch_from(&client, server).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(server_idx = i, api_server = %server, error = %e, "API server failed, trying next");
                    failures.push(e.to_string());
                }
            }
        }
        Err(ConfdError::Fetch(format!(
            "All API servers failed: {}",
            failures.join("; ")
        )))
    }
}

/// Join an API server base URL with the endpoints path.
pub fn endpoints_url(server: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), ENDPOINTS_PATH)
}

async fn read_pem(path: &Path, what: &str) -> ConfdResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ConfdError::Config(format!("Specified {} file {:?} does not exist", what, path))
        } else {
            ConfdError::Config(format!("Failed to read {} file {:?}: {}", what, path, e))
        }
    })
}
