// Enrichment proxy client: a single POST/response exchange per call against
// the backend proxy, which hides the text-generation provider behind it.

use async_trait::async_trait;

use crate::protocol::{DescribeRequest, DescribeResponse, TransportError};

// ---------------------------------------------------------------------------
// Base address resolution
// ---------------------------------------------------------------------------

/// How the proxy base address is resolved, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// The client is served from the same origin as the proxy; requests go
    /// to a relative path the surrounding deployment resolves.
    CoHosted,
    /// Local development: the proxy listens on the loopback interface.
    Loopback,
}

/// Resolve the proxy base address for a routing mode. Called once at client
/// construction, never per call.
pub fn resolve_base(mode: RouteMode) -> &'static str {
    match mode {
        RouteMode::CoHosted => "/api",
        RouteMode::Loopback => "http://localhost:8080/api",
    }
}

// ---------------------------------------------------------------------------
// EnrichmentSource trait
// ---------------------------------------------------------------------------

/// The coordinator's view of enrichment: give it a subject, get back text.
/// The seam exists so the coordinator can be driven by scripted sources in
/// tests without any sockets.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn request_enrichment(&self, subject: &str) -> Result<String, TransportError>;
}

// ---------------------------------------------------------------------------
// ProxyClient
// ---------------------------------------------------------------------------

/// HTTP client for the enrichment proxy endpoint.
pub struct ProxyClient {
    http: reqwest::Client,
    base: String,
}

impl ProxyClient {
    /// Create a client whose base address is resolved from `mode`.
    pub fn new(http: reqwest::Client, mode: RouteMode) -> Self {
        Self::with_base(http, resolve_base(mode))
    }

    /// Create a client against an explicit base address. Used by tests and
    /// by deployments where the proxy lives somewhere nonstandard.
    pub fn with_base(http: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

#[async_trait]
impl EnrichmentSource for ProxyClient {
    /// Send the subject to the proxy and return the generated text. One
    /// request/response exchange; no batching, no retries.
    async fn request_enrichment(&self, subject: &str) -> Result<String, TransportError> {
        let response = self
            .http
            .post(&self.base)
            .json(&DescribeRequest {
                subject: subject.to_string(),
            })
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::network(format!(
                "proxy returned status {status}"
            )));
        }

        let body: DescribeResponse = response
            .json()
            .await
            .map_err(|e| TransportError::decode(e.to_string()))?;

        Ok(body.response)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
