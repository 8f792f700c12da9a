// Catalog fetching: one page of selectable countries from a remote endpoint.
//
// The wire shape follows the restcountries v3.1 API with a `fields`
// projection (name, flag, flags, capital). Unknown fields are ignored so the
// decoder keeps working as the API grows; missing required fields are a hard
// decode error rather than a partially populated item.

use serde::Deserialize;
use tracing::debug;

use crate::protocol::TransportError;

/// Default catalog endpoint, overridable through `[catalog]` in config.
pub const DEFAULT_ENDPOINT: &str =
    "https://restcountries.com/v3.1/all?fields=name,flag,flags,capital";

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A selectable catalog entry. Produced fresh on every fetch; there is no
/// identity beyond the fetch that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub label: String,
    pub media_ref: String,
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireCountry {
    name: WireName,
    flags: WireFlags,
}

#[derive(Debug, Deserialize)]
struct WireName {
    common: String,
    official: String,
}

#[derive(Debug, Deserialize)]
struct WireFlags {
    png: String,
}

impl From<WireCountry> for CatalogItem {
    fn from(c: WireCountry) -> Self {
        CatalogItem {
            id: c.name.official,
            label: c.name.common,
            media_ref: c.flags.png,
        }
    }
}

// ---------------------------------------------------------------------------
// ListSource
// ---------------------------------------------------------------------------

/// Fetches the ordered item collection from the catalog endpoint.
pub struct ListSource {
    http: reqwest::Client,
    endpoint: String,
}

impl ListSource {
    /// Create a source for the given endpoint. The HTTP client is injected so
    /// the whole process shares one connection pool.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Fetch exactly one page of items, in the order the endpoint returned
    /// them. Paging links in the payload, if any, are not followed; a caller
    /// that needs more than the first page must issue its own requests.
    pub async fn fetch_list(&self) -> Result<Vec<CatalogItem>, TransportError> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::network(format!(
                "catalog endpoint returned status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let wire: Vec<WireCountry> = serde_json::from_slice(&body)
            .map_err(|e| TransportError::decode(e.to_string()))?;

        debug!(count = wire.len(), "catalog page decoded");
        Ok(wire.into_iter().map(CatalogItem::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
