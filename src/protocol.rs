// Shared wire records, coordinator event types, and the client-side error
// taxonomy. The wire structs are used by both the CLI (through ProxyClient)
// and the backend service, so they live here rather than in either module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// Request body for the enrichment proxy: the thing to describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub subject: String,
}

/// Response body from the enrichment proxy: the generated text, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub response: String,
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the HTTP-facing client components (catalog fetch and
/// proxy calls). Callers get no local recovery; there are no retries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The host was unreachable, the request timed out, or the endpoint
    /// answered with a non-success status.
    #[error("network error: {reason}")]
    Network { reason: String },

    /// The payload could not be parsed into the expected shape, including
    /// well-formed JSON that is missing a required field.
    #[error("decode error: {reason}")]
    Decode { reason: String },
}

impl TransportError {
    pub fn network(reason: impl Into<String>) -> Self {
        TransportError::Network {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        TransportError::Decode {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator events and visible state
// ---------------------------------------------------------------------------

/// Lifecycle of the enrichment text for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichStatus {
    /// No selection; nothing requested.
    Idle,
    /// A request for the current selection is outstanding.
    Pending,
    /// The current selection's text has arrived.
    Resolved,
    /// The current selection's request failed. The status is the only error
    /// indicator; provider detail is never exposed here.
    Failed,
}

/// The only coordinator state visible to a display layer. The generation a
/// result belongs to is internal to the coordinator and never leaves it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub key: String,
    pub text: String,
    pub status: EnrichStatus,
}

/// Settlement of an enrichment request, sent from the spawned request task
/// back to the event loop. Carries the generation captured when the request
/// was issued so the coordinator can fence out stale settlements.
#[derive(Debug)]
pub enum EnrichEvent {
    Settled {
        generation: u64,
        outcome: Result<String, TransportError>,
    },
}
