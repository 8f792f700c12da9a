// Enrichment proxy service: a stateless HTTP front for the configured
// text-generation provider. The caller never learns which provider answered,
// nor why a generation failed.

pub mod provider;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::protocol::{DescribeRequest, DescribeResponse};
use provider::TextGenerator;

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

/// Shared handler state: just the provider, fixed at startup. Requests are
/// otherwise independent of each other.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api", post(describe))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api
///
/// Forwards the subject verbatim to the provider and returns its text
/// unchanged. On provider failure the caller gets an opaque 502; the detail
/// goes to the log only.
async fn describe(
    State(state): State<AppState>,
    Json(request): Json<DescribeRequest>,
) -> Result<Json<DescribeResponse>, ServiceError> {
    info!(subject = %request.subject, "describe request");

    match state.generator.generate(&request.subject).await {
        Ok(text) => Ok(Json(DescribeResponse { response: text })),
        Err(e) => {
            warn!(subject = %request.subject, error = %e, "provider call failed");
            Err(ServiceError)
        }
    }
}

/// Health check response for monitoring.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    module: &'static str,
    version: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        module: "gazetteer-proxy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Opaque backend failure: the upstream provider could not produce text.
/// Carries nothing; provider-internal detail must not reach the caller.
#[derive(Debug)]
pub struct ServiceError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: "text generation failed",
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use provider::GenerateError;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Scripted provider: records every input it sees and returns a fixed
    /// outcome.
    struct ScriptedGenerator {
        seen: Mutex<Vec<String>>,
        outcome: Result<String, String>,
    }

    impl ScriptedGenerator {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                outcome: Ok(text.to_string()),
            })
        }

        fn failing(detail: &str) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                outcome: Err(detail.to_string()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, input: &str) -> Result<String, GenerateError> {
            self.seen.lock().unwrap().push(input.to_string());
            self.outcome
                .clone()
                .map_err(|reason| GenerateError::Request { reason })
        }
    }

    fn describe_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn subject_passes_through_to_provider_verbatim() {
        let generator = ScriptedGenerator::ok("A country in western Europe.");
        let app = build_router(AppState::new(generator.clone()));

        let response = app
            .oneshot(describe_request(r#"{"subject":"France"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"response":"A country in western Europe."}"#);

        // The provider received the literal input, unaltered.
        assert_eq!(generator.seen.lock().unwrap().as_slice(), ["France"]);
    }

    #[tokio::test]
    async fn provider_failure_yields_opaque_502() {
        let generator = ScriptedGenerator::failing("quota exceeded for key sk-ant-123");
        let app = build_router(AppState::new(generator));

        let response = app
            .oneshot(describe_request(r#"{"subject":"France"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"error":"text generation failed"}"#);
        // Provider detail must never leak to the caller.
        assert!(!body.contains("quota"));
        assert!(!body.contains("sk-ant"));
    }

    #[tokio::test]
    async fn missing_subject_field_is_client_error() {
        let generator = ScriptedGenerator::ok("unused");
        let app = build_router(AppState::new(generator.clone()));

        let response = app
            .oneshot(describe_request(r#"{"name":"France"}"#))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        // The provider was never consulted.
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn requests_are_handled_independently() {
        let generator = ScriptedGenerator::ok("text");
        let app = build_router(AppState::new(generator.clone()));

        for subject in ["France", "Spain", "Norway"] {
            let response = app
                .clone()
                .oneshot(describe_request(&format!(r#"{{"subject":"{subject}"}}"#)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(
            generator.seen.lock().unwrap().as_slice(),
            ["France", "Spain", "Norway"]
        );
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_router(AppState::new(ScriptedGenerator::ok("unused")));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains(r#""status":"ok""#));
        assert!(body.contains("gazetteer-proxy"));
    }
}
