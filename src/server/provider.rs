// Text-generation providers behind a single runtime-selected trait.
//
// The proxy never exposes which provider answered; both speak plain HTTP
// (non-streaming) and return one text block. Payloads are picked apart with
// small Value helpers so a provider schema drift shows up as a parse failure
// rather than a deserialization panic.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, ConfigError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Provider-call failures. These stay inside the service; the HTTP handler
/// maps them to an opaque error for the caller.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("provider request failed: {reason}")]
    Request { reason: String },

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("provider payload not in expected shape: {reason}")]
    Payload { reason: String },
}

// ---------------------------------------------------------------------------
// TextGenerator trait
// ---------------------------------------------------------------------------

/// An opaque `generate(input) -> text` capability. The prompt context (system
/// prompt, model, token budget) is fixed at construction from config; only
/// the per-request input varies.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, input: &str) -> Result<String, GenerateError>;
}

impl std::fmt::Debug for dyn TextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TextGenerator")
    }
}

/// Build the configured provider. Missing credentials are a startup
/// configuration error, not a per-request failure.
pub fn from_config(
    http: reqwest::Client,
    config: &Config,
) -> Result<Box<dyn TextGenerator>, ConfigError> {
    let p = &config.provider;
    match p.kind.as_str() {
        "anthropic" => {
            let api_key = config.credentials.anthropic_api_key.clone().ok_or_else(|| {
                ConfigError::ValidationError {
                    field: "credentials.anthropic_api_key".into(),
                    message: "required when provider.kind = \"anthropic\"".into(),
                }
            })?;
            Ok(Box::new(AnthropicGenerator::new(
                http,
                api_key,
                p.model.clone(),
                p.system_prompt.clone(),
                p.max_tokens,
            )))
        }
        "gemini" => {
            let api_key = config.credentials.google_api_key.clone().ok_or_else(|| {
                ConfigError::ValidationError {
                    field: "credentials.google_api_key".into(),
                    message: "required when provider.kind = \"gemini\"".into(),
                }
            })?;
            Ok(Box::new(GeminiGenerator::new(
                http,
                api_key,
                p.model.clone(),
                p.system_prompt.clone(),
            )))
        }
        other => Err(ConfigError::ValidationError {
            field: "provider.kind".into(),
            message: format!("unknown provider `{other}` (expected `anthropic` or `gemini`)"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

/// Anthropic Messages API client, single non-streaming exchange per call.
pub struct AnthropicGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    endpoint: String,
}

impl AnthropicGenerator {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: String,
        system_prompt: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            http,
            api_key,
            model,
            system_prompt,
            max_tokens,
            endpoint: ANTHROPIC_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerateError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": self.system_prompt,
            "messages": [{ "role": "user", "content": input }]
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerateError::Status {
                status: status.as_u16(),
            });
        }

        let payload: Value = response.json().await.map_err(|e| GenerateError::Payload {
            reason: e.to_string(),
        })?;

        debug!(model = %self.model, "anthropic response received");
        parse_anthropic_text(&payload).ok_or_else(|| GenerateError::Payload {
            reason: "no text block in `content`".into(),
        })
    }
}

/// Extract the first text block from an Anthropic messages response.
///
/// Expected shape: `{ "content": [ { "type": "text", "text": "..." } ] }`
pub(crate) fn parse_anthropic_text(payload: &Value) -> Option<String> {
    payload
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|block| block.get("text")?.as_str().map(|s| s.to_string()))
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Google Generative Language client (`models/{model}:generateContent`).
pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    system_prompt: String,
    base: String,
}

impl GeminiGenerator {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: String,
        system_prompt: String,
    ) -> Self {
        Self {
            http,
            api_key,
            model,
            system_prompt,
            base: GEMINI_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerateError> {
        let url = format!("{}/{}:generateContent", self.base, self.model);
        let body = serde_json::json!({
            "system_instruction": { "parts": [{ "text": self.system_prompt }] },
            "contents": [{ "parts": [{ "text": input }] }]
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerateError::Status {
                status: status.as_u16(),
            });
        }

        let payload: Value = response.json().await.map_err(|e| GenerateError::Payload {
            reason: e.to_string(),
        })?;

        debug!(model = %self.model, "gemini response received");
        parse_gemini_text(&payload).ok_or_else(|| GenerateError::Payload {
            reason: "no text part in first candidate".into(),
        })
    }
}

/// Extract the text of the first candidate from a generateContent response.
///
/// Expected shape:
/// `{ "candidates": [ { "content": { "parts": [ { "text": "..." } ] } } ] }`
pub(crate) fn parse_gemini_text(payload: &Value) -> Option<String> {
    payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text")?.as_str().map(|s| s.to_string()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::inline_config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // -- Payload parsing helpers --

    #[test]
    fn parse_anthropic_single_text_block() {
        let payload = serde_json::json!({
            "id": "msg_123",
            "role": "assistant",
            "content": [{ "type": "text", "text": "A country in western Europe." }],
            "usage": { "input_tokens": 12, "output_tokens": 9 }
        });
        assert_eq!(
            parse_anthropic_text(&payload).as_deref(),
            Some("A country in western Europe.")
        );
    }

    #[test]
    fn parse_anthropic_skips_non_text_blocks() {
        let payload = serde_json::json!({
            "content": [
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "answer" }
            ]
        });
        assert_eq!(parse_anthropic_text(&payload).as_deref(), Some("answer"));
    }

    #[test]
    fn parse_anthropic_empty_content_is_none() {
        let payload = serde_json::json!({ "content": [] });
        assert_eq!(parse_anthropic_text(&payload), None);
    }

    #[test]
    fn parse_anthropic_missing_content_is_none() {
        let payload = serde_json::json!({ "id": "msg_1" });
        assert_eq!(parse_anthropic_text(&payload), None);
    }

    #[test]
    fn parse_gemini_first_candidate_text() {
        let payload = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Oslo is the capital." }], "role": "model" },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            parse_gemini_text(&payload).as_deref(),
            Some("Oslo is the capital.")
        );
    }

    #[test]
    fn parse_gemini_no_candidates_is_none() {
        let payload = serde_json::json!({ "candidates": [] });
        assert_eq!(parse_gemini_text(&payload), None);
    }

    #[test]
    fn parse_gemini_missing_parts_is_none() {
        let payload = serde_json::json!({
            "candidates": [{ "content": { "role": "model" } }]
        });
        assert_eq!(parse_gemini_text(&payload), None);
    }

    // -- Provider selection --

    #[test]
    fn from_config_builds_anthropic_when_key_present() {
        let mut config = inline_config();
        config.provider.kind = "anthropic".into();
        config.credentials.anthropic_api_key = Some("sk-ant-test".into());

        assert!(from_config(reqwest::Client::new(), &config).is_ok());
    }

    #[test]
    fn from_config_rejects_anthropic_without_key() {
        let mut config = inline_config();
        config.provider.kind = "anthropic".into();
        config.credentials.anthropic_api_key = None;

        let err = from_config(reqwest::Client::new(), &config).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "credentials.anthropic_api_key");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn from_config_rejects_gemini_without_key() {
        let mut config = inline_config();
        config.provider.kind = "gemini".into();
        config.credentials.google_api_key = None;

        assert!(from_config(reqwest::Client::new(), &config).is_err());
    }

    #[test]
    fn from_config_rejects_unknown_kind() {
        let mut config = inline_config();
        config.provider.kind = "mystery".into();

        let err = from_config(reqwest::Client::new(), &config).unwrap_err();
        match err {
            ConfigError::ValidationError { field, message } => {
                assert_eq!(field, "provider.kind");
                assert!(message.contains("mystery"));
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    // -- HTTP round trips against a canned endpoint --

    async fn serve_once(body: String) -> (std::net::SocketAddr, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (req_tx, req_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16384];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = req_tx.send(String::from_utf8_lossy(&buf[..n]).to_string());

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });

        (addr, req_rx)
    }

    #[tokio::test]
    async fn anthropic_generate_sends_headers_and_returns_text() {
        let body = serde_json::json!({
            "content": [{ "type": "text", "text": "one line about France" }]
        })
        .to_string();
        let (addr, req_rx) = serve_once(body).await;

        let generator = AnthropicGenerator::new(
            reqwest::Client::new(),
            "sk-ant-test".into(),
            "claude-sonnet-4-5-20250929".into(),
            "Describe the country in one line.".into(),
            256,
        )
        .with_endpoint(format!("http://{addr}/v1/messages"));

        let text = generator.generate("France").await.unwrap();
        assert_eq!(text, "one line about France");

        let raw = req_rx.await.unwrap();
        assert!(raw.contains("x-api-key: sk-ant-test"));
        assert!(raw.contains("anthropic-version: 2023-06-01"));
        assert!(raw.contains(r#""content":"France""#));
        assert!(raw.contains("Describe the country in one line."));
    }

    #[tokio::test]
    async fn gemini_generate_builds_model_url_and_returns_text() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "one line about Spain" }] } }]
        })
        .to_string();
        let (addr, req_rx) = serve_once(body).await;

        let generator = GeminiGenerator::new(
            reqwest::Client::new(),
            "g-key".into(),
            "gemini-2.0-flash-lite".into(),
            "Describe the country in one line.".into(),
        )
        .with_base(format!("http://{addr}/v1beta/models"));

        let text = generator.generate("Spain").await.unwrap();
        assert_eq!(text, "one line about Spain");

        let raw = req_rx.await.unwrap();
        assert!(raw.contains("POST /v1beta/models/gemini-2.0-flash-lite:generateContent?key=g-key"));
        assert!(raw.contains(r#""text":"Spain""#));
    }

    #[tokio::test]
    async fn provider_error_status_is_status_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"error":{"message":"invalid api key"}}"#;
            let response = format!(
                "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let generator = AnthropicGenerator::new(
            reqwest::Client::new(),
            "bad-key".into(),
            "model".into(),
            "system".into(),
            64,
        )
        .with_endpoint(format!("http://{addr}/v1/messages"));

        let err = generator.generate("France").await.unwrap_err();
        match err {
            GenerateError::Status { status } => assert_eq!(status, 401),
            other => panic!("expected Status, got: {other}"),
        }
    }
}
