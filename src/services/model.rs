//! Text-model service: the `TextModel` seam and the Gemini REST client.
//!
//! The pipeline only ever needs "prompt in, text out" — everything else
//! (retry, parsing, model fallback) lives in the planner. Keeping the
//! trait that narrow makes a test fake a ten-line struct and keeps wire
//! concerns out of pipeline logic.
//!
//! Errors are typed so the planner can tell a retryable condition (rate
//! limit, timeout) from one that means "advance to the next model"
//! (unavailable) or "stop entirely" (auth).

use crate::error::DeckError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the model service key.
pub const MODEL_KEY_VAR: &str = "GEMINI_API_KEY";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Outcome of a single model call, before any pipeline-level retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// The model id is unknown to the service (HTTP 404).
    #[error("model '{0}' not found")]
    Unavailable(String),

    /// The service rejected the call with HTTP 429.
    #[error("model service rate limited")]
    RateLimited,

    /// Key rejected (HTTP 401/403); retrying cannot help.
    #[error("model service authentication failed: {0}")]
    Auth(String),

    /// The call exceeded the per-call timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response decoded but carried no text candidates.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Network failure or unexpected HTTP status.
    #[error("model transport error: {0}")]
    Transport(String),
}

/// A text-generation backend.
///
/// One method, object-safe, `BoxFuture`-returning so it can live behind
/// `Arc<dyn TextModel>` inside [`crate::config::GenerationConfig`].
pub trait TextModel: Send + Sync {
    /// Generate a completion for `prompt` using `model_id`.
    fn generate<'a>(
        &'a self,
        model_id: &'a str,
        prompt: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, ModelError>>;
}

// ── Wire shapes ──────────────────────────────────────────────────────────
// Request/response envelope of the `generateContent` endpoint.

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

// ── Client ───────────────────────────────────────────────────────────────

/// Gemini `generateContent` client.
#[derive(Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Build a client from an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Build a client from `GEMINI_API_KEY`, failing with a typed
    /// credential error when it is absent or empty.
    pub fn from_env() -> Result<Self, DeckError> {
        match std::env::var(MODEL_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(DeckError::MissingCredential {
                service: "model",
                hint: format!("Set {MODEL_KEY_VAR} to your Google AI Studio key."),
            }),
        }
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, ModelError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, model_id, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        secs: timeout.as_secs(),
                    }
                } else {
                    ModelError::Transport(e.to_string())
                }
            })?;

        match response.status().as_u16() {
            200 => {}
            401 | 403 => {
                return Err(ModelError::Auth(format!("HTTP {}", response.status())));
            }
            404 => return Err(ModelError::Unavailable(model_id.to_string())),
            429 => return Err(ModelError::RateLimited),
            status => {
                return Err(ModelError::Transport(format!("HTTP {status}")));
            }
        }

        let decoded: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(format!("response decode: {e}")))?;

        let text: String = decoded
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        debug!(model = model_id, chars = text.len(), "model response received");
        Ok(text)
    }
}

impl TextModel for GeminiClient {
    fn generate<'a>(
        &'a self,
        model_id: &'a str,
        prompt: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, ModelError>> {
        Box::pin(self.call(model_id, prompt, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_wire_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
        };
        let json = serde_json::to_string(&body).expect("serialise");
        assert_eq!(json, r#"{"contents":[{"parts":[{"text":"hello"}]}]}"#);
    }

    #[test]
    fn response_decodes_and_joins_parts() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}}
            ]
        }"#;
        let decoded: GenerateResponse = serde_json::from_str(raw).expect("decode");
        let text: String = decoded.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "Hello, world");
    }

    #[test]
    fn response_without_candidates_decodes_to_empty() {
        let decoded: GenerateResponse = serde_json::from_str("{}").expect("decode");
        assert!(decoded.candidates.is_empty());
    }

    #[test]
    fn from_env_requires_key() {
        // Serialise access to the process env with a local lock.
        static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        let saved = std::env::var(MODEL_KEY_VAR).ok();
        std::env::remove_var(MODEL_KEY_VAR);
        let err = GeminiClient::from_env().unwrap_err();
        assert!(matches!(
            err,
            DeckError::MissingCredential {
                service: "model",
                ..
            }
        ));
        if let Some(key) = saved {
            std::env::set_var(MODEL_KEY_VAR, key);
        }
    }
}
