//! Stock-photo service: the `PhotoSearch` seam and the Pexels client.
//!
//! The trait exposes the two operations the resolver needs — search for
//! candidates, download a chosen one — and nothing else. Candidate
//! filtering (orientation, minimum resolution, tie-breaking) is pipeline
//! policy and stays in [`crate::pipeline::images`], so a fake used in
//! tests exercises the same selection code as production.

use crate::error::DeckError;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the photo service key.
pub const PHOTO_KEY_VAR: &str = "PEXELS_API_KEY";

const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

/// How many candidates to request per search; the resolver picks the
/// first one passing its filter, so a short page is plenty.
const RESULTS_PER_PAGE: u32 = 10;

/// One search hit, in service-returned (relevance) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoCandidate {
    /// Full-resolution source URL.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Photographer credit, when the service provides one.
    pub attribution: Option<String>,
}

/// Outcome of a single photo-service call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PhotoError {
    /// Key rejected (HTTP 401/403).
    #[error("photo service authentication failed: {0}")]
    Auth(String),

    /// The service rejected the call with HTTP 429.
    #[error("photo service rate limited")]
    RateLimited,

    /// The call exceeded the per-call timeout.
    #[error("photo call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Network failure or unexpected HTTP status.
    #[error("photo transport error: {0}")]
    Transport(String),

    /// Downloaded bytes could not be written to disk.
    #[error("failed to store image: {0}")]
    Store(String),
}

/// A stock-photo backend.
pub trait PhotoSearch: Send + Sync {
    /// Search for landscape photos matching `query`, relevance-ordered.
    fn search<'a>(
        &'a self,
        query: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<PhotoCandidate>, PhotoError>>;

    /// Download `url` to `dest`.
    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), PhotoError>>;
}

// ── Wire shapes ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    width: u32,
    height: u32,
    #[serde(default)]
    photographer: Option<String>,
    src: PhotoSrc,
}

#[derive(Deserialize)]
struct PhotoSrc {
    /// Pre-sized large variant; big enough for a slide picture region
    /// without pulling the multi-megabyte original.
    large2x: String,
}

// ── Client ───────────────────────────────────────────────────────────────

/// Pexels search-API client.
pub struct PexelsClient {
    http: reqwest::Client,
    api_key: String,
    search_url: String,
}

impl PexelsClient {
    /// Build a client from an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            search_url: PEXELS_SEARCH_URL.to_string(),
        }
    }

    /// Build a client from `PEXELS_API_KEY`, failing with a typed
    /// credential error when it is absent or empty.
    pub fn from_env() -> Result<Self, DeckError> {
        match std::env::var(PHOTO_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(DeckError::MissingCredential {
                service: "photo",
                hint: format!(
                    "Set {PHOTO_KEY_VAR} to your Pexels key, or disable images."
                ),
            }),
        }
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    fn map_send_error(e: reqwest::Error, timeout: Duration) -> PhotoError {
        if e.is_timeout() {
            PhotoError::Timeout {
                secs: timeout.as_secs(),
            }
        } else {
            PhotoError::Transport(e.to_string())
        }
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), PhotoError> {
        match status.as_u16() {
            200 => Ok(()),
            401 | 403 => Err(PhotoError::Auth(format!("HTTP {status}"))),
            429 => Err(PhotoError::RateLimited),
            s => Err(PhotoError::Transport(format!("HTTP {s}"))),
        }
    }

    async fn search_impl(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<PhotoCandidate>, PhotoError> {
        let response = self
            .http
            .get(&self.search_url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("orientation", "landscape"),
                ("size", "large"),
                ("per_page", &RESULTS_PER_PAGE.to_string()),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        Self::check_status(response.status())?;

        let decoded: SearchResponse = response
            .json()
            .await
            .map_err(|e| PhotoError::Transport(format!("response decode: {e}")))?;

        debug!(query, hits = decoded.photos.len(), "photo search complete");

        Ok(decoded
            .photos
            .into_iter()
            .map(|p| PhotoCandidate {
                url: p.src.large2x,
                width: p.width,
                height: p.height,
                attribution: p.photographer,
            })
            .collect())
    }

    async fn download_impl(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<(), PhotoError> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        Self::check_status(response.status())?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PhotoError::Transport(e.to_string()))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| PhotoError::Store(e.to_string()))?;

        debug!(url, dest = %dest.display(), bytes = bytes.len(), "image downloaded");
        Ok(())
    }
}

impl PhotoSearch for PexelsClient {
    fn search<'a>(
        &'a self,
        query: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<PhotoCandidate>, PhotoError>> {
        Box::pin(self.search_impl(query, timeout))
    }

    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), PhotoError>> {
        Box::pin(self.download_impl(url, dest, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_decodes_candidates() {
        let raw = r#"{
            "photos": [
                {
                    "width": 4000, "height": 2250,
                    "photographer": "Ada Example",
                    "src": {"large2x": "https://images.example/p1.jpg"}
                }
            ]
        }"#;
        let decoded: SearchResponse = serde_json::from_str(raw).expect("decode");
        assert_eq!(decoded.photos.len(), 1);
        assert_eq!(decoded.photos[0].width, 4000);
        assert_eq!(
            decoded.photos[0].photographer.as_deref(),
            Some("Ada Example")
        );
    }

    #[test]
    fn empty_response_decodes_to_no_photos() {
        let decoded: SearchResponse = serde_json::from_str("{}").expect("decode");
        assert!(decoded.photos.is_empty());
    }

    #[test]
    fn status_mapping() {
        use reqwest::StatusCode;
        assert!(PexelsClient::check_status(StatusCode::OK).is_ok());
        assert!(matches!(
            PexelsClient::check_status(StatusCode::UNAUTHORIZED),
            Err(PhotoError::Auth(_))
        ));
        assert!(matches!(
            PexelsClient::check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(PhotoError::RateLimited)
        ));
        assert!(matches!(
            PexelsClient::check_status(StatusCode::BAD_GATEWAY),
            Err(PhotoError::Transport(_))
        ));
    }
}
