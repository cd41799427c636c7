//! Per-slide image resolution.
//!
//! ## Degradation contract
//!
//! `resolve` never returns `Err`. A slide without an image is a valid,
//! degraded output — the deck still ships, the build report says why. This
//! mirrors the propagation policy in [`crate::error`]: everything in this
//! module funnels into an [`ImageResult`], fatal errors do not exist here.
//!
//! ## Candidate selection
//!
//! The service returns relevance-ordered candidates. The first one that is
//! landscape and meets the minimum resolution wins — a stable rule that
//! also happens to pick the most relevant acceptable photo. When the
//! primary query yields nothing usable, one retry runs with a broadened
//! query (the first significant words of the heading); a hit there is
//! recorded as [`ImageStatus::Fallback`].

use crate::config::GenerationConfig;
use crate::error::SlideImageError;
use crate::limiter::RateLimiter;
use crate::outline::SlideSpec;
use crate::output::{ImageResult, ImageStatus};
use crate::services::photos::{PhotoCandidate, PhotoSearch};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Words that carry no search signal when lifted from a heading.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "how", "in", "into",
    "is", "it", "its", "of", "on", "or", "our", "the", "their", "to", "what", "when", "why",
    "with", "your",
];

/// Maximum words in a derived primary query.
const PRIMARY_QUERY_WORDS: usize = 4;
/// Words kept when broadening an unsuccessful query.
const BROADENED_QUERY_WORDS: usize = 2;

/// Resolve one slide's image. Infallible by design; see the module docs.
pub async fn resolve(
    slide: &SlideSpec,
    slide_index: usize,
    photos: &Arc<dyn PhotoSearch>,
    limiter: &RateLimiter,
    media_dir: &Path,
    config: &GenerationConfig,
) -> ImageResult {
    let per_call = Duration::from_secs(config.per_call_timeout_secs);
    let slide_num = slide_index + 1; // 1-based in every human-facing message
    let primary = derive_query(slide);

    // Primary query.
    match search_filtered(photos, limiter, &primary, per_call, config).await {
        Ok(Some(candidate)) => {
            return download(
                photos,
                candidate,
                slide_index,
                media_dir,
                per_call,
                ImageStatus::Resolved,
            )
            .await;
        }
        Ok(None) => {
            debug!(slide = slide_num, query = %primary, "no usable candidate, broadening");
        }
        Err(detail) => {
            warn!(slide = slide_num, query = %primary, %detail, "image search failed");
            return ImageResult::failed(
                slide_index,
                SlideImageError::SearchFailed {
                    slide: slide_num,
                    detail,
                },
            );
        }
    }

    // Broadened retry — only when it actually differs from the primary.
    let broadened = broaden_query(&slide.heading);
    if !broadened.is_empty() && broadened != primary {
        match search_filtered(photos, limiter, &broadened, per_call, config).await {
            Ok(Some(candidate)) => {
                return download(
                    photos,
                    candidate,
                    slide_index,
                    media_dir,
                    per_call,
                    ImageStatus::Fallback,
                )
                .await;
            }
            Ok(None) => {}
            Err(detail) => {
                warn!(slide = slide_num, query = %broadened, %detail, "broadened search failed");
                return ImageResult::failed(
                    slide_index,
                    SlideImageError::SearchFailed {
                        slide: slide_num,
                        detail,
                    },
                );
            }
        }
    }

    ImageResult::failed(
        slide_index,
        SlideImageError::NoResults {
            slide: slide_num,
            query: primary,
        },
    )
}

/// Search and apply the orientation/resolution filter.
///
/// `Ok(None)` means the service answered but nothing passed the filter;
/// `Err` carries a transport/auth/quota description.
async fn search_filtered(
    photos: &Arc<dyn PhotoSearch>,
    limiter: &RateLimiter,
    query: &str,
    per_call: Duration,
    config: &GenerationConfig,
) -> Result<Option<PhotoCandidate>, String> {
    limiter.acquire().await.map_err(|e| e.to_string())?;

    let candidates = photos
        .search(query, per_call)
        .await
        .map_err(|e| e.to_string())?;

    Ok(select_candidate(
        candidates,
        config.image_min_width,
        config.image_min_height,
    ))
}

/// First candidate, in service order, that is landscape at or above the
/// minimum resolution.
fn select_candidate(
    candidates: Vec<PhotoCandidate>,
    min_width: u32,
    min_height: u32,
) -> Option<PhotoCandidate> {
    candidates
        .into_iter()
        .find(|c| c.width > c.height && c.width >= min_width && c.height >= min_height)
}

async fn download(
    photos: &Arc<dyn PhotoSearch>,
    candidate: PhotoCandidate,
    slide_index: usize,
    media_dir: &Path,
    per_call: Duration,
    status: ImageStatus,
) -> ImageResult {
    let dest = media_dir.join(format!("slide{slide_index}.jpg"));

    match photos.download(&candidate.url, &dest, per_call).await {
        Ok(()) => ImageResult {
            slide_index,
            url: Some(candidate.url),
            local_path: Some(dest),
            attribution: candidate.attribution,
            status,
            error: None,
        },
        Err(e) => {
            warn!(slide = slide_index + 1, url = %candidate.url, error = %e, "image download failed");
            ImageResult::failed(
                slide_index,
                SlideImageError::DownloadFailed {
                    slide: slide_index + 1,
                    detail: e.to_string(),
                },
            )
        }
    }
}

/// The search query for a slide: the model's hint when present, otherwise
/// the significant words of the heading.
fn derive_query(slide: &SlideSpec) -> String {
    if !slide.image_query.trim().is_empty() {
        return slide.image_query.trim().to_lowercase();
    }
    significant_words(&slide.heading, PRIMARY_QUERY_WORDS).join(" ")
}

/// Broadened form: just the leading significant words of the heading.
fn broaden_query(heading: &str) -> String {
    significant_words(heading, BROADENED_QUERY_WORDS).join(" ")
}

fn significant_words(text: &str, max: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .take(max)
        .collect()
}
