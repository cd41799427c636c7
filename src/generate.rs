//! Top-level generation entry points.
//!
//! ## Pipeline sequence
//!
//! ```text
//! TopicRequest
//!  │
//!  ├─ 1. Credentials  resolve both service clients (fail fast, no quota burnt)
//!  ├─ 2. Plan         one validated outline (sequential, corrective retries)
//!  ├─ 3. Resolve      per-slide images, bounded concurrency, deadline-raced
//!  └─ 4. Assemble     deterministic .pptx + build report
//! ```
//!
//! Planning and assembly failures abort the run; image failures never do —
//! they are folded into the [`BuildReport`]. The global deadline is fatal
//! only while planning: once an outline exists, in-flight image tasks past
//! the deadline are abandoned as failed and the deck still ships.

use crate::config::{GenerationConfig, TopicRequest};
use crate::error::{DeckError, SlideImageError};
use crate::limiter::RateLimiter;
use crate::output::{BuildReport, DeckOutput, ImageResult};
use crate::pipeline::{assemble, images, planner};
use crate::services::model::{GeminiClient, TextModel};
use crate::services::photos::{PexelsClient, PhotoSearch};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Generate a presentation for `request`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(DeckOutput)` on success, even if some slides lost their image
/// (check `output.report.images_failed`).
///
/// # Errors
/// Returns `Err(DeckError)` only for fatal conditions:
/// - missing credentials, invalid request
/// - planning failure (malformed output after retries, models unavailable,
///   persistent rate limiting, timeouts)
/// - assembly failure
pub async fn generate(
    request: &TopicRequest,
    config: &GenerationConfig,
) -> Result<DeckOutput, DeckError> {
    let total_start = Instant::now();
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(config.global_timeout_secs);
    info!(topic = %request.topic, slides = request.slide_count, "starting generation");

    // ── Step 1: Resolve service clients up front ─────────────────────────
    let model = resolve_text_model(config)?;
    let photos = if config.include_images {
        Some(resolve_photo_search(config)?)
    } else {
        None
    };

    let model_limiter = RateLimiter::per_minute(
        "model",
        config.model_requests_per_minute,
        config.backoff_ceiling_ms,
    );
    let photo_limiter = RateLimiter::per_hour(
        "photo",
        config.photo_requests_per_hour,
        config.backoff_ceiling_ms,
    );

    // ── Step 2: Plan the outline ─────────────────────────────────────────
    let plan_start = Instant::now();
    let (outline, raw_responses) =
        planner::plan(request, &model, &model_limiter, config, deadline).await?;
    let plan_duration_ms = plan_start.elapsed().as_millis() as u64;
    info!(
        title = %outline.title,
        slides = outline.slides.len(),
        plan_ms = plan_duration_ms,
        "outline ready"
    );

    if let Some(ref cb) = config.progress {
        cb.on_run_start(outline.slides.len());
    }

    // ── Step 3: Resolve images (bounded concurrent, deadline-raced) ──────
    let image_start = Instant::now();
    let media_dir = tempfile::TempDir::new()
        .map_err(|e| DeckError::Internal(format!("media tempdir: {e}")))?;

    let mut image_results: Vec<ImageResult> = match photos {
        Some(ref photos) => {
            let total = outline.slides.len();
            stream::iter(outline.slides.iter().enumerate().map(|(i, slide)| {
                let photos = Arc::clone(photos);
                let limiter = &photo_limiter;
                let media_path = media_dir.path();
                let progress = config.progress.as_ref();
                async move {
                    if let Some(cb) = progress {
                        cb.on_image_start(i + 1, total);
                    }
                    let result = match tokio::time::timeout_at(
                        deadline,
                        images::resolve(slide, i, &photos, limiter, media_path, config),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(slide = i + 1, "run deadline reached, abandoning image task");
                            ImageResult::failed(
                                i,
                                SlideImageError::DeadlineExceeded { slide: i + 1 },
                            )
                        }
                    };
                    if let Some(cb) = progress {
                        match &result.error {
                            None => cb.on_image_complete(
                                i + 1,
                                total,
                                result.status == crate::output::ImageStatus::Fallback,
                            ),
                            Some(e) => cb.on_image_error(i + 1, total, e.to_string()),
                        }
                    }
                    result
                }
            }))
            .buffer_unordered(config.concurrency)
            .collect()
            .await
        }
        None => Vec::new(),
    };

    // Tasks join out of order; the assembler merges by index.
    image_results.sort_by_key(|r| r.slide_index);
    let image_duration_ms = image_start.elapsed().as_millis() as u64;

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let (deck, mut report) = assemble::assemble(&outline, &image_results, &request.topic, config)?;
    report.plan_duration_ms = plan_duration_ms;
    report.image_duration_ms = image_duration_ms;
    report.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        slides = report.slides_built,
        resolved = report.images_resolved,
        failed = report.images_failed,
        total_ms = report.total_duration_ms,
        "generation complete"
    );

    if let Some(ref cb) = config.progress {
        cb.on_run_complete(image_results.len(), report.images_resolved);
    }

    Ok(DeckOutput {
        deck,
        outline,
        images: image_results,
        report,
        raw_model_output: config.debug_raw.then_some(raw_responses),
    })
}

/// Generate a presentation and write it directly to a file.
///
/// Uses atomic write (temp file + rename) so a crashed or failed run never
/// leaves a partial `.pptx` behind.
pub async fn generate_to_file(
    request: &TopicRequest,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<BuildReport, DeckError> {
    let output = generate(request, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DeckError::OutputWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("pptx.tmp");
    tokio::fs::write(&tmp_path, &output.deck)
        .await
        .map_err(|e| DeckError::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| DeckError::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.report)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    request: &TopicRequest,
    config: &GenerationConfig,
) -> Result<DeckOutput, DeckError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DeckError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate(request, config))
}

// ── Client resolution ────────────────────────────────────────────────────

/// Pre-built client when the caller supplied one, else the environment key.
fn resolve_text_model(config: &GenerationConfig) -> Result<Arc<dyn TextModel>, DeckError> {
    if let Some(ref model) = config.text_model {
        return Ok(Arc::clone(model));
    }
    Ok(Arc::new(GeminiClient::from_env()?))
}

fn resolve_photo_search(config: &GenerationConfig) -> Result<Arc<dyn PhotoSearch>, DeckError> {
    if let Some(ref photos) = config.photo_search {
        return Ok(Arc::clone(photos));
    }
    Ok(Arc::new(PexelsClient::from_env()?))
}
