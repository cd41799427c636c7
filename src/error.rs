//! Error types for the topic2deck library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DeckError`] — **Fatal**: the run cannot produce a deck at all
//!   (invalid request, missing API key, outline planning exhausted its
//!   retries, output file unwritable). Returned as `Err(DeckError)` from
//!   the top-level `generate*` functions.
//!
//! * [`SlideImageError`] — **Non-fatal**: one slide's image lookup failed
//!   (empty search results, download glitch, deadline hit) but the deck is
//!   still built. Stored inside [`crate::output::ImageResult`] so callers
//!   can inspect degraded slides in the build report rather than losing the
//!   whole presentation to one missing picture.
//!
//! The separation encodes the propagation policy directly in the types:
//! anything that can reach a caller as `Err` aborts the run, everything
//! else ends up in the report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the topic2deck library.
///
/// Per-slide image failures use [`SlideImageError`] and are stored in
/// [`crate::output::ImageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DeckError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The topic string is empty or whitespace-only.
    #[error("Topic must not be empty")]
    EmptyTopic,

    /// Requested slide count is outside the supported range.
    #[error("Slide count {requested} is out of range ({min}–{max})")]
    SlideCountOutOfRange {
        requested: i64,
        min: usize,
        max: usize,
    },

    // ── Credential / config errors ────────────────────────────────────────
    /// A required service credential is absent. Detected before the first
    /// network call so a half-finished run never burns quota.
    #[error("No API key for the {service} service.\n{hint}")]
    MissingCredential { service: &'static str, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Planning errors ───────────────────────────────────────────────────
    /// The model never produced an outline matching the requested schema,
    /// even after corrective retries.
    #[error(
        "Model output did not match the outline schema after {attempts} attempts.\n\
         Last parse error: {detail}"
    )]
    MalformedOutline { attempts: u32, detail: String },

    /// Every model in the fallback order was unavailable.
    #[error("Model '{model}' is unavailable: {detail}")]
    ModelUnavailable { model: String, detail: String },

    /// A service rate limit persisted past the backoff ceiling.
    #[error("Rate limit exceeded for the {service} service after {attempts} attempts")]
    RateLimited { service: &'static str, attempts: u32 },

    /// An outline request exceeded the per-call timeout.
    #[error("Model '{model}' timed out after {secs}s")]
    PlanningTimeout { model: String, secs: u64 },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// An outline reached the assembler that cannot be laid out.
    #[error("Cannot assemble deck: {detail}")]
    InvalidOutline { detail: String },

    /// Could not create or write the output presentation file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Run-level errors ──────────────────────────────────────────────────
    /// The global run deadline elapsed before an outline existed.
    ///
    /// Distinct from [`DeckError::PlanningTimeout`] (one call) — this is
    /// the whole-run budget. A deadline hit *after* planning degrades the
    /// remaining image lookups instead of failing the run.
    #[error("Pipeline exceeded the global timeout of {secs}s")]
    PipelineTimeout { secs: u64 },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide's image resolution.
///
/// Stored alongside [`crate::output::ImageResult`] when a slide ends up
/// without a picture. The overall run continues regardless.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideImageError {
    /// The photo service returned an error (network, auth, 5xx).
    #[error("Slide {slide}: image search failed: {detail}")]
    SearchFailed { slide: usize, detail: String },

    /// No candidate passed the orientation/resolution filter, even after
    /// broadening the query.
    #[error("Slide {slide}: no image found for '{query}'")]
    NoResults { slide: usize, query: String },

    /// A candidate was selected but could not be downloaded.
    #[error("Slide {slide}: image download failed: {detail}")]
    DownloadFailed { slide: usize, detail: String },

    /// The global run deadline expired while this slide was in flight.
    #[error("Slide {slide}: abandoned at the run deadline")]
    DeadlineExceeded { slide: usize },
}
