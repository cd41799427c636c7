//! # topic2deck
//!
//! Generate multi-slide PowerPoint presentations from a free-text topic
//! using a generative-AI text model and a stock-photo service.
//!
//! ## Why this crate?
//!
//! Writing a deck is two separate problems: deciding what to say and
//! laying it out. This crate automates both, but refuses to trust either
//! external service — the model's response is parsed against a strict
//! outline schema with corrective retries, and every photo lookup is
//! allowed to fail without taking the run down with it. The result is a
//! pipeline that either ships a complete `.pptx` with an honest build
//! report, or fails with one attributable error. Never a corrupt file,
//! never a silently padded outline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic
//!  │
//!  ├─ 1. Plan      model call → strict parse → validated Outline (retry on malformed)
//!  ├─ 2. Resolve   one stock photo per slide, concurrent, degradable
//!  ├─ 3. Assemble  deterministic PresentationML package
//!  └─ 4. Report    slides built, images resolved/failed, warnings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use topic2deck::{generate, GenerationConfig, TopicRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keys read from GEMINI_API_KEY and PEXELS_API_KEY
//!     let request = TopicRequest::new("The Future of Renewable Energy", 5)?;
//!     let config = GenerationConfig::default();
//!     let output = generate(&request, &config).await?;
//!     std::fs::write("deck.pptx", &output.deck)?;
//!     eprintln!(
//!         "{} slides, {} images resolved, {} failed",
//!         output.report.slides_built,
//!         output.report.images_resolved,
//!         output.report.images_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `topic2deck` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! topic2deck = { version = "0.3", default-features = false }
//! ```
//!
//! ## Choosing a Model Tier
//!
//! | Tier | Model | Best for |
//! |------|-------|----------|
//! | `Quality`  | `gemini-2.5-pro`   | Default — best outlines |
//! | `Balanced` | `gemini-2.5-flash` | Good outlines, lower latency |
//! | `Fast`     | `gemini-1.5-flash` | Short decks, quickest turnaround |
//!
//! The run automatically falls back through the remaining tiers when the
//! preferred model is unavailable or persistently rate-limited.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod limiter;
pub mod outline;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GenerationConfig, GenerationConfigBuilder, ModelPreference, TopicRequest, MAX_SLIDES,
    MIN_SLIDES,
};
pub use error::{DeckError, SlideImageError};
pub use generate::{generate, generate_sync, generate_to_file};
pub use outline::{Outline, SlideSpec};
pub use output::{BuildReport, DeckOutput, ImageResult, ImageStatus};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use services::model::{GeminiClient, ModelError, TextModel};
pub use services::photos::{PexelsClient, PhotoCandidate, PhotoError, PhotoSearch};
