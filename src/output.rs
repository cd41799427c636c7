//! Run results: per-slide image outcomes, the build report, and the
//! assembled deck.
//!
//! The [`BuildReport`] is the primary observability surface of a run. It is
//! produced even when slides degrade, so a caller can always answer "what
//! did I actually get?" without parsing the binary artifact.

use crate::error::SlideImageError;
use crate::outline::Outline;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a slide's image lookup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// The primary query produced a usable image.
    Resolved,
    /// Only the broadened fallback query produced one.
    Fallback,
    /// No image; the slide ships with an empty picture region.
    Failed,
}

/// Outcome of resolving one slide's image.
///
/// `url` and `local_path` are absent only when `status` is
/// [`ImageStatus::Failed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// 0-indexed position of the content slide this image belongs to.
    pub slide_index: usize,
    /// Source URL of the selected photo.
    pub url: Option<String>,
    /// Downloaded copy inside the run's scoped temp directory.
    pub local_path: Option<PathBuf>,
    /// Photographer credit, when the service provides one.
    pub attribution: Option<String>,
    pub status: ImageStatus,
    /// Why the slide has no image; set only on `Failed`.
    pub error: Option<SlideImageError>,
}

impl ImageResult {
    /// A failed lookup for `slide_index` with its cause.
    pub fn failed(slide_index: usize, error: SlideImageError) -> Self {
        Self {
            slide_index,
            url: None,
            local_path: None,
            attribution: None,
            status: ImageStatus::Failed,
            error: Some(error),
        }
    }

    /// True when the assembler should place this image.
    pub fn is_usable(&self) -> bool {
        matches!(self.status, ImageStatus::Resolved | ImageStatus::Fallback)
    }
}

/// Summary of a generation run, returned alongside the deck.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    /// Content slides written to the deck. The title slide (and the
    /// closing slide, when configured) frame these and are not counted.
    pub slides_built: usize,
    /// Images placed from the primary or broadened query.
    pub images_resolved: usize,
    /// Slides that ship without an image.
    pub images_failed: usize,
    /// Non-fatal degradations, in slide order.
    pub warnings: Vec<String>,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
    /// Time spent obtaining a valid outline, retries included.
    pub plan_duration_ms: u64,
    /// Time spent resolving images across all slides.
    pub image_duration_ms: u64,
}

/// Everything a successful run produces.
///
/// Not serialisable as a whole — `deck` is the binary artifact; emit
/// [`report`](Self::report) (and [`images`](Self::images)) for structured
/// logging instead.
#[derive(Debug)]
pub struct DeckOutput {
    /// The finished `.pptx` package.
    pub deck: Vec<u8>,
    /// The validated outline the deck was built from.
    pub outline: Outline,
    /// One entry per content slide, in slide order.
    pub images: Vec<ImageResult>,
    pub report: BuildReport,
    /// Raw model responses, retained only when the debug flag is set.
    pub raw_model_output: Option<Vec<String>>,
}
