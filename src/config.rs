//! Configuration and request types for deck generation.
//!
//! All run behaviour is controlled through [`GenerationConfig`], built via
//! its [`GenerationConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! The user's input is a separate, immutable [`TopicRequest`] — one per
//! run, validated at construction so an impossible request is rejected
//! before any network call is made.

use crate::error::DeckError;
use crate::progress::ProgressCallback;
use crate::services::model::TextModel;
use crate::services::photos::PhotoSearch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Smallest deck worth generating.
pub const MIN_SLIDES: usize = 3;
/// Largest deck a single outline request can reliably cover.
pub const MAX_SLIDES: usize = 20;

/// Bullet-count bounds enforced on every content slide.
pub const MIN_BULLETS: usize = 1;
/// Upper bullet bound; more than this overflows the fixed body region.
pub const MAX_BULLETS: usize = 6;

// ── Topic request ────────────────────────────────────────────────────────

/// Which model family the run should prefer.
///
/// The tiers trade latency for quality. Each maps onto a concrete model
/// id; the remaining tiers form the fallback order when the preferred
/// model is unavailable or persistently rate-limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelPreference {
    /// Best outline quality, slowest. (default)
    #[default]
    Quality,
    /// Good quality at noticeably lower latency.
    Balanced,
    /// Fastest responses, acceptable for short decks.
    Fast,
}

impl ModelPreference {
    /// The concrete model id this tier maps to.
    pub fn model_id(self) -> &'static str {
        match self {
            ModelPreference::Quality => "gemini-2.5-pro",
            ModelPreference::Balanced => "gemini-2.5-flash",
            ModelPreference::Fast => "gemini-1.5-flash",
        }
    }

    /// Ordered fallback chain starting at this tier.
    pub fn fallback_order(self) -> Vec<String> {
        let all = [
            ModelPreference::Quality,
            ModelPreference::Balanced,
            ModelPreference::Fast,
        ];
        let mut order: Vec<String> = vec![self.model_id().to_string()];
        for tier in all {
            if tier != self {
                order.push(tier.model_id().to_string());
            }
        }
        order
    }
}

/// The immutable input for one generation run.
///
/// Constructed once via [`TopicRequest::new`], which rejects an empty topic
/// and an out-of-range slide count before the pipeline touches the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRequest {
    /// Free-text presentation topic.
    pub topic: String,
    /// Exact number of content slides the deck must have.
    pub slide_count: usize,
    /// Output language for headings, bullets, and notes.
    pub language: String,
    /// Preferred model tier; the run falls back through the other tiers.
    pub model_preference: ModelPreference,
}

impl TopicRequest {
    /// Validate and build a request. `slide_count` takes a signed value so
    /// that callers forwarding untrusted input (CLI, HTTP) get a typed
    /// error for zero and negative counts instead of a silent wrap.
    pub fn new(topic: impl Into<String>, slide_count: i64) -> Result<Self, DeckError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(DeckError::EmptyTopic);
        }
        if slide_count < MIN_SLIDES as i64 || slide_count > MAX_SLIDES as i64 {
            return Err(DeckError::SlideCountOutOfRange {
                requested: slide_count,
                min: MIN_SLIDES,
                max: MAX_SLIDES,
            });
        }
        Ok(Self {
            topic: topic.trim().to_string(),
            slide_count: slide_count as usize,
            language: "English".to_string(),
            model_preference: ModelPreference::default(),
        })
    }

    /// Set the output language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the preferred model tier.
    pub fn model_preference(mut self, preference: ModelPreference) -> Self {
        self.model_preference = preference;
        self
    }
}

// ── Generation config ────────────────────────────────────────────────────

/// Configuration for a deck generation run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use topic2deck::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .concurrency(2)
///     .max_plan_retries(3)
///     .global_timeout_secs(180)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Ordered model ids to try. Empty means: derive the chain from the
    /// request's [`ModelPreference`]. Default: empty.
    pub model_fallback: Vec<String>,

    /// Images per content slide. The layout reserves exactly one picture
    /// region, so any other value fails config validation. Default: 1.
    pub max_images_per_slide: usize,

    /// Minimum accepted image width in pixels. Default: 1920.
    pub image_min_width: u32,

    /// Minimum accepted image height in pixels. Default: 1080.
    pub image_min_height: u32,

    /// Extra outline attempts after the first malformed response. Each
    /// retry sends a corrective prompt quoting the parse error back to the
    /// model. Default: 2.
    pub max_plan_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s, so N concurrent
    /// workers recovering from a shared 429 never stampede the service.
    pub retry_backoff_ms: u64,

    /// Longest single wait the rate limiter will tolerate before giving up
    /// with a rate-limit error, in milliseconds. Default: 30 000.
    pub backoff_ceiling_ms: u64,

    /// Whole-run deadline in seconds. Default: 120.
    ///
    /// Distinct from [`per_call_timeout_secs`](Self::per_call_timeout_secs):
    /// a run that blows this budget during planning fails outright; one
    /// that blows it during image resolution ships a degraded deck.
    pub global_timeout_secs: u64,

    /// Timeout for one outbound service call in seconds. Default: 30.
    pub per_call_timeout_secs: u64,

    /// Concurrent image resolutions. Default: 4.
    ///
    /// Image lookups are network-bound and independent per slide, so a
    /// small pool cuts wall-clock time without tripping the photo
    /// service's hourly quota.
    pub concurrency: usize,

    /// Model service quota: requests per rolling minute. Default: 15.
    pub model_requests_per_minute: u32,

    /// Photo service quota: requests per rolling hour. Default: 200.
    pub photo_requests_per_hour: u32,

    /// Character budget per bullet. Longer bullets are shortened at a word
    /// boundary by the planner; the assembler renders text as given.
    /// Default: 80.
    pub max_bullet_chars: usize,

    /// Resolve and place stock photos. When off, the photo credential is
    /// not required and every slide ships text-only. Default: true.
    pub include_images: bool,

    /// Append a closing slide (deck title + thank-you line) after the
    /// requested content slides. Default: false.
    pub closing_slide: bool,

    /// Keep the raw model responses in the output for debugging. Default: false.
    pub debug_raw: bool,

    /// Pre-constructed model client. Takes precedence over the
    /// environment-key lookup; the seam used by tests and by callers that
    /// need custom middleware.
    pub text_model: Option<Arc<dyn TextModel>>,

    /// Pre-constructed photo client. Same precedence rule as
    /// [`text_model`](Self::text_model).
    pub photo_search: Option<Arc<dyn PhotoSearch>>,

    /// Progress event sink, consumed by the CLI's progress bar.
    pub progress: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_fallback: Vec::new(),
            max_images_per_slide: 1,
            image_min_width: 1920,
            image_min_height: 1080,
            max_plan_retries: 2,
            retry_backoff_ms: 500,
            backoff_ceiling_ms: 30_000,
            global_timeout_secs: 120,
            per_call_timeout_secs: 30,
            concurrency: 4,
            model_requests_per_minute: 15,
            photo_requests_per_hour: 200,
            max_bullet_chars: 80,
            include_images: true,
            closing_slide: false,
            debug_raw: false,
            text_model: None,
            photo_search: None,
            progress: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model_fallback", &self.model_fallback)
            .field("max_images_per_slide", &self.max_images_per_slide)
            .field("image_min_width", &self.image_min_width)
            .field("image_min_height", &self.image_min_height)
            .field("max_plan_retries", &self.max_plan_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("backoff_ceiling_ms", &self.backoff_ceiling_ms)
            .field("global_timeout_secs", &self.global_timeout_secs)
            .field("per_call_timeout_secs", &self.per_call_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("max_bullet_chars", &self.max_bullet_chars)
            .field("include_images", &self.include_images)
            .field("closing_slide", &self.closing_slide)
            .field("debug_raw", &self.debug_raw)
            .field("text_model", &self.text_model.as_ref().map(|_| "<dyn TextModel>"))
            .field(
                "photo_search",
                &self.photo_search.as_ref().map(|_| "<dyn PhotoSearch>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model chain for a given request: explicit config order when set,
    /// otherwise derived from the request's preference tier.
    pub fn model_order(&self, request: &TopicRequest) -> Vec<String> {
        if self.model_fallback.is_empty() {
            request.model_preference.fallback_order()
        } else {
            self.model_fallback.clone()
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model_fallback(mut self, order: Vec<String>) -> Self {
        self.config.model_fallback = order;
        self
    }

    pub fn image_min_resolution(mut self, width: u32, height: u32) -> Self {
        self.config.image_min_width = width.max(1);
        self.config.image_min_height = height.max(1);
        self
    }

    pub fn max_plan_retries(mut self, n: u32) -> Self {
        self.config.max_plan_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn backoff_ceiling_ms(mut self, ms: u64) -> Self {
        self.config.backoff_ceiling_ms = ms;
        self
    }

    pub fn global_timeout_secs(mut self, secs: u64) -> Self {
        self.config.global_timeout_secs = secs.max(1);
        self
    }

    pub fn per_call_timeout_secs(mut self, secs: u64) -> Self {
        self.config.per_call_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model_requests_per_minute(mut self, n: u32) -> Self {
        self.config.model_requests_per_minute = n.max(1);
        self
    }

    pub fn photo_requests_per_hour(mut self, n: u32) -> Self {
        self.config.photo_requests_per_hour = n.max(1);
        self
    }

    pub fn max_bullet_chars(mut self, n: usize) -> Self {
        self.config.max_bullet_chars = n.max(16);
        self
    }

    pub fn include_images(mut self, v: bool) -> Self {
        self.config.include_images = v;
        self
    }

    pub fn closing_slide(mut self, v: bool) -> Self {
        self.config.closing_slide = v;
        self
    }

    pub fn debug_raw(mut self, v: bool) -> Self {
        self.config.debug_raw = v;
        self
    }

    pub fn text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.config.text_model = Some(model);
        self
    }

    pub fn photo_search(mut self, photos: Arc<dyn PhotoSearch>) -> Self {
        self.config.photo_search = Some(photos);
        self
    }

    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.config.progress = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, DeckError> {
        let c = &self.config;
        if c.max_images_per_slide != 1 {
            return Err(DeckError::InvalidConfig(format!(
                "max_images_per_slide is fixed at 1 (layout reserves one picture region), got {}",
                c.max_images_per_slide
            )));
        }
        if c.concurrency == 0 {
            return Err(DeckError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.per_call_timeout_secs > c.global_timeout_secs {
            return Err(DeckError::InvalidConfig(format!(
                "per_call_timeout_secs ({}) exceeds global_timeout_secs ({})",
                c.per_call_timeout_secs, c.global_timeout_secs
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_empty_topic() {
        assert!(matches!(
            TopicRequest::new("   ", 5),
            Err(DeckError::EmptyTopic)
        ));
    }

    #[test]
    fn request_rejects_zero_and_negative_counts() {
        for bad in [0, -1, -20] {
            assert!(matches!(
                TopicRequest::new("Climate Change", bad),
                Err(DeckError::SlideCountOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn request_accepts_boundary_counts() {
        assert_eq!(
            TopicRequest::new("Climate Change", MIN_SLIDES as i64)
                .unwrap()
                .slide_count,
            MIN_SLIDES
        );
        assert_eq!(
            TopicRequest::new("Climate Change", MAX_SLIDES as i64)
                .unwrap()
                .slide_count,
            MAX_SLIDES
        );
        assert!(TopicRequest::new("Climate Change", MAX_SLIDES as i64 + 1).is_err());
    }

    #[test]
    fn request_trims_topic() {
        let req = TopicRequest::new("  Renewable Energy  ", 5).unwrap();
        assert_eq!(req.topic, "Renewable Energy");
    }

    #[test]
    fn fallback_order_starts_at_preference() {
        let order = ModelPreference::Balanced.fallback_order();
        assert_eq!(order[0], "gemini-2.5-flash");
        assert_eq!(order.len(), 3);
        assert!(order.contains(&"gemini-2.5-pro".to_string()));
    }

    #[test]
    fn builder_rejects_inverted_timeouts() {
        let result = GenerationConfig::builder()
            .global_timeout_secs(10)
            .per_call_timeout_secs(60)
            .build();
        assert!(matches!(result, Err(DeckError::InvalidConfig(_))));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let config = GenerationConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn model_order_prefers_explicit_config() {
        let request = TopicRequest::new("Topic", 5).unwrap();
        let config = GenerationConfig::builder()
            .model_fallback(vec!["gemini-2.0-flash".into()])
            .build()
            .unwrap();
        assert_eq!(config.model_order(&request), vec!["gemini-2.0-flash"]);
    }
}
