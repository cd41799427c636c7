//! Progress-callback trait for per-slide pipeline events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress`] to receive
//! real-time events as the pipeline plans the outline and resolves images.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: callers can
//! forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because image events fire concurrently from the
//! worker pool.

use std::sync::Arc;

/// Called by the pipeline as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Image events may arrive out of slide order and
/// concurrently; implementations must synchronise their own state.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once after the outline is validated, before any image work.
    ///
    /// # Arguments
    /// * `slide_count` — number of content slides that will be resolved
    fn on_run_start(&self, slide_count: usize) {
        let _ = slide_count;
    }

    /// Called just before a slide's image search is issued.
    fn on_image_start(&self, slide_num: usize, total: usize) {
        let _ = (slide_num, total);
    }

    /// Called when a slide's image is resolved (primary or broadened query).
    ///
    /// `fallback` is true when only the broadened query produced a result.
    fn on_image_complete(&self, slide_num: usize, total: usize, fallback: bool) {
        let _ = (slide_num, total, fallback);
    }

    /// Called when a slide ends up without an image.
    fn on_image_error(&self, slide_num: usize, total: usize, error: String) {
        let _ = (slide_num, total, error);
    }

    /// Called once after assembly, with the final resolved count.
    fn on_run_complete(&self, total: usize, resolved: usize) {
        let _ = (total, resolved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_resolved: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_image_start(&self, _slide: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_complete(&self, _slide: usize, _total: usize, _fallback: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_error(&self, _slide: usize, _total: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, _total: usize, resolved: usize) {
            self.final_resolved.store(resolved, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_image_start(1, 5);
        cb.on_image_complete(1, 5, false);
        cb.on_image_error(2, 5, "search failed".to_string());
        cb.on_run_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            final_resolved: AtomicUsize::new(0),
        };

        cb.on_run_start(3);
        cb.on_image_start(1, 3);
        cb.on_image_complete(1, 3, false);
        cb.on_image_start(2, 3);
        cb.on_image_complete(2, 3, true);
        cb.on_image_start(3, 3);
        cb.on_image_error(3, 3, "no results".to_string());
        cb.on_run_complete(3, 2);

        assert_eq!(cb.starts.load(Ordering::SeqCst), 3);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 2);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.final_resolved.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_is_send_in_spawn() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        let handle = std::thread::spawn(move || {
            cb.on_image_error(2, 5, "timeout".to_string());
        });
        handle.join().expect("join");
    }
}
