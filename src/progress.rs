//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the input directory. The CLI drives an
//! indicatif bar from it; library users can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use scanscribe::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_item_skipped(&self, _index: usize, _total: usize, name: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("already done: {name}");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::BatchSummary;
use std::path::PathBuf;
use std::sync::Arc;

/// Called by the batch pipeline as it processes each item.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the input directory has been listed.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before local extraction starts for an item.
    fn on_item_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when an item is skipped because its final output exists.
    fn on_item_skipped(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after each failed remote attempt, retryable or not.
    ///
    /// # Arguments
    /// * `name`         — source filename of the item
    /// * `attempt`      — 1-based attempt number that just failed
    /// * `max_attempts` — configured attempt budget
    /// * `error`        — human-readable failure
    fn on_attempt_failed(&self, name: &str, attempt: u32, max_attempts: u32, error: &str) {
        let _ = (name, attempt, max_attempts, error);
    }

    /// Called once an item's files are on disk.
    ///
    /// `remote_ok` is false when the final text is an error message.
    fn on_item_complete(&self, index: usize, total: usize, name: &str, remote_ok: bool) {
        let _ = (index, total, name, remote_ok);
    }

    /// Called after the corpus files are written.
    fn on_aggregate_complete(&self, corpus_files: &[PathBuf]) {
        let _ = corpus_files;
    }

    /// Called once at the very end of a successful run.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        skipped: AtomicUsize,
        failures: AtomicUsize,
        completes: AtomicUsize,
    }

    impl BatchProgressCallback for Tracking {
        fn on_item_skipped(&self, _index: usize, _total: usize, _name: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_failed(&self, _name: &str, _attempt: u32, _max: u32, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _index: usize, _total: usize, _name: &str, _ok: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_item_start(1, 3, "a.png");
        cb.on_item_skipped(2, 3, "b.png");
        cb.on_attempt_failed("a.png", 1, 3, "HTTP 500");
        cb.on_item_complete(1, 3, "a.png", true);
        cb.on_aggregate_complete(&[]);
        cb.on_batch_complete(&BatchSummary::default());
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(Tracking::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_item_skipped(1, 2, "a.png");
        cb.on_attempt_failed("b.png", 1, 3, "timeout");
        cb.on_attempt_failed("b.png", 2, 3, "timeout");
        cb.on_item_complete(2, 2, "b.png", true);

        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
    }
}
