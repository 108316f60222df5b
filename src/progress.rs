//! Progress-callback trait for per-chapter export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the exporter renders each chapter.
//!
//! # Example
//!
//! ```rust
//! use bookmill::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_chapter_complete(&self, index: usize, total: usize, name: &str, html_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} bytes)", index, total, name, html_len);
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the exporter as it renders each chapter.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With the async exporter, `on_chapter_start`, `on_chapter_complete` and
/// `on_chapter_error` may fire concurrently from blocking-pool threads and in
/// any order; the assembled document is still in chapter order.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before any chapter is rendered.
    ///
    /// # Arguments
    /// * `total_chapters` — chapters that will be rendered (changelog excluded)
    fn on_export_start(&self, total_chapters: usize) {
        let _ = total_chapters;
    }

    /// Called just before a chapter is rendered.
    ///
    /// # Arguments
    /// * `index` — 1-indexed chapter position
    /// * `total` — total chapters
    /// * `name`  — chapter name (entry under the text directory)
    fn on_chapter_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a chapter rendered successfully.
    ///
    /// # Arguments
    /// * `html_len` — byte length of the chapter fragment
    fn on_chapter_complete(&self, index: usize, total: usize, name: &str, html_len: usize) {
        let _ = (index, total, name, html_len);
    }

    /// Called when a chapter fails. The export fails with it.
    fn on_chapter_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after the document has been assembled and reconciled.
    ///
    /// # Arguments
    /// * `total_chapters` — chapters rendered
    /// * `footnotes`      — footnote definitions in the final document
    fn on_export_complete(&self, total_chapters: usize, footnotes: usize) {
        let _ = (total_chapters, footnotes);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
