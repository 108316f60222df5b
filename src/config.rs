//! Configuration types for book export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. One struct holds every knob so a config can be
//! shared across the blocking workers that render chapters.

use crate::error::BookError;
use crate::pipeline::highlight::{PlainHighlighter, SharedHighlighter};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for one book export.
///
/// Built via [`ExportConfig::builder()`] or using
/// [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use bookmill::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .root_dir("my-book")
///     .concurrency(8)
///     .plain_syntax(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.text_path(), std::path::Path::new("my-book/text"));
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Book root directory. Default: `.`.
    pub root_dir: PathBuf,

    /// Chapter sources, relative to `root_dir`. Default: `text`.
    pub text_dir: PathBuf,

    /// Files referenced by `@@@` snippets, relative to `root_dir`. Default: `code`.
    ///
    /// Snippet headers name files relative to this directory and captions
    /// always read `./code/<file>`.
    pub code_dir: PathBuf,

    /// Chapters rendered at once by the async exporter. Default: 4.
    ///
    /// Rendering is CPU-bound; fragments are always reassembled in document
    /// order before footnotes are renumbered, so this only affects speed.
    pub concurrency: usize,

    /// Render every snippet with the `text` language. Default: false.
    pub plain_syntax: bool,

    /// Append `text/CHANGELOG.*` after the chapters. Default: true.
    pub include_changelog: bool,

    /// Code highlighter. Default: [`PlainHighlighter`].
    pub highlighter: SharedHighlighter,

    /// Optional per-chapter progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            text_dir: PathBuf::from("text"),
            code_dir: PathBuf::from("code"),
            concurrency: 4,
            plain_syntax: false,
            include_changelog: true,
            highlighter: Arc::new(PlainHighlighter),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("root_dir", &self.root_dir)
            .field("text_dir", &self.text_dir)
            .field("code_dir", &self.code_dir)
            .field("concurrency", &self.concurrency)
            .field("plain_syntax", &self.plain_syntax)
            .field("include_changelog", &self.include_changelog)
            .field("highlighter", &"<dyn Highlighter>")
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// `<root_dir>/<text_dir>`
    pub fn text_path(&self) -> PathBuf {
        self.root_dir.join(&self.text_dir)
    }

    /// `<root_dir>/<code_dir>`
    pub fn code_path(&self) -> PathBuf {
        self.root_dir.join(&self.code_dir)
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl fmt::Debug for ExportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExportConfigBuilder {
    pub fn root_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.root_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn text_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.text_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn code_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.code_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn plain_syntax(mut self, v: bool) -> Self {
        self.config.plain_syntax = v;
        self
    }

    pub fn include_changelog(mut self, v: bool) -> Self {
        self.config.include_changelog = v;
        self
    }

    pub fn highlighter(mut self, highlighter: SharedHighlighter) -> Self {
        self.config.highlighter = highlighter;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, BookError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BookError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        for (name, dir) in [("text_dir", &c.text_dir), ("code_dir", &c.code_dir)] {
            if dir.as_os_str().is_empty() {
                return Err(BookError::InvalidConfig(format!("{name} must not be empty")));
            }
            if dir.is_absolute() {
                return Err(BookError::InvalidConfig(format!(
                    "{name} must be relative to the book root, got '{}'",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;

    #[test]
    fn defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.concurrency, 4);
        assert!(config.include_changelog);
        assert!(!config.plain_syntax);
        assert_eq!(config.text_path(), PathBuf::from("./text"));
        assert_eq!(config.code_path(), PathBuf::from("./code"));
    }

    #[test]
    fn builder_sets_fields() {
        let config = ExportConfig::builder()
            .root_dir("/books/rails")
            .text_dir("chapters")
            .code_dir("src")
            .concurrency(2)
            .plain_syntax(true)
            .include_changelog(false)
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        assert_eq!(config.text_path(), PathBuf::from("/books/rails/chapters"));
        assert_eq!(config.code_path(), PathBuf::from("/books/rails/src"));
        assert_eq!(config.concurrency, 2);
        assert!(config.plain_syntax);
        assert!(!config.include_changelog);
        assert!(config.progress_callback.is_some());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = ExportConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, BookError::InvalidConfig(_)));
    }

    #[test]
    fn absolute_or_empty_subdirs_are_rejected() {
        assert!(ExportConfig::builder().text_dir("").build().is_err());
        assert!(ExportConfig::builder().code_dir("/abs/code").build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", ExportConfig::default());
        assert!(dbg.contains("<dyn Highlighter>"));
        assert!(dbg.contains("concurrency: 4"));
    }
}
