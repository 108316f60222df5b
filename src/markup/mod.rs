//! Markup backends: turn a chapter's (pre-processed) text into HTML.
//!
//! The pipeline only ever sees the [`Markup`] capability. One concrete
//! backend per [`Format`] is chosen when the [`MarkupDispatcher`] is built;
//! there is no runtime discovery of alternative engines.
//!
//! Backends must be pure and re-entrant: the callout engine calls back into
//! the dispatcher for every callout body while the outer chapter render is
//! still in progress.

pub mod markdown;
pub mod textile;

use crate::error::BookError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub use markdown::MarkdownRenderer;
pub use textile::TextileRenderer;

/// Declared format of a chapter file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Markdown,
    Textile,
    /// Already HTML; passed through untouched.
    Html,
}

impl Format {
    /// Map a file extension to its format. Unknown extensions are HTML.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("md" | "mkdn" | "markdown") => Format::Markdown,
            Some("textile") => Format::Textile,
            _ => Format::Html,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Markdown => "markdown",
            Format::Textile => "textile",
            Format::Html => "html",
        })
    }
}

/// A markup engine: `text -> html`.
pub trait Markup: Send + Sync {
    fn render(&self, text: &str) -> Result<String, BookError>;
}

/// Routes text to the backend registered for its format.
#[derive(Clone)]
pub struct MarkupDispatcher {
    markdown: Arc<dyn Markup>,
    textile: Arc<dyn Markup>,
}

impl Default for MarkupDispatcher {
    fn default() -> Self {
        Self {
            markdown: Arc::new(MarkdownRenderer::default()),
            textile: Arc::new(TextileRenderer),
        }
    }
}

impl fmt::Debug for MarkupDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupDispatcher")
            .field("markdown", &"<dyn Markup>")
            .field("textile", &"<dyn Markup>")
            .finish()
    }
}

impl MarkupDispatcher {
    pub fn new(markdown: Arc<dyn Markup>, textile: Arc<dyn Markup>) -> Self {
        Self { markdown, textile }
    }

    /// Render `text` as `format`. HTML is returned unchanged.
    pub fn render(&self, text: &str, format: Format) -> Result<String, BookError> {
        match format {
            Format::Markdown => self.markdown.render(text),
            Format::Textile => self.textile.render(text),
            Format::Html => Ok(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shouting;

    impl Markup for Shouting {
        fn render(&self, text: &str) -> Result<String, BookError> {
            Ok(text.to_uppercase())
        }
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/intro.md")), Format::Markdown);
        assert_eq!(Format::from_path(Path::new("a/intro.MKDN")), Format::Markdown);
        assert_eq!(Format::from_path(Path::new("a/intro.markdown")), Format::Markdown);
        assert_eq!(Format::from_path(Path::new("a/intro.textile")), Format::Textile);
        assert_eq!(Format::from_path(Path::new("a/intro.html")), Format::Html);
        assert_eq!(Format::from_path(Path::new("a/README")), Format::Html);
    }

    #[test]
    fn html_is_passthrough() {
        let d = MarkupDispatcher::default();
        let html = "<p>**not markdown**</p>";
        assert_eq!(d.render(html, Format::Html).unwrap(), html);
    }

    #[test]
    fn custom_backend_is_used_for_its_format() {
        let d = MarkupDispatcher::new(Arc::new(Shouting), Arc::new(TextileRenderer));
        assert_eq!(d.render("hello", Format::Markdown).unwrap(), "HELLO");
        assert!(d
            .render("hello", Format::Textile)
            .unwrap()
            .contains("<p>hello</p>"));
    }

    #[test]
    fn markdown_renders_strong() {
        let d = MarkupDispatcher::default();
        let html = d
            .render("This is a callout section.\n\n**This is a strong point**.\n", Format::Markdown)
            .unwrap();
        assert_eq!(html.matches("<strong>").count(), 1);
        assert!(html.contains("callout section"));
    }
}
