//! Error types for the bookmill library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BookError`] — **Fatal**: the export cannot proceed (text directory
//!   missing, a chapter file unreadable, a markup backend rejected its input,
//!   the output could not be written). Returned as `Err(BookError)` from the
//!   `export*` functions; one bad chapter fails the whole export.
//!
//! * [`SnippetError`] — **Non-fatal**: a code snippet could not be resolved
//!   (missing file, unknown block name, bad line range). Never propagated out
//!   of the snippet engine; its `Display` text is substituted in place of the
//!   code so the rest of the chapter renders unaffected.

use crate::markup::Format;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the bookmill library.
#[derive(Debug, Error)]
pub enum BookError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The chapter source directory does not exist.
    #[error("Text directory not found: '{path}'\nExpected chapter files under <root>/text.")]
    SourceDirNotFound { path: PathBuf },

    /// A chapter file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The markup backend for `format` failed on its input.
    #[error("{format} rendering failed: {detail}")]
    Markup { format: Format, detail: String },

    /// An HTML fragment could not be serialised back to text.
    #[error("HTML serialisation failed: {0}")]
    Html(String),

    /// A chapter failed; the export as a whole fails with it.
    #[error("Chapter '{chapter}' failed: {source}")]
    ChapterFailed {
        chapter: String,
        #[source]
        source: Box<BookError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output HTML file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a rendering task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal snippet resolution failure.
///
/// The `Display` output is the literal placeholder emitted in place of the
/// missing code, so these strings are part of the document format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnippetError {
    /// The referenced file does not exist under the code directory.
    #[error("[missing 'code/{path}' file]")]
    MissingFile { path: String },

    /// No `@begin:<name>` / `@end:<name>` pair was found in the file.
    #[error("[missing '{name}' block name]")]
    MissingBlock { name: String },

    /// The range reference is not `start,end` with `1 <= start <= end`, or
    /// starts past the end of the file.
    #[error("[invalid '{reference}' line range]")]
    InvalidRange { reference: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_placeholder() {
        let e = SnippetError::MissingFile {
            path: "ruby/app.rb".into(),
        };
        assert_eq!(e.to_string(), "[missing 'code/ruby/app.rb' file]");
    }

    #[test]
    fn missing_block_placeholder() {
        let e = SnippetError::MissingBlock {
            name: "demo".into(),
        };
        assert_eq!(e.to_string(), "[missing 'demo' block name]");
    }

    #[test]
    fn chapter_failed_display_includes_cause() {
        let e = BookError::ChapterFailed {
            chapter: "01_intro".into(),
            source: Box::new(BookError::Html("broken pipe".into())),
        };
        let msg = e.to_string();
        assert!(msg.contains("01_intro"), "got: {msg}");
        assert!(msg.contains("broken pipe"), "got: {msg}");
    }

    #[test]
    fn markup_display_names_format() {
        let e = BookError::Markup {
            format: Format::Textile,
            detail: "unbalanced notextile".into(),
        };
        assert!(e.to_string().starts_with("textile"));
    }
}
