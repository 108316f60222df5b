//! Output types returned by the export entry points.

use serde::Serialize;
use std::path::PathBuf;

/// Result of a book export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutput {
    /// The assembled document: chapter containers in order, footnotes
    /// renumbered, changelog (if any) last.
    pub html: String,
    /// Per-chapter details in document order.
    pub chapters: Vec<ChapterOutput>,
    /// The changelog file appended after the chapters, if any.
    pub changelog: Option<PathBuf>,
    pub stats: ExportStats,
}

/// One rendered chapter.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterOutput {
    /// 1-indexed position in the document.
    pub index: usize,
    pub name: String,
    pub files: Vec<PathBuf>,
    /// Byte length of the chapter fragment before footnote renumbering.
    pub html_len: usize,
    pub duration_ms: u64,
}

/// Aggregate numbers for one export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportStats {
    pub total_chapters: usize,
    pub total_files: usize,
    /// Footnote definitions in the final document, changelog included.
    pub footnotes: usize,
    /// Footnote links with no definition, left as written.
    pub dangling_footnote_links: usize,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}
