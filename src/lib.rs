//! # bookmill
//!
//! Turn a directory of book chapters (markdown, textile or HTML) into one
//! HTML document ready for a downstream HTML/PDF/EPUB converter.
//!
//! Chapter sources may contain two annotation blocks on top of their markup:
//!
//! * `@@@ <lang> [file[:start,end | #block]] ... @@@` pulls code from the
//!   book's `code/` directory (or uses the inline body) and highlights it;
//! * `&&& [class] ... &&&` wraps its body in `<div class="class">`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text/
//!  │
//!  ├─ 1. Discover  chapters sorted by name (directories or single files)
//!  ├─ 2. Snippets  @@@ blocks → highlighted <div class="highlight">
//!  ├─ 3. Callouts  &&& blocks → <div class="…">, body rendered as markup
//!  ├─ 4. Markup    markdown / textile / raw HTML → chapter fragment
//!  ├─ 5. Footnotes fn/fnr ids renumbered once across the whole book
//!  └─ 6. Output    assembled HTML + per-chapter stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bookmill::{export, ExportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::builder().root_dir("my-book").build()?;
//!     let output = export(&config).await?;
//!     println!("{}", output.html);
//!     eprintln!("{} chapters, {} footnotes",
//!         output.stats.total_chapters,
//!         output.stats.footnotes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bookmill` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! bookmill = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder};
pub use error::{BookError, SnippetError};
pub use export::{export, export_sync, export_to_file, export_to_file_sync, render_document};
pub use markup::{Format, Markup, MarkupDispatcher};
pub use output::{ChapterOutput, ExportOutput, ExportStats};
pub use pipeline::callout::{render_callouts, CalloutEngine};
pub use pipeline::chapter::ChapterPipeline;
pub use pipeline::footnotes::{reconcile_footnotes, FootnoteCounter, FootnoteReconciler, Reconciled};
pub use pipeline::highlight::{Highlighter, PlainHighlighter};
pub use pipeline::snippet::{render_snippets, AddressMode, SnippetDirective, SnippetEngine};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use source::{discover_chapters, Chapter, FsReader, SourceReader};
