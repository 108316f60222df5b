//! Whole-book export entry points.
//!
//! Every entry point follows the same shape:
//!
//! 1. discover the chapters under `<root>/<text_dir>`
//! 2. render each chapter to a fragment (in parallel for [`export`])
//! 3. concatenate the fragments in document order
//! 4. renumber footnotes once over the whole document
//! 5. append the changelog, renumbered with the same counter
//!
//! Step 4 must see the fragments in final order, so the async path uses an
//! order-preserving `buffered` stream rather than `buffer_unordered`.

use crate::config::ExportConfig;
use crate::error::BookError;
use crate::output::{ChapterOutput, ExportOutput, ExportStats};
use crate::pipeline::chapter::{wrap_chapter, ChapterPipeline};
use crate::pipeline::footnotes::{FootnoteCounter, FootnoteReconciler, Reconciled};
use crate::source::{discover_chapters, find_changelog, Chapter};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Separator between chapter containers in the assembled document.
pub const CHAPTER_SEPARATOR: &str = "\n\n";

/// Render `chapters` in order with `pipeline` and reconcile the result once.
///
/// `counter` is advanced by every footnote definition found, so a caller
/// appending more content to the same document can keep numbering from it.
pub fn render_document(
    pipeline: &ChapterPipeline,
    chapters: &[Chapter],
    plain: bool,
    counter: &mut FootnoteCounter,
) -> Result<Reconciled, BookError> {
    let fragments = chapters
        .iter()
        .map(|chapter| {
            pipeline
                .render_chapter(chapter, plain)
                .map_err(|e| chapter_failed(chapter, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    FootnoteReconciler::new().reconcile(&fragments.join(CHAPTER_SEPARATOR), counter)
}

/// Export a book without an async runtime. Chapters render one at a time.
pub fn export_sync(config: &ExportConfig) -> Result<ExportOutput, BookError> {
    let total_start = Instant::now();
    let chapters = start_export(config)?;
    let pipeline = ChapterPipeline::from_config(config);

    let render_start = Instant::now();
    let total = chapters.len();
    let rendered = chapters
        .into_iter()
        .enumerate()
        .map(|(i, chapter)| render_one(&pipeline, config, i + 1, total, chapter))
        .collect::<Result<Vec<_>, _>>()?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    assemble(config, &pipeline, rendered, render_duration_ms, total_start)
}

/// Export a book, rendering up to `config.concurrency` chapters at once on
/// the blocking thread pool.
///
/// The first failing chapter fails the export. Dropping the returned future
/// cancels the export between chapters; a chapter already rendering finishes
/// on its worker and is discarded.
pub async fn export(config: &ExportConfig) -> Result<ExportOutput, BookError> {
    let total_start = Instant::now();
    let chapters = start_export(config)?;
    let pipeline = ChapterPipeline::from_config(config);

    let render_start = Instant::now();
    let total = chapters.len();
    let rendered: Vec<RenderedChapter> =
        stream::iter(chapters.into_iter().enumerate().map(|(i, chapter)| {
            let pipeline = pipeline.clone();
            let config = config.clone();
            async move {
                let task = tokio::task::spawn_blocking(move || {
                    render_one(&pipeline, &config, i + 1, total, chapter)
                });
                match task.await {
                    Ok(result) => result,
                    Err(e) => Err(BookError::Internal(format!(
                        "chapter render task failed: {e}"
                    ))),
                }
            }
        }))
        .buffered(config.concurrency)
        .try_collect()
        .await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        assemble(&config, &pipeline, rendered, render_duration_ms, total_start)
    })
    .await
    .map_err(|e| BookError::Internal(format!("assembly task failed: {e}")))?
}

/// Export a book and write the HTML directly to a file.
///
/// Uses an atomic write (temp file in the same directory + rename) so a
/// failed export never leaves a partial file behind.
pub async fn export_to_file(
    config: &ExportConfig,
    output_path: impl AsRef<Path>,
) -> Result<ExportStats, BookError> {
    let output = export(config).await?;
    let path = output_path.as_ref().to_path_buf();
    let html = output.html;

    tokio::task::spawn_blocking(move || write_atomic(&path, &html))
        .await
        .map_err(|e| BookError::Internal(format!("output task failed: {e}")))??;

    Ok(output.stats)
}

/// Synchronous counterpart of [`export_to_file`].
pub fn export_to_file_sync(
    config: &ExportConfig,
    output_path: impl AsRef<Path>,
) -> Result<ExportStats, BookError> {
    let output = export_sync(config)?;
    write_atomic(output_path.as_ref(), &output.html)?;
    Ok(output.stats)
}

/// Write `contents` to `path` through a temp file persisted over it.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), BookError> {
    let write_failed = |source: std::io::Error| BookError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(contents.as_bytes()).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    debug!("Wrote {} bytes to '{}'", contents.len(), path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A chapter fragment plus the numbers reported for it.
struct RenderedChapter {
    html: String,
    output: ChapterOutput,
}

fn start_export(config: &ExportConfig) -> Result<Vec<Chapter>, BookError> {
    let text_dir = config.text_path();
    info!("Starting export: {}", text_dir.display());

    let chapters = discover_chapters(&text_dir)?;
    info!("Found {} chapters", chapters.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(chapters.len());
    }
    Ok(chapters)
}

fn render_one(
    pipeline: &ChapterPipeline,
    config: &ExportConfig,
    index: usize,
    total: usize,
    chapter: Chapter,
) -> Result<RenderedChapter, BookError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_chapter_start(index, total, &chapter.name);
    }
    let start = Instant::now();
    debug!("Rendering chapter {}/{}: {}", index, total, chapter.name);

    match pipeline.render_chapter(&chapter, config.plain_syntax) {
        Ok(html) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_chapter_complete(index, total, &chapter.name, html.len());
            }
            let output = ChapterOutput {
                index,
                html_len: html.len(),
                duration_ms: start.elapsed().as_millis() as u64,
                name: chapter.name,
                files: chapter.files,
            };
            Ok(RenderedChapter { html, output })
        }
        Err(e) => {
            warn!("Chapter '{}' failed: {}", chapter.name, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_chapter_error(index, total, &chapter.name, &e.to_string());
            }
            Err(chapter_failed(&chapter, e))
        }
    }
}

fn chapter_failed(chapter: &Chapter, source: BookError) -> BookError {
    BookError::ChapterFailed {
        chapter: chapter.name.clone(),
        source: Box::new(source),
    }
}

/// Concatenate, reconcile, append the changelog and compute stats.
fn assemble(
    config: &ExportConfig,
    pipeline: &ChapterPipeline,
    rendered: Vec<RenderedChapter>,
    render_duration_ms: u64,
    total_start: Instant,
) -> Result<ExportOutput, BookError> {
    let (fragments, chapters): (Vec<String>, Vec<ChapterOutput>) =
        rendered.into_iter().map(|r| (r.html, r.output)).unzip();

    let reconciler = FootnoteReconciler::new();
    let mut counter = FootnoteCounter::new();
    let document = reconciler.reconcile(&fragments.join(CHAPTER_SEPARATOR), &mut counter)?;
    let mut html = document.html;
    let mut footnotes = document.definitions;
    let mut dangling = document.dangling_links;

    let changelog = if config.include_changelog {
        find_changelog(&config.text_path())
    } else {
        None
    };
    if let Some(ref path) = changelog {
        debug!("Appending changelog '{}'", path.display());
        let fragment = pipeline
            .render_file(path, true)
            .map_err(|e| BookError::ChapterFailed {
                chapter: "CHANGELOG".to_string(),
                source: Box::new(e),
            })?;
        let log =
            reconciler.reconcile(&wrap_chapter(&fragment, "chapter changelog"), &mut counter)?;
        if !html.is_empty() {
            html.push_str(CHAPTER_SEPARATOR);
        }
        html.push_str(&log.html);
        footnotes += log.definitions;
        dangling += log.dangling_links;
    }

    let stats = ExportStats {
        total_chapters: chapters.len(),
        total_files: chapters.iter().map(|c| c.files.len()).sum(),
        footnotes,
        dangling_footnote_links: dangling,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Export complete: {} chapters, {} footnotes, {}ms total",
        stats.total_chapters, stats.footnotes, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(stats.total_chapters, stats.footnotes);
    }

    Ok(ExportOutput {
        html,
        chapters,
        changelog,
        stats,
    })
}
