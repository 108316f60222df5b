//! One chapter, start to finish: snippets → callouts → markup.
//!
//! The output is a chapter fragment wrapped in `<div class="chapter">`, each
//! source file in its own `<div class="chapter-file">`. Footnote ids inside
//! a file are still local to it; see [`super::footnotes`] for the
//! document-wide pass.

use super::callout::CalloutEngine;
use super::highlight::PlainHighlighter;
use super::snippet::SnippetEngine;
use crate::config::ExportConfig;
use crate::error::BookError;
use crate::markup::{Format, MarkupDispatcher};
use crate::source::{Chapter, FsReader, SourceReader};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Separator between the files of one chapter.
pub const FILE_SEPARATOR: &str = "\n\n";

#[derive(Clone)]
pub struct ChapterPipeline {
    snippets: SnippetEngine,
    callouts: CalloutEngine,
    markup: MarkupDispatcher,
    reader: Arc<dyn SourceReader>,
}

impl std::fmt::Debug for ChapterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterPipeline")
            .field("snippets", &self.snippets)
            .field("markup", &self.markup)
            .finish_non_exhaustive()
    }
}

impl ChapterPipeline {
    pub fn new(
        snippets: SnippetEngine,
        callouts: CalloutEngine,
        markup: MarkupDispatcher,
        reader: Arc<dyn SourceReader>,
    ) -> Self {
        Self {
            snippets,
            callouts,
            markup,
            reader,
        }
    }

    /// Pipeline reading from disk with the default markup backends, code
    /// files resolved under `code_root`.
    pub fn with_code_root(code_root: impl AsRef<Path>) -> Self {
        let reader: Arc<dyn SourceReader> = Arc::new(FsReader);
        let markup = MarkupDispatcher::default();
        Self::new(
            SnippetEngine::new(code_root.as_ref(), reader.clone(), Arc::new(PlainHighlighter)),
            CalloutEngine::new(markup.clone()),
            markup,
            reader,
        )
    }

    /// Pipeline for an export: code under `<root>/<code_dir>`, the configured
    /// highlighter, files read from disk.
    pub fn from_config(config: &ExportConfig) -> Self {
        let reader: Arc<dyn SourceReader> = Arc::new(FsReader);
        let markup = MarkupDispatcher::default();
        Self::new(
            SnippetEngine::new(config.code_path(), reader.clone(), config.highlighter.clone()),
            CalloutEngine::new(markup.clone()),
            markup,
            reader,
        )
    }

    /// Render raw chapter text written in `format`.
    pub fn render_text(
        &self,
        text: &str,
        format: Format,
        plain: bool,
    ) -> Result<String, BookError> {
        let text = self.snippets.render(text, format, plain);
        let text = self.callouts.render(&text, format)?;
        self.markup.render(&text, format)
    }

    /// Read one file and render it with the format its extension implies.
    pub fn render_file(&self, path: &Path, plain: bool) -> Result<String, BookError> {
        let text = self
            .reader
            .read_to_string(path)
            .map_err(|e| BookError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let format = Format::from_path(path);
        debug!("Rendering '{}' as {}", path.display(), format);
        self.render_text(&text, format, plain)
    }

    /// Render every file of `chapter` and wrap the result in the chapter
    /// container.
    pub fn render_chapter(&self, chapter: &Chapter, plain: bool) -> Result<String, BookError> {
        let parts = chapter
            .files
            .iter()
            .map(|path| Ok(wrap_chapter(&self.render_file(path, plain)?, "chapter-file")))
            .collect::<Result<Vec<_>, BookError>>()?;
        Ok(wrap_chapter(&parts.join(FILE_SEPARATOR), "chapter"))
    }
}

/// Wrap a rendered fragment in a `<div>` container with `class`.
pub(crate) fn wrap_chapter(html: &str, class: &str) -> String {
    format!("<div class=\"{class}\">\n{html}\n</div>")
}
