//! Code-snippet inclusion: `@@@ <header>\n<body>@@@` blocks.
//!
//! The header line is `<language>( <file>(:<start>,<end> | #<block>)? )?`:
//!
//! | Header                     | Mode        | Code                                  |
//! |----------------------------|-------------|---------------------------------------|
//! | `ruby`                     | Inline      | the block body                        |
//! | `ruby app.rb`              | WholeFile   | `code/app.rb`                         |
//! | `ruby app.rb:15,20`        | Range       | lines 15–20 of `code/app.rb`          |
//! | `ruby app.rb#setup`        | Block       | between `@begin:setup` / `@end:setup` |
//!
//! Resolution failures never abort the chapter: the [`SnippetError`] text
//! (e.g. `[missing 'code/app.rb' file]`) is highlighted in place of the code.
//!
//! The highlighted fragment is emitted on a single line (newlines become
//! `&#10;`) so markdown and textile keep it as one raw HTML block even when
//! the code contains blank lines. Textile output is additionally wrapped in
//! `<notextile>`.

use super::dom::{self, Fragment};
use super::fold_newlines;
use super::highlight::{PlainHighlighter, SharedHighlighter};
use crate::error::{BookError, SnippetError};
use crate::markup::Format;
use crate::source::{FsReader, SourceReader};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

static RE_SNIPPET_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)@@@(.*?)@@@").unwrap());
static RE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^ ]+)(?: ([^:#]+)(?:(:|#)(.*?))?)?$").unwrap());
static RE_SENTINEL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[^\n]*@(?:begin|end):[^\n]*(?:\n|$)").unwrap());
static RE_BLOCK_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());

/// Which part of the source becomes the included code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Inline,
    WholeFile,
    Range,
    Block,
}

/// Parsed header line of a snippet block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetDirective {
    pub language: Option<String>,
    /// Path relative to the `code/` directory.
    pub file_path: Option<String>,
    pub mode: AddressMode,
    /// Raw text after `:` or `#`.
    pub reference: Option<String>,
}

impl SnippetDirective {
    /// Parse a header line. Whitespace is squished first; a header that does
    /// not match the grammar is an inline block without a language.
    pub fn parse(header: &str) -> Self {
        let squished = header.split_whitespace().collect::<Vec<_>>().join(" ");
        let Some(caps) = RE_HEADER.captures(&squished) else {
            return Self {
                language: None,
                file_path: None,
                mode: AddressMode::Inline,
                reference: None,
            };
        };

        let language = caps.get(1).map(|m| m.as_str().to_string());
        let file_path = caps.get(2).map(|m| m.as_str().to_string());
        let modifier = caps.get(3).map(|m| m.as_str());
        let reference = caps.get(4).map(|m| m.as_str().to_string());

        let mode = match (modifier, &file_path) {
            (Some("#"), _) => AddressMode::Block,
            (Some(":"), _) => AddressMode::Range,
            (_, Some(_)) => AddressMode::WholeFile,
            _ => AddressMode::Inline,
        };

        Self {
            language,
            file_path,
            mode,
            reference,
        }
    }
}

/// 1-indexed, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Parse `"start,end"`; both must be positive with `start <= end`.
    pub fn parse(reference: &str) -> Result<Self, SnippetError> {
        let invalid = || SnippetError::InvalidRange {
            reference: reference.to_string(),
        };
        let (start, end) = reference.split_once(',').ok_or_else(invalid)?;
        let start: usize = start.trim().parse().map_err(|_| invalid())?;
        let end: usize = end.trim().parse().map_err(|_| invalid())?;
        if start == 0 || start > end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

/// Replaces `@@@` blocks with highlighted HTML.
#[derive(Clone)]
pub struct SnippetEngine {
    code_root: PathBuf,
    reader: Arc<dyn SourceReader>,
    highlighter: SharedHighlighter,
}

impl std::fmt::Debug for SnippetEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetEngine")
            .field("code_root", &self.code_root)
            .finish_non_exhaustive()
    }
}

impl SnippetEngine {
    /// `code_root` is the directory file paths in headers are relative to.
    pub fn new(
        code_root: impl Into<PathBuf>,
        reader: Arc<dyn SourceReader>,
        highlighter: SharedHighlighter,
    ) -> Self {
        Self {
            code_root: code_root.into(),
            reader,
            highlighter,
        }
    }

    /// Replace every `@@@...@@@` span in `text`. `plain` forces the `text`
    /// language for every block.
    pub fn render(&self, text: &str, format: Format, plain: bool) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in RE_SNIPPET_BLOCK.captures_iter(text) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(&self.process(inner.as_str(), format, plain));
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }

    fn process(&self, block: &str, format: Format, plain: bool) -> String {
        let (header, body) = block.split_once('\n').unwrap_or((block, ""));
        let directive = SnippetDirective::parse(header);
        debug!("Snippet {:?}", directive);

        let language = if plain {
            "text"
        } else {
            directive.language.as_deref().unwrap_or("text")
        };

        let code = self.resolve(&directive, body).unwrap_or_else(|e| {
            warn!("Snippet could not be resolved: {}", e);
            e.to_string()
        });

        let highlighted = self.highlighter.highlight(&code, language);
        let html = match finish_fragment(&highlighted, directive.file_path.as_deref()) {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not post-process highlighted snippet: {}", e);
                highlighted
            }
        };
        let html = fold_newlines(&html);

        if format == Format::Textile {
            format!("<notextile>{html}</notextile>")
        } else {
            html
        }
    }

    /// Produce the code for a directive.
    pub fn resolve(
        &self,
        directive: &SnippetDirective,
        body: &str,
    ) -> Result<String, SnippetError> {
        let Some(file) = directive.file_path.as_deref() else {
            return Ok(trim_trailing_newlines(&strip_indent(body)));
        };

        let content = self.read_code(file)?;
        let reference = directive.reference.as_deref().unwrap_or("");
        let code = match directive.mode {
            AddressMode::Range => extract_range(&content, reference)?,
            AddressMode::Block => extract_block(&content, reference)?,
            AddressMode::WholeFile | AddressMode::Inline => content,
        };
        Ok(trim_trailing_newlines(&strip_sentinels(&code)))
    }

    fn read_code(&self, file: &str) -> Result<String, SnippetError> {
        let path = self.code_root.join(file);
        self.reader.read_to_string(&path).map_err(|e| {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to read '{}': {}", path.display(), e);
            }
            SnippetError::MissingFile {
                path: file.to_string(),
            }
        })
    }
}

/// Render snippets with the default reader and highlighter, resolving files
/// under `<root_dir>/code`.
pub fn render_snippets(text: &str, root_dir: &Path, format: Format, plain: bool) -> String {
    SnippetEngine::new(
        root_dir.join("code"),
        Arc::new(FsReader),
        Arc::new(PlainHighlighter),
    )
    .render(text, format, plain)
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Lines `start..=end` of `content`; an end past EOF is clamped.
pub fn extract_range(content: &str, reference: &str) -> Result<String, SnippetError> {
    let range = LineRange::parse(reference)?;
    let lines: Vec<&str> = content.lines().collect();
    if range.start > lines.len() {
        return Err(SnippetError::InvalidRange {
            reference: reference.to_string(),
        });
    }
    let end = range.end.min(lines.len());
    Ok(strip_indent(&lines[range.start - 1..end].join("\n")))
}

/// Text strictly between `@begin:<name>` and `@end:<name>` (case-insensitive).
pub fn extract_block(content: &str, name: &str) -> Result<String, SnippetError> {
    let missing = || SnippetError::MissingBlock {
        name: name.to_string(),
    };
    if !RE_BLOCK_NAME.is_match(name) {
        return Err(missing());
    }
    let pattern = format!(
        r"(?is)@begin: *{name}\b[^\n]*\n(.*?)[^\n]*@end: *{name}\b",
        name = regex::escape(name)
    );
    let re = Regex::new(&pattern).map_err(|_| missing())?;
    let caps = re.captures(content).ok_or_else(missing)?;
    let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let inner = inner.strip_suffix('\n').unwrap_or(inner);
    Ok(strip_indent(inner))
}

/// Remove the indentation shared by every non-blank line.
pub fn strip_indent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|l| match l.get(..indent) {
            Some(prefix) if prefix.chars().all(|c| c == ' ' || c == '\t') => &l[indent..],
            _ => l.trim_start_matches([' ', '\t']),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_sentinels(code: &str) -> String {
    RE_SENTINEL_LINE.replace_all(code, "").into_owned()
}

fn trim_trailing_newlines(code: &str) -> String {
    code.trim_end_matches('\n').to_string()
}

// ── Fragment post-processing ─────────────────────────────────────────────────

/// Normalise the highlighter output through the DOM and, when the snippet
/// came from a file, insert `<span class="filename">./code/<file></span>` as
/// the first child of the `.highlight` container.
fn finish_fragment(html: &str, file: Option<&str>) -> Result<String, BookError> {
    let fragment = Fragment::parse(html)?;

    if let Some(file) = file {
        let container = dom::find_first(fragment.body(), &|n| dom::has_class(n, "highlight"))
            .or_else(|| {
                fragment
                    .body()
                    .children
                    .borrow()
                    .iter()
                    .find(|c| dom::is_element(c))
                    .cloned()
            });

        match container {
            Some(container) => {
                let caption = dom::create_element("span", vec![("class", "filename")]);
                dom::append_child(&caption, dom::create_text(&format!("./code/{file}")));
                dom::prepend_child(&container, caption);
            }
            None => debug!("No element to attach the '{}' caption to", file),
        }
    }

    fragment.to_html()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dom::{find_element, text_content};
    use std::fs;

    fn engine(root: &Path) -> SnippetEngine {
        SnippetEngine::new(
            root.join("code"),
            Arc::new(FsReader),
            Arc::new(PlainHighlighter),
        )
    }

    fn write_code(root: &Path, name: &str, content: &str) {
        let path = root.join("code").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Text of the first `<code>` element in `html`.
    fn code_text(html: &str) -> String {
        let frag = Fragment::parse(html).unwrap();
        text_content(&find_element(frag.body(), "code").expect("no <code> element"))
    }

    // ── Directive grammar ────────────────────────────────────────────────

    #[test]
    fn directive_inline() {
        let d = SnippetDirective::parse("ruby");
        assert_eq!(d.language.as_deref(), Some("ruby"));
        assert_eq!(d.file_path, None);
        assert_eq!(d.mode, AddressMode::Inline);
    }

    #[test]
    fn directive_whole_file() {
        let d = SnippetDirective::parse("  ruby   lib/app.rb  ");
        assert_eq!(d.file_path.as_deref(), Some("lib/app.rb"));
        assert_eq!(d.mode, AddressMode::WholeFile);
        assert_eq!(d.reference, None);
    }

    #[test]
    fn directive_range_and_block() {
        let d = SnippetDirective::parse("ruby app.rb:15,20");
        assert_eq!(d.mode, AddressMode::Range);
        assert_eq!(d.file_path.as_deref(), Some("app.rb"));
        assert_eq!(d.reference.as_deref(), Some("15,20"));

        let d = SnippetDirective::parse("ruby app.rb#setup");
        assert_eq!(d.mode, AddressMode::Block);
        assert_eq!(d.reference.as_deref(), Some("setup"));
    }

    #[test]
    fn directive_blank_header_is_inline_without_language() {
        let d = SnippetDirective::parse("   ");
        assert_eq!(d.language, None);
        assert_eq!(d.mode, AddressMode::Inline);
    }

    #[test]
    fn line_range_validation() {
        assert_eq!(LineRange::parse("3,5").unwrap(), LineRange { start: 3, end: 5 });
        assert_eq!(LineRange::parse(" 3 , 3 ").unwrap(), LineRange { start: 3, end: 3 });
        assert!(LineRange::parse("5,3").is_err());
        assert!(LineRange::parse("0,3").is_err());
        assert!(LineRange::parse("a,b").is_err());
        assert!(LineRange::parse("7").is_err());
    }

    // ── Extraction ───────────────────────────────────────────────────────

    #[test]
    fn range_is_one_indexed_inclusive_and_dedented() {
        let file: String = (1..=10).map(|i| format!("    line{i}\n")).collect();
        let file = file.replace("    line4", "      line4");
        assert_eq!(
            extract_range(&file, "3,5").unwrap(),
            "line3\n  line4\nline5"
        );
    }

    #[test]
    fn range_end_past_eof_is_clamped() {
        assert_eq!(extract_range("a\nb\nc\n", "2,99").unwrap(), "b\nc");
        assert!(matches!(
            extract_range("a\nb\n", "5,6"),
            Err(SnippetError::InvalidRange { .. })
        ));
    }

    #[test]
    fn block_extraction_excludes_sentinels() {
        let file = "@begin:demo\nA\nB\n@end:demo";
        assert_eq!(extract_block(file, "demo").unwrap(), "A\nB");
    }

    #[test]
    fn block_extraction_is_case_insensitive_and_dedents() {
        let file = "class App\n  # @BEGIN:Setup\n  def setup\n    run\n  end\n  # @End:setup\nend\n";
        assert_eq!(extract_block(file, "setup").unwrap(), "def setup\n  run\nend");
    }

    #[test]
    fn block_name_must_match_whole_word() {
        let file = "@begin:demo2\nX\n@end:demo2\n";
        assert_eq!(
            extract_block(file, "demo").unwrap_err().to_string(),
            "[missing 'demo' block name]"
        );
    }

    #[test]
    fn undefined_block_yields_placeholder() {
        let err = extract_block("nothing here", "demo").unwrap_err();
        assert_eq!(err.to_string(), "[missing 'demo' block name]");
    }

    #[test]
    fn strip_indent_uses_common_indentation() {
        assert_eq!(strip_indent("    a\n      b\n\n    c"), "a\n  b\n\nc");
        assert_eq!(strip_indent("a\n  b"), "a\n  b");
    }

    // ── Engine ───────────────────────────────────────────────────────────

    #[test]
    fn inline_block_is_highlighted() {
        let tmp = tempfile::tempdir().unwrap();
        let out = engine(tmp.path()).render(
            "Before\n\n@@@ ruby\n    puts 1\n    puts 2\n@@@\n\nAfter",
            Format::Markdown,
            false,
        );
        assert!(out.starts_with("Before\n\n<div class=\"highlight\">"), "{out}");
        assert!(out.ends_with("</div>\n\nAfter"), "{out}");
        assert!(out.contains("language-ruby"));
        assert_eq!(code_text(&out), "puts 1\nputs 2");
        assert!(!out.contains("filename"));
    }

    #[test]
    fn fragment_is_a_single_line() {
        let tmp = tempfile::tempdir().unwrap();
        let out = engine(tmp.path()).render("@@@ text\na\n\nb\n@@@", Format::Markdown, false);
        assert!(!out.contains('\n'), "{out}");
        assert!(out.contains("a&#10;&#10;b"), "{out}");
    }

    #[test]
    fn range_scenario_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_code(tmp.path(), "app.rb", "one\ntwo\nthree\nfour\nfive\n");
        let out =
            engine(tmp.path()).render("@@@ ruby app.rb:2,3 @@@\n@@@", Format::Markdown, false);

        assert_eq!(code_text(&out), "two\nthree");
        assert!(out.contains(r#"<span class="filename">./code/app.rb</span>"#), "{out}");
        assert!(out.ends_with("\n@@@"), "unmatched trailing marker is kept: {out}");
    }

    #[test]
    fn caption_is_first_child_of_highlight_container() {
        let tmp = tempfile::tempdir().unwrap();
        write_code(tmp.path(), "app.rb", "puts 1\n");
        let out = engine(tmp.path()).render("@@@ ruby app.rb @@@", Format::Markdown, false);
        assert!(
            out.starts_with(
                r#"<div class="highlight"><span class="filename">./code/app.rb</span><pre>"#
            ),
            "{out}"
        );
    }

    #[test]
    fn whole_file_strips_sentinel_lines() {
        let tmp = tempfile::tempdir().unwrap();
        write_code(
            tmp.path(),
            "app.rb",
            "class App\n  # @begin:init\n  def initialize; end\n  # @end:init\nend\n",
        );
        let out = engine(tmp.path()).render("@@@ ruby app.rb @@@", Format::Markdown, false);
        assert_eq!(code_text(&out), "class App\n  def initialize; end\nend");
    }

    #[test]
    fn block_mode_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_code(tmp.path(), "ruby/app.rb", "x = 1\n# @begin:demo\nA\nB\n# @end:demo\n");
        let out =
            engine(tmp.path()).render("@@@ ruby ruby/app.rb#demo @@@", Format::Markdown, false);
        assert_eq!(code_text(&out), "A\nB");
    }

    #[test]
    fn missing_block_degrades_to_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        write_code(tmp.path(), "app.rb", "puts 1\n");
        let out = engine(tmp.path()).render("@@@ ruby app.rb#demo @@@", Format::Markdown, false);
        assert_eq!(code_text(&out), "[missing 'demo' block name]");
    }

    #[test]
    fn missing_file_degrades_in_every_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let e = engine(tmp.path());
        for header in ["ruby nope.rb", "ruby nope.rb:1,2", "ruby nope.rb#demo"] {
            let out = e.render(&format!("@@@ {header} @@@"), Format::Markdown, false);
            assert_eq!(code_text(&out), "[missing 'code/nope.rb' file]", "{header}");
        }
    }

    #[test]
    fn plain_mode_forces_text_language() {
        let tmp = tempfile::tempdir().unwrap();
        let out = engine(tmp.path()).render("@@@ ruby\nputs 1\n@@@", Format::Markdown, true);
        assert!(out.contains("language-text"), "{out}");
        assert!(!out.contains("language-ruby"));
    }

    #[test]
    fn textile_output_is_protected() {
        let tmp = tempfile::tempdir().unwrap();
        let out = engine(tmp.path()).render("@@@ ruby\nputs 1\n@@@", Format::Textile, false);
        assert!(out.starts_with("<notextile><div class=\"highlight\">"), "{out}");
        assert!(out.ends_with("</div></notextile>"), "{out}");
    }

    #[test]
    fn unmatched_marker_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let text = "intro\n@@@ ruby\nputs 1\n";
        assert_eq!(engine(tmp.path()).render(text, Format::Markdown, false), text);
    }

    #[test]
    fn free_function_resolves_under_code_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_code(tmp.path(), "a.py", "print(1)\n");
        let out = render_snippets("@@@ python a.py @@@", tmp.path(), Format::Markdown, false);
        assert_eq!(code_text(&out), "print(1)");
    }
}
