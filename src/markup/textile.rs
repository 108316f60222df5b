//! Textile backend covering the subset used by book chapters.
//!
//! Block rules are matched per blank-line-separated block; inline rules are
//! cheap, ordered regex passes in the same style as the other text cleanup
//! code in this crate. Raw HTML blocks and `<notextile>` spans are copied
//! through untouched, which is how already-rendered snippet and callout
//! fragments survive the textile pass.
//!
//! `<notextile>` spans are lifted out before any rule runs and restored at
//! the end without their tags. A span alone on its line is a block of its
//! own, even directly under a paragraph; anywhere else it stays inline.
//! Text outside tags and entities is HTML-escaped.
//!
//! Footnotes follow the RedCloth conventions: `fn1. text` defines
//! `<p class="footnote" id="fn1">` and `word[1]` references it through
//! `<sup class="footnote" id="fnr1">`.

use super::Markup;
use crate::error::BookError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, Default)]
pub struct TextileRenderer;

impl Markup for TextileRenderer {
    fn render(&self, text: &str) -> Result<String, BookError> {
        let text = text.replace("\r\n", "\n");
        let mut raw = Vec::new();
        let text = RE_NOTEXTILE.replace_all(&text, |caps: &Captures| {
            raw.push(caps[1].to_string());
            placeholder(raw.len() - 1)
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        for block in split_blocks(&text) {
            out.push_str(&render_block(&block));
            out.push('\n');
        }

        let out = RE_PLACEHOLDER.replace_all(&out, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| raw.get(i))
                .cloned()
                .unwrap_or_default()
        });
        Ok(out.into_owned())
    }
}

// ── Passthrough ──────────────────────────────────────────────────────────────

static RE_NOTEXTILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<notextile>(.*?)</notextile>").unwrap());
static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").unwrap());
static RE_PLACEHOLDER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\x{E000}\d+\x{E001}$").unwrap());

/// Stand-in for the `index`-th `<notextile>` span; no rule matches it.
fn placeholder(index: usize) -> String {
    format!("\u{E000}{index}\u{E001}")
}

// ── Block splitting ──────────────────────────────────────────────────────────

/// Split on blank lines. A line holding only a passthrough span is a block
/// by itself.
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let passthrough = RE_PLACEHOLDER_LINE.is_match(line.trim());
        if passthrough || line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            if passthrough {
                blocks.push(line.trim().to_string());
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

// ── Block rules ──────────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^h([1-6])\.\s+(.*)$").unwrap());
static RE_FOOTNOTE_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^fn(\d+)\.\s+(.*)$").unwrap());
static RE_BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^bq\.\s+(.*)$").unwrap());
static RE_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^p\.\s+(.*)$").unwrap());
static RE_BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^</?(div|pre|table|ul|ol|dl|blockquote|h[1-6]|p|section|figure|hr)[\s>/]",
    )
    .unwrap()
});

fn render_block(block: &str) -> String {
    let trimmed = block.trim_start();

    if RE_PLACEHOLDER_LINE.is_match(trimmed) || RE_BLOCK_TAG.is_match(trimmed) {
        return block.to_string();
    }
    if let Some(caps) = RE_HEADING.captures(trimmed) {
        return format!("<h{0}>{1}</h{0}>", &caps[1], render_inline(&caps[2]));
    }
    if let Some(caps) = RE_FOOTNOTE_DEF.captures(trimmed) {
        let n = &caps[1];
        return format!(
            r##"<p class="footnote" id="fn{n}"><a href="#fnr{n}"><sup>{n}</sup></a> {}</p>"##,
            render_inline(&caps[2])
        );
    }
    if let Some(caps) = RE_BLOCKQUOTE.captures(trimmed) {
        return format!(
            "<blockquote>\n<p>{}</p>\n</blockquote>",
            render_lines(&caps[1])
        );
    }
    if is_list(trimmed) {
        return render_list(trimmed);
    }
    let body = RE_PARAGRAPH
        .captures(trimmed)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| trimmed.to_string());
    format!("<p>{}</p>", render_lines(&body))
}

fn render_lines(text: &str) -> String {
    text.lines()
        .map(render_inline)
        .collect::<Vec<_>>()
        .join("<br />\n")
}

// ── Lists ────────────────────────────────────────────────────────────────────

static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([*#])\s+(.*)$").unwrap());

fn is_list(block: &str) -> bool {
    block.lines().all(|l| RE_LIST_ITEM.is_match(l))
}

fn render_list(block: &str) -> String {
    let ordered = block.starts_with('#');
    let tag = if ordered { "ol" } else { "ul" };
    let items: String = block
        .lines()
        .filter_map(|l| RE_LIST_ITEM.captures(l))
        .map(|caps| format!("\t<li>{}</li>\n", render_inline(&caps[2])))
        .collect();
    format!("<{tag}>\n{items}</{tag}>")
}

// ── Inline rules ─────────────────────────────────────────────────────────────

static RE_FOOTNOTE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S)\[(\d+)\]").unwrap());
static RE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)":([^\s<]*[^\s<.,;:!?)])"#).unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([^\s@](?:[^@]*[^\s@])?)@").unwrap());
static RE_STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^\s*](?:[^*]*[^\s*])?)\*").unwrap());
static RE_EM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[\s(>])_([^\s_](?:[^_]*[^\s_])?)_").unwrap());

static RE_INLINE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][^<>]*>").unwrap());
static RE_ESCAPABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(&(?:#\d+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);)|[&<>]").unwrap());

/// Escape `&`, `<` and `>` outside inline tags, leaving entities alone.
fn escape_text(text: &str) -> String {
    let escape = |plain: &str| {
        RE_ESCAPABLE
            .replace_all(plain, |caps: &Captures| match (caps.get(1), &caps[0]) {
                (Some(entity), _) => entity.as_str().to_string(),
                (None, "&") => "&amp;".to_string(),
                (None, "<") => "&lt;".to_string(),
                (None, _) => "&gt;".to_string(),
            })
            .into_owned()
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for tag in RE_INLINE_TAG.find_iter(text) {
        out.push_str(&escape(&text[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&escape(&text[last..]));
    out
}

fn render_inline(text: &str) -> String {
    let text = escape_text(text);
    let s = RE_FOOTNOTE_REF.replace_all(
        &text,
        r##"$1<sup class="footnote" id="fnr$2"><a href="#fn$2">$2</a></sup>"##,
    );
    let s = RE_LINK.replace_all(&s, r#"<a href="$2">$1</a>"#);
    let s = RE_CODE.replace_all(&s, "<code>$1</code>");
    let s = RE_STRONG.replace_all(&s, "<strong>$1</strong>");
    let s = RE_EM.replace_all(&s, "$1<em>$2</em>");
    s.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> String {
        TextileRenderer.render(text).unwrap()
    }

    #[test]
    fn paragraphs_and_headings() {
        let html = render("h2. Title\n\nFirst line\nsecond line\n\np. Explicit");
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains("<p>First line<br />\nsecond line</p>"));
        assert!(html.contains("<p>Explicit</p>"));
    }

    #[test]
    fn inline_phrases() {
        let html = render("A *strong* and _em_ with @code@ and \"a link\":http://example.org.");
        assert!(html.contains("<strong>strong</strong>"), "{html}");
        assert!(html.contains("<em>em</em>"), "{html}");
        assert!(html.contains("<code>code</code>"), "{html}");
        assert!(html.contains(r#"<a href="http://example.org">a link</a>."#), "{html}");
    }

    #[test]
    fn underscores_inside_words_are_left_alone() {
        let html = render("call some_function_name now");
        assert!(!html.contains("<em>"), "{html}");
    }

    #[test]
    fn footnotes_follow_fn_fnr_convention() {
        let html = render("See this[1].\n\nfn1. The note.");
        assert!(html.contains(r##"<sup class="footnote" id="fnr1"><a href="#fn1">1</a></sup>"##));
        assert!(html.contains(r#"<p class="footnote" id="fn1">"#));
        assert!(html.contains(r##"<a href="#fnr1"><sup>1</sup></a> The note."##));
    }

    #[test]
    fn notextile_spans_blank_lines() {
        let html = render("<notextile><pre>a\n\n*b*</pre></notextile>\n\nafter");
        assert!(html.contains("<pre>a\n\n*b*</pre>"), "{html}");
        assert!(!html.contains("notextile"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn notextile_right_under_a_paragraph_is_its_own_block() {
        let snippet = r#"<div class="highlight"><pre><code>x = a*b*c</code></pre></div>"#;
        let html = render(&format!("Consider this:\n<notextile>{snippet}</notextile>\nAfter."));
        assert!(html.contains("<p>Consider this:</p>"), "{html}");
        assert!(html.contains(snippet), "{html}");
        assert!(html.contains("<p>After.</p>"), "{html}");
        assert!(!html.contains("notextile"), "{html}");
        assert!(!html.contains("<strong>"), "{html}");
        assert!(!html.contains("<p><div"), "{html}");
    }

    #[test]
    fn inline_notextile_is_kept_verbatim() {
        let html = render("Say <notextile>*as is*</notextile> and *bold*.");
        assert_eq!(html, "<p>Say *as is* and <strong>bold</strong>.</p>\n");
    }

    #[test]
    fn plain_text_is_escaped() {
        let html = render("Fish & chips, a < b > c, &amp; stays, <em>tags</em> stay.");
        assert!(html.contains("Fish &amp; chips, a &lt; b &gt; c, &amp; stays"), "{html}");
        assert!(html.contains("<em>tags</em> stay."), "{html}");
        assert!(!html.contains("&amp;amp;"), "{html}");
    }

    #[test]
    fn code_phrases_are_escaped() {
        let html = render("Use @a < b && c@ here.");
        assert!(html.contains("<code>a &lt; b &amp;&amp; c</code>"), "{html}");
    }

    #[test]
    fn raw_html_blocks_pass_through() {
        let html = render("<div class=\"callout\"><p>*kept*</p></div>");
        assert!(html.contains("<div class=\"callout\"><p>*kept*</p></div>"));
    }

    #[test]
    fn lists() {
        let html = render("* one\n* two\n\n# first\n# second");
        assert!(html.contains("<ul>\n\t<li>one</li>\n\t<li>two</li>\n</ul>"));
        assert!(html.contains("<ol>\n\t<li>first</li>"));
    }

    #[test]
    fn blockquote() {
        let html = render("bq. Quoted text");
        assert!(html.contains("<blockquote>\n<p>Quoted text</p>\n</blockquote>"));
    }
}
