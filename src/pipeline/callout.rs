//! Callout containers: `&&&<class>\n<body>&&&` blocks.
//!
//! The first line is the container's class (`callout` when blank); the rest
//! is rendered through the [`MarkupDispatcher`] with the chapter's format, so
//! `**bold**` inside a callout comes out as `<strong>`, not raw text.
//!
//! That render numbers its own footnotes from 1, so a container holding
//! footnotes is marked with [`SCOPE_ATTR`] for the reconciler.

use super::dom::{self, Fragment};
use super::fold_newlines;
use super::footnotes::{has_footnotes, SCOPE_ATTR};
use crate::error::BookError;
use crate::markup::{Format, MarkupDispatcher};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_CALLOUT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)&&&(.*?)&&&").unwrap());

/// Class used when a callout header line is blank.
pub const DEFAULT_CALLOUT_CLASS: &str = "callout";

#[derive(Debug, Clone, Default)]
pub struct CalloutEngine {
    markup: MarkupDispatcher,
}

impl CalloutEngine {
    pub fn new(markup: MarkupDispatcher) -> Self {
        Self { markup }
    }

    /// Replace every `&&&...&&&` span with a rendered `<div>`.
    ///
    /// Errors from the markup backend propagate; text outside callouts is
    /// returned unchanged.
    pub fn render(&self, text: &str, format: Format) -> Result<String, BookError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in RE_CALLOUT_BLOCK.captures_iter(text) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(&self.process(inner.as_str(), format)?);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn process(&self, block: &str, format: Format) -> Result<String, BookError> {
        let (header, body) = block.split_once('\n').unwrap_or((block, ""));
        let class = match header.trim() {
            "" => DEFAULT_CALLOUT_CLASS,
            class => class,
        };
        debug!("Callout .{} ({} bytes)", class, body.len());

        let rendered = self.markup.render(body, format)?;
        let fragment = Fragment::parse(&rendered)?;
        let container = dom::create_element("div", vec![("class", class)]);
        dom::adopt_children(&container, fragment.body());
        if has_footnotes(&container) {
            dom::set_attr(&container, SCOPE_ATTR, "");
        }

        Ok(fold_newlines(&dom::outer_html(&container)?))
    }
}

/// Render callouts with the default markup backends.
pub fn render_callouts(text: &str, format: Format) -> Result<String, BookError> {
    CalloutEngine::default().render(text, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dom::{find_first, has_class, text_content};

    const SOURCE_TEXT: &str = "This is one fancy paragraph.

&&&
This is a callout section.

**This is a strong point**.
&&&

This is the last paragraph.
";

    fn count_divs(html: &str) -> usize {
        html.matches("<div").count()
    }

    #[test]
    fn renders_the_callout_in_its_own_div() {
        let out = render_callouts(SOURCE_TEXT, Format::Markdown).unwrap();
        assert_eq!(count_divs(&out), 1);
        assert!(out.contains("callout section"));
        assert!(out.starts_with("This is one fancy paragraph.\n\n<div"));
        assert!(out.ends_with("</div>\n\nThis is the last paragraph.\n"));
    }

    #[test]
    fn default_class_is_callout() {
        let out = render_callouts(SOURCE_TEXT, Format::Markdown).unwrap();
        assert!(out.contains(r#"<div class="callout">"#), "{out}");
    }

    #[test]
    fn custom_class_from_header_line() {
        let out =
            render_callouts("&&& warning\nThis is the warning &&&", Format::Markdown).unwrap();
        assert_eq!(count_divs(&out), 1);

        let frag = Fragment::parse(&out).unwrap();
        let div = find_first(frag.body(), &|n| has_class(n, "warning")).expect("div.warning");
        assert_eq!(text_content(&div).trim(), "This is the warning");
    }

    #[test]
    fn inner_content_is_rendered_as_markdown() {
        let out = render_callouts(SOURCE_TEXT, Format::Markdown).unwrap();
        assert_eq!(out.matches("<strong>").count(), 1);
        assert!(!out.contains("**"));
    }

    #[test]
    fn inner_content_is_rendered_as_textile() {
        let out = render_callouts("&&& note\nSome *strong* words.\n&&&", Format::Textile).unwrap();
        assert!(
            out.contains(r#"<div class="note"><p>Some <strong>strong</strong> words.</p>"#),
            "{out}"
        );
    }

    #[test]
    fn one_container_per_pair() {
        let text = "&&&\none\n&&&\n\nmiddle\n\n&&& tip\ntwo\n&&&\n\n&&& unterminated";
        let out = render_callouts(text, Format::Markdown).unwrap();
        assert_eq!(count_divs(&out), 2);
        assert!(out.contains(r#"<div class="tip">"#));
        assert!(out.ends_with("&&& unterminated"));
    }

    #[test]
    fn class_attribute_is_escaped() {
        let out = render_callouts("&&& a\"b\nx\n&&&", Format::Markdown).unwrap();
        assert!(out.contains(r#"class="a&quot;b""#), "{out}");
    }

    #[test]
    fn container_with_footnotes_is_marked_as_scope() {
        let text = "&&& tip\nInside.[^b]\n\n[^b]: inner note\n&&&";
        let out = render_callouts(text, Format::Markdown).unwrap();
        assert!(out.starts_with(r#"<div class="tip" data-footnote-scope="">"#), "{out}");

        let plain = render_callouts("&&& tip\nNo notes.\n&&&", Format::Markdown).unwrap();
        assert!(!plain.contains(SCOPE_ATTR), "{plain}");
    }

    #[test]
    fn container_is_a_single_line() {
        let out = render_callouts("&&&\npara one\n\npara two\n&&&", Format::Markdown).unwrap();
        assert!(!out.contains('\n'), "{out}");
    }
}
