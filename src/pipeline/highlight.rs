//! Syntax-highlighting hook.
//!
//! The coloring itself is pluggable: any [`Highlighter`] turning
//! `(code, language)` into an HTML fragment can be injected through
//! [`crate::config::ExportConfigBuilder::highlighter`]. The snippet engine
//! looks for an element with class `highlight` in whatever comes back to
//! attach the filename caption, so implementations should keep that wrapper.

use super::dom;
use std::sync::Arc;
use tracing::warn;

/// Turns a piece of source code into highlighted HTML.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, code: &str, language: &str) -> String;
}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type SharedHighlighter = Arc<dyn Highlighter>;

/// Default highlighter: no coloring, only the
/// `<div class="highlight"><pre><code class="language-…">` structure with the
/// code escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, code: &str, language: &str) -> String {
        let class = format!("language-{language}");
        let wrapper = dom::create_element("div", vec![("class", "highlight")]);
        let pre = dom::create_element("pre", vec![]);
        let code_el = dom::create_element("code", vec![("class", &class), ("data-lang", language)]);
        dom::append_child(&code_el, dom::create_text(code));
        dom::append_child(&pre, code_el);
        dom::append_child(&wrapper, pre);

        dom::outer_html(&wrapper).unwrap_or_else(|e| {
            warn!("Highlighter could not serialise {} block: {}", language, e);
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_structure() {
        let html = PlainHighlighter.highlight("puts 1", "ruby");
        assert_eq!(
            html,
            r#"<div class="highlight"><pre><code class="language-ruby" data-lang="ruby">puts 1</code></pre></div>"#
        );
    }

    #[test]
    fn plain_output_escapes_markup() {
        let html = PlainHighlighter.highlight("<b>&</b>", "html");
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"), "{html}");
    }
}
