//! CommonMark backend built on `pulldown-cmark`.
//!
//! Footnotes are rewritten on the event stream so that every chapter uses the
//! `fn<N>` / `fnr<N>` id convention the footnote reconciler understands.
//! Numbering restarts at 1 on every call, exactly like the chapter-local
//! numbering the reconciler later makes global.

use super::Markup;
use crate::error::BookError;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;

/// Markdown renderer with tables, strikethrough and footnotes enabled.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self { options }
    }
}

impl MarkdownRenderer {
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }
}

impl Markup for MarkdownRenderer {
    fn render(&self, text: &str) -> Result<String, BookError> {
        let mut numbers = FootnoteNumbers::default();
        let mut open_definition: Option<usize> = None;

        let events = Parser::new_ext(text, self.options).map(|event| match event {
            Event::FootnoteReference(label) => {
                let n = numbers.get(&label);
                Event::InlineHtml(CowStr::from(format!(
                    r##"<sup class="footnote" id="fnr{n}"><a href="#fn{n}">{n}</a></sup>"##
                )))
            }
            Event::Start(Tag::FootnoteDefinition(label)) => {
                let n = numbers.get(&label);
                open_definition = Some(n);
                Event::Html(CowStr::from(format!(
                    r#"<div class="footnote" id="fn{n}">"#
                )))
            }
            Event::End(TagEnd::FootnoteDefinition) => {
                let close = match open_definition.take() {
                    Some(n) => format!(
                        "<a href=\"#fnr{n}\" class=\"footnote-backref\">&#8617;</a></div>\n"
                    ),
                    None => "</div>\n".to_string(),
                };
                Event::Html(CowStr::from(close))
            }
            other => other,
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, events);
        Ok(out)
    }
}

/// Assigns 1-based numbers to footnote labels in order of first appearance.
#[derive(Default)]
struct FootnoteNumbers(HashMap<String, usize>);

impl FootnoteNumbers {
    fn get(&mut self, label: &str) -> usize {
        let next = self.0.len() + 1;
        *self.0.entry(label.to_string()).or_insert(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> String {
        MarkdownRenderer::default().render(text).unwrap()
    }

    #[test]
    fn renders_paragraphs_and_emphasis() {
        let html = render("Hello *world*.\n\nSecond **para**.");
        assert!(html.contains("<p>Hello <em>world</em>.</p>"));
        assert!(html.contains("<strong>para</strong>"));
    }

    #[test]
    fn raw_html_blocks_pass_through() {
        let html = render("<div class=\"warning\"><p>x</p></div>\n\nafter");
        assert!(html.contains("<div class=\"warning\"><p>x</p></div>"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn footnotes_use_fn_and_fnr_ids() {
        let html = render("Text[^a] and more[^b].\n\n[^a]: First.\n[^b]: Second.\n");
        assert!(html.contains(r##"id="fnr1"><a href="#fn1">1</a>"##), "{html}");
        assert!(html.contains(r##"id="fnr2"><a href="#fn2">2</a>"##), "{html}");
        assert!(html.contains(r#"<div class="footnote" id="fn1">"#), "{html}");
        assert!(html.contains(r#"<div class="footnote" id="fn2">"#), "{html}");
        assert!(html.contains(r##"href="#fnr1""##), "{html}");
    }

    #[test]
    fn footnote_numbering_restarts_per_render() {
        let first = render("A[^x]\n\n[^x]: one\n");
        let second = render("B[^y]\n\n[^y]: two\n");
        assert!(first.contains(r#"id="fn1""#));
        assert!(second.contains(r#"id="fn1""#));
    }

    #[test]
    fn numbers_follow_first_appearance() {
        let mut n = FootnoteNumbers::default();
        assert_eq!(n.get("z"), 1);
        assert_eq!(n.get("a"), 2);
        assert_eq!(n.get("z"), 1);
    }
}
