//! Pipeline stages for turning chapter sources into book HTML.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ snippet ──▶ callout ──▶ markup ──▶ footnotes
//! (text/)    (@@@ code)   (&&& div)   (md/textile)  (fn/fnr renumbering)
//! ```
//!
//! 1. [`snippet`]  — expand `@@@` code references into highlighted blocks
//!    read from `code/`
//! 2. [`callout`]  — wrap `&&&` blocks in a classed `<div>`, rendering their
//!    body with the chapter's markup
//! 3. [`chapter`]  — run the two stages above plus the markup dispatcher
//!    over every file of a chapter
//! 4. [`footnotes`] — renumber chapter-local footnotes into one global
//!    sequence over the assembled document
//!
//! [`dom`] and [`highlight`] are shared helpers.

pub mod callout;
pub mod chapter;
pub mod dom;
pub mod footnotes;
pub mod highlight;
pub mod snippet;

/// Fold newlines into `&#10;` so a generated HTML block stays on one line.
///
/// Markdown and textile both end a raw HTML block at the first blank line;
/// a single-line block survives the markup stage untouched, and the entity
/// renders as the same newline inside `<pre>`.
pub(crate) fn fold_newlines(html: &str) -> String {
    html.replace("\r\n", "\n").replace('\n', "&#10;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_every_newline() {
        assert_eq!(fold_newlines("a\nb\r\nc"), "a&#10;b&#10;c");
        assert_eq!(fold_newlines("plain"), "plain");
    }
}
