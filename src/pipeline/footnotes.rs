//! Document-wide footnote renumbering.
//!
//! Every chapter is rendered on its own, so each markup renderer restarts its
//! footnotes at 1. Once the chapters are concatenated, [`FootnoteReconciler`]
//! walks the document in order and gives every footnote definition the next
//! value of a [`FootnoteCounter`], rewriting the ids and links that point at
//! it:
//!
//! | before (chapter-local) | after (global) |
//! |---|---|
//! | `id="fn<n>"` | `id="fn<i>"` |
//! | `id="fnr<n>"` | `id="fnr<i>"` |
//! | `<a href="#fn<n>">` | `<a href="#fn<i>">` |
//! | `<a href="#fnr<n>">` | `<a href="#fnr<i>">` |
//!
//! Rewrites are scoped to the fragment a definition was rendered in: the
//! nearest ancestor carrying [`SCOPE_ATTR`] (a callout body with its own
//! notes) or with class `chapter-file` or `chapter` (anything outside all of
//! them shares one scope). They are applied from a mapping computed up
//! front, so `fn1 → fn2` followed by `fn2 → fn3` can never chain.
//! [`SCOPE_ATTR`] is removed from the reconciled output.

use super::dom::{self, Fragment};
use crate::error::BookError;
use markup5ever_rcdom::Handle;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

static RE_FOOTNOTE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(fnr?)([1-9]\d*)$").unwrap());
static RE_FOOTNOTE_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#(fnr?)([1-9]\d*)$").unwrap());

/// Classes of the containers that bound one renderer's footnote numbering.
pub const SCOPE_CLASSES: &[&str] = &["chapter-file", "chapter"];

/// Attribute marking a nested fragment (a callout body) rendered by its own
/// markup call, so numbered from 1 independently of its surroundings.
pub const SCOPE_ATTR: &str = "data-footnote-scope";

/// Global footnote sequence for one export.
///
/// Starts at 1 and only moves forward. Thread it through every
/// reconciliation belonging to the same document and create a fresh one per
/// export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteCounter {
    next: usize,
}

impl Default for FootnoteCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FootnoteCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the current value and advance.
    pub fn next_index(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }

    /// The value the next definition will receive.
    pub fn value(&self) -> usize {
        self.next
    }
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub html: String,
    /// Definitions renumbered in this pass.
    pub definitions: usize,
    /// Footnote links left pointing at a definition that does not exist.
    pub dangling_links: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FootnoteReconciler;

impl FootnoteReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Renumber the footnotes of `html`, drawing indices from `counter`.
    ///
    /// A document without definitions comes back unchanged and leaves the
    /// counter untouched.
    pub fn reconcile(
        &self,
        html: &str,
        counter: &mut FootnoteCounter,
    ) -> Result<Reconciled, BookError> {
        let fragment = Fragment::parse(html)?;

        let mut elements = Vec::new();
        let mut scopes = 0;
        collect_elements(fragment.body(), 0, &mut scopes, &mut elements);
        let marked = elements
            .iter()
            .filter(|(_, node)| dom::get_attr(node, SCOPE_ATTR).is_some())
            .count();

        // ── Pass 1: definitions in document order ────────────────────────
        let mut mapping: HashMap<(usize, usize), usize> = HashMap::new();
        for (scope, node) in &elements {
            let Some((kind, local)) = footnote_id(node) else {
                continue;
            };
            if kind != "fn" || mapping.contains_key(&(*scope, local)) {
                continue;
            }
            let index = counter.next_index();
            debug!("Footnote fn{} in scope {} → fn{}", local, scope, index);
            mapping.insert((*scope, local), index);
        }

        if mapping.is_empty() && marked == 0 {
            return Ok(Reconciled {
                html: html.to_string(),
                definitions: 0,
                dangling_links: count_dangling(&elements),
            });
        }

        // ── Pass 2: rewrite ids and links from the mapping ───────────────
        let mut dangling_links = 0;
        for (scope, node) in &elements {
            dom::remove_attr(node, SCOPE_ATTR);

            if let Some((kind, local)) = footnote_id(node) {
                if let Some(index) = mapping.get(&(*scope, local)) {
                    dom::set_attr(node, "id", &format!("{kind}{index}"));
                }
            }

            if let Some((kind, local)) = footnote_href(node) {
                match mapping.get(&(*scope, local)) {
                    Some(index) => dom::set_attr(node, "href", &format!("#{kind}{index}")),
                    None => {
                        warn!("Dangling footnote link #{}{} left as is", kind, local);
                        dangling_links += 1;
                    }
                }
            }
        }

        Ok(Reconciled {
            html: fragment.to_html()?,
            definitions: mapping.len(),
            dangling_links,
        })
    }
}

/// Reconcile a complete document with a fresh counter.
pub fn reconcile_footnotes(html: &str) -> Result<Reconciled, BookError> {
    FootnoteReconciler::new().reconcile(html, &mut FootnoteCounter::new())
}

/// Flatten the element tree in document order, tagging each element with
/// the id of its innermost scope container (0 outside any).
fn collect_elements(
    node: &Handle,
    scope: usize,
    scopes: &mut usize,
    out: &mut Vec<(usize, Handle)>,
) {
    let mut scope = scope;
    if dom::is_element(node) {
        if dom::get_attr(node, SCOPE_ATTR).is_some()
            || SCOPE_CLASSES.iter().any(|class| dom::has_class(node, class))
        {
            *scopes += 1;
            scope = *scopes;
        }
        out.push((scope, node.clone()));
    }
    for child in node.children.borrow().iter() {
        collect_elements(child, scope, scopes, out);
    }
}

/// Whether anything under `node` carries a footnote id or link.
pub(crate) fn has_footnotes(node: &Handle) -> bool {
    dom::find_first(node, &|n| footnote_id(n).is_some() || footnote_href(n).is_some()).is_some()
}

fn footnote_id(node: &Handle) -> Option<(String, usize)> {
    let id = dom::get_attr(node, "id")?;
    parse_marker(&RE_FOOTNOTE_ID, &id)
}

fn footnote_href(node: &Handle) -> Option<(String, usize)> {
    if dom::element_name(node).as_deref() != Some("a") {
        return None;
    }
    let href = dom::get_attr(node, "href")?;
    parse_marker(&RE_FOOTNOTE_HREF, &href)
}

fn parse_marker(re: &Regex, value: &str) -> Option<(String, usize)> {
    let caps = re.captures(value)?;
    let local = caps.get(2)?.as_str().parse().ok()?;
    Some((caps.get(1)?.as_str().to_string(), local))
}

fn count_dangling(elements: &[(usize, Handle)]) -> usize {
    let dangling = elements.iter().filter(|(_, n)| footnote_href(n).is_some()).count();
    if dangling > 0 {
        warn!("{} footnote link(s) without a definition left as is", dangling);
    }
    dangling
}
