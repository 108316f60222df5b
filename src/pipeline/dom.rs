//! Minimal HTML tree helpers on top of `html5ever` + `markup5ever_rcdom`.
//!
//! Fragments are parsed as full documents and only the `<body>` children are
//! serialised back, so the output mirrors the input minus the implied
//! `html`/`head`/`body` wrappers.

use crate::error::BookError;
use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{ns, parse_document, serialize, Attribute, LocalName, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A parsed HTML fragment.
pub struct Fragment {
    _dom: RcDom,
    body: Handle,
}

impl Fragment {
    /// Parse `html` and keep a handle to its `<body>`.
    pub fn parse(html: &str) -> Result<Self, BookError> {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        let body = find_element(&dom.document, "body")
            .ok_or_else(|| BookError::Html("parsed document has no <body>".to_string()))?;
        Ok(Self { _dom: dom, body })
    }

    pub fn body(&self) -> &Handle {
        &self.body
    }

    /// Serialise the children of `<body>`.
    pub fn to_html(&self) -> Result<String, BookError> {
        inner_html(&self.body)
    }
}

/// Serialise every child of `node` (the node itself is excluded).
pub fn inner_html(node: &Handle) -> Result<String, BookError> {
    let mut output = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    for child in node.children.borrow().iter() {
        let serializable = SerializableHandle::from(child.clone());
        serialize(&mut output, &serializable, opts.clone())
            .map_err(|e| BookError::Html(e.to_string()))?;
    }
    String::from_utf8(output).map_err(|e| BookError::Html(format!("UTF-8 conversion failed: {e}")))
}

/// Depth-first search for the first element named `tag`.
pub fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
    if element_name(node).as_deref() == Some(tag) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

/// Depth-first search for the first element matching `pred`.
pub fn find_first(node: &Handle, pred: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
    if is_element(node) && pred(node) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_first(child, pred))
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// Local name of an element node.
pub fn element_name(node: &Handle) -> Option<String> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn get_attr(node: &Handle, attr: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Set (or add) an attribute on an element node.
pub fn set_attr(node: &Handle, attr: &str, value: &str) {
    if let NodeData::Element { ref attrs, .. } = node.data {
        let mut attrs = attrs.borrow_mut();
        if let Some(existing) = attrs.iter_mut().find(|a| &*a.name.local == attr) {
            existing.value = value.to_string().into();
            return;
        }
        attrs.push(Attribute {
            name: QualName::new(None, ns!(), LocalName::from(attr)),
            value: value.to_string().into(),
        });
    }
}

/// Remove an attribute from an element node, if present.
pub fn remove_attr(node: &Handle, attr: &str) {
    if let NodeData::Element { ref attrs, .. } = node.data {
        attrs.borrow_mut().retain(|a| &*a.name.local != attr);
    }
}

/// Whether the element's `class` list contains `class`.
pub fn has_class(node: &Handle, class: &str) -> bool {
    get_attr(node, "class")
        .map(|v| v.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// Create a detached element.
pub fn create_element(tag: &str, attrs: Vec<(&str, &str)>) -> Handle {
    let qual_name = QualName::new(None, ns!(html), LocalName::from(tag));
    let attributes = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.to_string().into(),
        })
        .collect();

    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Element {
            name: qual_name,
            attrs: RefCell::new(attributes),
            template_contents: Default::default(),
            mathml_annotation_xml_integration_point: false,
        },
    })
}

/// Create a detached text node.
pub fn create_text(text: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Text {
            contents: RefCell::new(text.to_string().into()),
        },
    })
}

pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Insert `child` before the current first child of `parent`.
pub fn prepend_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().insert(0, child);
}

/// Move every child of `from` to the end of `to`.
pub fn adopt_children(to: &Handle, from: &Handle) {
    let children: Vec<Handle> = from.children.borrow_mut().drain(..).collect();
    for child in children {
        append_child(to, child);
    }
}

/// Serialise a detached node, including the node itself.
pub fn outer_html(node: &Handle) -> Result<String, BookError> {
    let wrapper = create_element("div", vec![]);
    append_child(&wrapper, node.clone());
    inner_html(&wrapper)
}

/// Concatenated text content of a subtree.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { ref contents } = node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}
