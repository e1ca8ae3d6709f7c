//! Canonical XML 1.0 and Exclusive Canonical XML 1.0 over `roxmltree` nodes.
//!
//! Canonicalizing an element treats it as the apex of a document subset:
//! inclusive mode renders the full in-scope namespace context and inherited
//! `xml:*` attributes on the apex, exclusive mode renders only the
//! namespaces each output element visibly utilizes.
//!
//! `roxmltree` trees are read-only. Changes to a parsed document are
//! expressed as [`Rewrites`] and applied while rendering.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use roxmltree::{Node, NodeId, NodeType};

use crate::xml::ns;

/// Canonicalization variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct C14nMode {
    pub exclusive: bool,
    pub with_comments: bool,
}

impl C14nMode {
    pub const INCLUSIVE: Self = Self {
        exclusive: false,
        with_comments: false,
    };
    pub const INCLUSIVE_WITH_COMMENTS: Self = Self {
        exclusive: false,
        with_comments: true,
    };
    pub const EXCLUSIVE: Self = Self {
        exclusive: true,
        with_comments: false,
    };
}

/// Changes applied on top of a parsed tree while it is rendered.
#[derive(Debug, Clone, Default)]
pub struct Rewrites {
    first_children: Vec<(NodeId, String)>,
    texts: Vec<(NodeId, String)>,
}

impl Rewrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `markup` verbatim as the first content of `element`.
    ///
    /// The markup is not canonicalized; reparse the rendered output before
    /// canonicalizing anything inside it.
    pub fn insert_first_child(&mut self, element: NodeId, markup: impl Into<String>) {
        self.first_children.push((element, markup.into()));
    }

    /// Replace the content of `element` with the text `value`.
    pub fn set_text(&mut self, element: NodeId, value: impl Into<String>) {
        self.texts.retain(|(id, _)| *id != element);
        self.texts.push((element, value.into()));
    }

    fn first_child(&self, element: NodeId) -> Option<&str> {
        self.first_children
            .iter()
            .find(|(id, _)| *id == element)
            .map(|(_, markup)| markup.as_str())
    }

    fn text(&self, element: NodeId) -> Option<&str> {
        self.texts
            .iter()
            .find(|(id, _)| *id == element)
            .map(|(_, value)| value.as_str())
    }
}

/// Canonicalize the subtree rooted at `node`, or the whole document when
/// `node` is the document root.
pub fn canonicalize(node: Node<'_, '_>, mode: C14nMode) -> Vec<u8> {
    canonicalize_with(node, mode, &Rewrites::default())
}

/// [`canonicalize`] with `rewrites` applied to the rendered nodes.
pub fn canonicalize_with(node: Node<'_, '_>, mode: C14nMode, rewrites: &Rewrites) -> Vec<u8> {
    canonical_string(node, mode, rewrites).into_bytes()
}

/// [`canonicalize_with`] as text, for output that is parsed again.
pub fn canonical_string(node: Node<'_, '_>, mode: C14nMode, rewrites: &Rewrites) -> String {
    let ctx = Canonicalizer { mode, rewrites };
    let mut out = String::new();
    match node.node_type() {
        NodeType::Root => ctx.write_document(node, &mut out),
        NodeType::Element => ctx.write_element(node, &BTreeMap::new(), true, &mut out),
        _ => ctx.write_child(node, &BTreeMap::new(), &mut out),
    }
    out
}

struct Canonicalizer<'r> {
    mode: C14nMode,
    rewrites: &'r Rewrites,
}

/// An attribute prepared for sorting by (namespace URI, local name).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Attr {
    ns_uri: String,
    local: String,
    qualified: String,
    value: String,
}

impl Canonicalizer<'_> {
    fn write_document(&self, root: Node<'_, '_>, out: &mut String) {
        let children: Vec<Node<'_, '_>> = root.children().collect();
        let mut seen_element = false;
        for (index, child) in children.iter().enumerate() {
            match child.node_type() {
                NodeType::Element => {
                    seen_element = true;
                    self.write_element(*child, &BTreeMap::new(), true, out);
                }
                NodeType::Comment if !self.mode.with_comments => {}
                NodeType::Comment | NodeType::PI => {
                    let element_follows = children[index + 1..].iter().any(|next| next.is_element());
                    if seen_element {
                        out.push('\n');
                    }
                    self.write_child(*child, &BTreeMap::new(), out);
                    if element_follows {
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }
    }

    fn write_child(&self, node: Node<'_, '_>, rendered: &BTreeMap<String, String>, out: &mut String) {
        match node.node_type() {
            NodeType::Element => self.write_element(node, rendered, false, out),
            NodeType::Text => out.push_str(&escape_text_value(node.text().unwrap_or(""))),
            NodeType::Comment => {
                if self.mode.with_comments {
                    out.push_str("<!--");
                    out.push_str(node.text().unwrap_or(""));
                    out.push_str("-->");
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi() {
                    out.push_str("<?");
                    out.push_str(pi.target);
                    if let Some(value) = pi.value.filter(|value| !value.is_empty()) {
                        out.push(' ');
                        out.push_str(value);
                    }
                    out.push_str("?>");
                }
            }
            NodeType::Root => {}
        }
    }

    fn write_element(
        &self,
        node: Node<'_, '_>,
        rendered: &BTreeMap<String, String>,
        is_apex: bool,
        out: &mut String,
    ) {
        let scope = in_scope_namespaces(node);
        let names = QualifiedNames::of(node);

        let candidates: Vec<&str> = if self.mode.exclusive {
            names.visibly_utilized()
        } else {
            std::iter::once("")
                .chain(scope.keys().map(String::as_str))
                .collect()
        };

        // Render a declaration only where it differs from the nearest output ancestor
        let mut render_ns: Vec<(&str, &str)> = Vec::new();
        for prefix in candidates {
            let uri = scope.get(prefix).map(String::as_str).unwrap_or("");
            let rendered_uri = rendered.get(prefix).map(String::as_str).unwrap_or("");
            if uri != rendered_uri {
                render_ns.push((prefix, uri));
            }
        }
        render_ns.sort();
        render_ns.dedup();

        let mut attrs: Vec<Attr> = node
            .attributes()
            .zip(&names.attributes)
            .map(|(attr, qualified)| Attr {
                ns_uri: attr.namespace().unwrap_or("").to_string(),
                local: attr.name().to_string(),
                qualified: qualified.clone(),
                value: attr.value().to_string(),
            })
            .collect();
        if is_apex && !self.mode.exclusive {
            let inherited = inherited_xml_attributes(node, &attrs);
            attrs.extend(inherited);
        }
        attrs.sort();

        out.push('<');
        out.push_str(&names.element);
        for (prefix, uri) in &render_ns {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            out.push_str(&escape_attr_value(uri));
            out.push('"');
        }
        for attr in &attrs {
            out.push(' ');
            out.push_str(&attr.qualified);
            out.push_str("=\"");
            out.push_str(&escape_attr_value(&attr.value));
            out.push('"');
        }
        out.push('>');

        let mut now_rendered = rendered.clone();
        for (prefix, uri) in &render_ns {
            now_rendered.insert(prefix.to_string(), uri.to_string());
        }
        if let Some(markup) = self.rewrites.first_child(node.id()) {
            out.push_str(markup);
        }
        match self.rewrites.text(node.id()) {
            Some(value) => out.push_str(&escape_text_value(value)),
            None => {
                for child in node.children() {
                    self.write_child(child, &now_rendered, out);
                }
            }
        }

        out.push_str("</");
        out.push_str(&names.element);
        out.push('>');
    }
}

/// Prefix to URI bindings in scope at `node`, without the `xml` prefix.
fn in_scope_namespaces(node: Node<'_, '_>) -> BTreeMap<String, String> {
    node.namespaces()
        .filter_map(|ns| {
            let prefix = ns.name().unwrap_or("");
            (prefix != "xml").then(|| (prefix.to_string(), ns.uri().to_string()))
        })
        .collect()
}

/// `xml:*` attributes of ancestors that the apex does not override, nearest ancestor wins.
fn inherited_xml_attributes(node: Node<'_, '_>, own: &[Attr]) -> Vec<Attr> {
    let mut inherited: Vec<Attr> = Vec::new();
    for ancestor in node.ancestors().skip(1).filter(Node::is_element) {
        for attr in ancestor.attributes() {
            if attr.namespace() != Some(ns::XML) {
                continue;
            }
            let local = attr.name();
            let present = own
                .iter()
                .chain(&inherited)
                .any(|a| a.ns_uri == ns::XML && a.local == local);
            if present {
                continue;
            }
            inherited.push(Attr {
                ns_uri: ns::XML.to_string(),
                local: local.to_string(),
                qualified: format!("xml:{local}"),
                value: attr.value().to_string(),
            });
        }
    }
    inherited
}

/// The element and attribute names as written in the source, with
/// attributes in `roxmltree` order.
struct QualifiedNames {
    element: String,
    attributes: Vec<String>,
}

impl QualifiedNames {
    fn of(node: Node<'_, '_>) -> Self {
        Self::from_source(node).unwrap_or_else(|| Self::from_bindings(node))
    }

    /// Names read back from the start tag with `quick-xml`.
    fn from_source(node: Node<'_, '_>) -> Option<Self> {
        let start_tag = node.document().input_text().get(node.range().start..)?;
        let mut reader = Reader::from_str(start_tag);
        let start = match reader.read_event().ok()? {
            Event::Start(start) | Event::Empty(start) => start,
            _ => return None,
        };

        let element = std::str::from_utf8(start.name().as_ref()).ok()?.to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.ok()?;
            let key = std::str::from_utf8(attr.key.as_ref()).ok()?;
            if key != "xmlns" && !key.starts_with("xmlns:") {
                attributes.push(key.to_string());
            }
        }

        let same_element = local_part(&element) == node.tag_name().name();
        let same_attributes = attributes.len() == node.attributes().count()
            && attributes
                .iter()
                .zip(node.attributes())
                .all(|(qualified, attr)| local_part(qualified) == attr.name());
        (same_element && same_attributes).then_some(Self {
            element,
            attributes,
        })
    }

    /// Names rebuilt from the in-scope bindings, for elements whose start
    /// tag is not in the input text (entity replacement text).
    fn from_bindings(node: Node<'_, '_>) -> Self {
        let prefix_for = |uri: Option<&str>, allow_default: bool| -> Option<String> {
            let uri = uri?;
            if uri == ns::XML {
                return Some("xml".to_string());
            }
            let mut bound = node.namespaces().filter(|ns| ns.uri() == uri);
            if allow_default {
                bound.next().and_then(|ns| ns.name()).map(str::to_string)
            } else {
                bound.find_map(|ns| ns.name()).map(str::to_string)
            }
        };
        let qualify = |prefix: Option<String>, local: &str| match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        };

        let tag = node.tag_name();
        Self {
            element: qualify(prefix_for(tag.namespace(), true), tag.name()),
            attributes: node
                .attributes()
                .map(|attr| qualify(prefix_for(attr.namespace(), false), attr.name()))
                .collect(),
        }
    }

    /// Prefixes visibly utilized by the element: its own prefix (or the
    /// default namespace) and the prefixes of its qualified attributes.
    fn visibly_utilized(&self) -> Vec<&str> {
        let mut prefixes = vec![prefix_part(&self.element)];
        for qualified in &self.attributes {
            let prefix = prefix_part(qualified);
            if !prefix.is_empty() && prefix != "xml" && !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
        prefixes
    }
}

fn local_part(qualified: &str) -> &str {
    qualified.split_once(':').map_or(qualified, |(_, local)| local)
}

fn prefix_part(qualified: &str) -> &str {
    qualified.split_once(':').map_or("", |(prefix, _)| prefix)
}

/// Escape attribute value per C14N rules.
fn escape_attr_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text node value per C14N rules.
fn escape_text_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}
