//! Element lookups over a parsed `roxmltree` document.

use std::collections::BTreeMap;

use roxmltree::Node;

use crate::xml::{Error, Result};

/// Prefix bindings used to resolve the qualified names of lookups.
#[derive(Debug, Clone, Default)]
pub struct NamespaceMap {
    bindings: BTreeMap<String, String>,
}

impl NamespaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.bindings.insert(prefix.into(), uri.into());
        self
    }

    /// Add every prefixed binding in scope anywhere in `doc`. A document
    /// binding replaces an existing one with the same prefix.
    pub fn with_document(mut self, doc: &roxmltree::Document<'_>) -> Self {
        for node in doc.descendants().filter(Node::is_element) {
            for ns in node.namespaces() {
                if let Some(prefix) = ns.name() {
                    self.bindings.insert(prefix.to_string(), ns.uri().to_string());
                }
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// `(namespace URI, local name)` of `prefix:local`. An unprefixed name
    /// is in no namespace.
    pub fn resolve<'a>(&'a self, qualified: &'a str) -> Result<(&'a str, &'a str)> {
        match qualified.split_once(':') {
            Some((prefix, local)) => self
                .bindings
                .get(prefix)
                .map(|uri| (uri.as_str(), local))
                .ok_or_else(|| Error::UnboundPrefix(prefix.to_string())),
            None => Ok(("", qualified)),
        }
    }
}

/// `node` is an element named `(uri, local)`.
pub fn has_name(node: Node<'_, '_>, (uri, local): (&str, &str)) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace().unwrap_or("") == uri
}

/// Elements in the subtree of `scope` (itself included) whose unqualified
/// attribute `name` equals `value`, in document order.
pub fn elements_with_attribute<'a, 'input>(
    scope: Node<'a, 'input>,
    name: &str,
    value: &str,
) -> Vec<Node<'a, 'input>> {
    scope
        .descendants()
        .filter(|node| node.is_element() && node.attribute(name) == Some(value))
        .collect()
}

/// Elements in the subtree of `scope` (itself included) named `(uri, local)`.
pub fn elements_named<'a, 'input>(
    scope: Node<'a, 'input>,
    name: (&str, &str),
) -> Vec<Node<'a, 'input>> {
    scope.descendants().filter(|node| has_name(*node, name)).collect()
}

/// Child elements of `parent` named `(uri, local)`.
pub fn child_elements_named<'a, 'input>(
    parent: Node<'a, 'input>,
    name: (&str, &str),
) -> Vec<Node<'a, 'input>> {
    parent.children().filter(|node| has_name(*node, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    const SOAP: &str = r#"<env:Envelope xmlns:env="urn:env" xmlns:ds="urn:ds">
  <env:Body Id="b1"><ds:Item Id="i1"/><ds:Item/></env:Body>
  <env:Other xmlns:ds="urn:other"><ds:Item Id="b1"/></env:Other>
</env:Envelope>"#;

    #[test]
    fn test_document_bindings_override() {
        let doc = XmlDocument::parse(SOAP).unwrap();
        let tree = doc.parse_doc().unwrap();
        let ns = NamespaceMap::new()
            .bind("ds", "urn:default")
            .bind("x", "urn:x")
            .with_document(&tree);

        assert_eq!(ns.resolve("env:Body").unwrap(), ("urn:env", "Body"));
        // The last binding in document order wins
        assert_eq!(ns.resolve("ds:Item").unwrap(), ("urn:other", "Item"));
        assert_eq!(ns.resolve("x:y").unwrap(), ("urn:x", "y"));
        assert_eq!(ns.resolve("Plain").unwrap(), ("", "Plain"));
        assert!(!ns.is_empty());
    }

    #[test]
    fn test_unbound_prefix() {
        let ns = NamespaceMap::new();
        assert!(matches!(ns.resolve("q:x"), Err(Error::UnboundPrefix(p)) if p == "q"));
    }

    #[test]
    fn test_elements_with_attribute() {
        let doc = XmlDocument::parse(SOAP).unwrap();
        let tree = doc.parse_doc().unwrap();

        let found = elements_with_attribute(tree.root(), "Id", "b1");
        let names: Vec<&str> = found.iter().map(|n| n.tag_name().name()).collect();
        assert_eq!(names, ["Body", "Item"]);

        let body = found[0];
        assert_eq!(elements_with_attribute(body, "Id", "b1").len(), 1);
        assert_eq!(elements_with_attribute(body, "Id", "i1").len(), 1);
        assert!(elements_with_attribute(body, "Id", "none").is_empty());
    }

    #[test]
    fn test_elements_named() {
        let doc = XmlDocument::parse(SOAP).unwrap();
        let tree = doc.parse_doc().unwrap();

        assert_eq!(elements_named(tree.root(), ("urn:ds", "Item")).len(), 2);
        assert_eq!(elements_named(tree.root(), ("urn:other", "Item")).len(), 1);

        let body = elements_named(tree.root(), ("urn:env", "Body"))[0];
        assert_eq!(child_elements_named(body, ("urn:ds", "Item")).len(), 2);
        assert!(child_elements_named(tree.root_element(), ("urn:ds", "Item")).is_empty());
    }
}
