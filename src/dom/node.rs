//! Document Node representation
//!
//! A parsed document is an owned tree of `Node`s. Element names are interned
//! `Symbol`s; text values stay raw bytes (the canonical form queries work on).

use std::path::{Path, PathBuf};

/// Interned element/attribute name
pub type Symbol = string_cache::DefaultAtom;

/// Type of a document node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    Namespace,
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Namespace(Namespace),
}

impl Node {
    /// Shorthand for a plain text node
    pub fn text(value: impl Into<Vec<u8>>) -> Self {
        Node::Text(Text::new(value))
    }

    pub fn kind(&self) -> NodeKind {
        self.as_ref().kind()
    }

    /// Borrow this node as a `NodeRef`
    pub fn as_ref(&self) -> NodeRef<'_> {
        match self {
            Node::Element(e) => NodeRef::Element(e),
            Node::Text(t) => NodeRef::Text(t),
            Node::Namespace(ns) => NodeRef::Namespace(ns),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<Text> for Node {
    fn from(t: Text) -> Self {
        Node::Text(t)
    }
}

/// Borrowed view of a node, as returned by path evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    Element(&'a Element),
    Text(&'a Text),
    Namespace(&'a Namespace),
}

impl<'a> NodeRef<'a> {
    #[inline]
    pub fn kind(self) -> NodeKind {
        match self {
            NodeRef::Element(_) => NodeKind::Element,
            NodeRef::Text(_) => NodeKind::Text,
            NodeRef::Namespace(_) => NodeKind::Namespace,
        }
    }

    /// Element name, if this is an element
    pub fn name(self) -> Option<&'a Symbol> {
        match self {
            NodeRef::Element(e) => Some(&e.name),
            _ => None,
        }
    }

    pub fn as_element(self) -> Option<&'a Element> {
        match self {
            NodeRef::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// Whether a text node came from character data or a CDATA section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextKind {
    #[default]
    Text,
    CData,
}

/// Character data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Text {
    pub value: Vec<u8>,
    pub kind: TextKind,
}

impl Text {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Text {
            value: value.into(),
            kind: TextKind::Text,
        }
    }

    pub fn cdata(value: impl Into<Vec<u8>>) -> Self {
        Text {
            value: value.into(),
            kind: TextKind::CData,
        }
    }

    /// True if the value consists only of XML whitespace
    pub fn is_whitespace(&self) -> bool {
        self.value
            .iter()
            .all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
    }
}

/// A namespace declaration (`xmlns` or `xmlns:prefix`); carries no value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// `None` for the default namespace
    pub prefix: Option<Symbol>,
    pub uri: String,
}

/// An attribute of an element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: Symbol,
    pub value: String,
}

/// Base location of an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Base {
    /// The current working directory (canonical `"."`)
    #[default]
    Relative,
    Path(PathBuf),
}

impl Base {
    /// Normalize a resolved location; the working directory `cwd` collapses to `Relative`
    pub fn normalize(path: Option<PathBuf>, cwd: Option<&Path>) -> Self {
        match path {
            None => Base::Relative,
            Some(p) if p.as_os_str().is_empty() || p.as_os_str() == "." => Base::Relative,
            Some(p) if cwd == Some(p.as_path()) => Base::Relative,
            Some(p) => Base::Path(p),
        }
    }
}

/// Element metadata that queries do not look at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementMeta {
    /// 1-based index among the parent's content
    pub position: usize,
    /// Inherited `xml:lang`
    pub language: Option<String>,
    pub base: Base,
}

impl Default for ElementMeta {
    fn default() -> Self {
        ElementMeta {
            position: 1,
            language: None,
            base: Base::Relative,
        }
    }
}

/// An element and its content in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: Symbol,
    pub attributes: Vec<Attribute>,
    /// Namespaces declared on this element
    pub namespaces: Vec<Namespace>,
    pub content: Vec<Node>,
    pub meta: ElementMeta,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: Symbol::from(name),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            content: Vec::new(),
            meta: ElementMeta::default(),
        }
    }

    /// Append a child, setting its position when it is an element
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        let mut child = child.into();
        if let Node::Element(e) = &mut child {
            e.meta.position = self.content.len() + 1;
        }
        self.content.push(child);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(Attribute {
            name: Symbol::from(name),
            value: value.to_string(),
        });
        self
    }

    /// Local part of the name (after the prefix)
    pub fn local_name(&self) -> &str {
        let name: &str = &self.name;
        name.split_once(':').map_or(name, |(_, local)| local)
    }

    /// Namespace prefix of the name, if any
    pub fn prefix(&self) -> Option<&str> {
        let name: &str = &self.name;
        name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &*a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.content.iter().filter_map(Node::as_element)
    }

    /// Direct text children in document order
    pub fn text_children(&self) -> impl Iterator<Item = &Text> + '_ {
        self.content.iter().filter_map(|n| match n {
            Node::Text(t) => Some(t),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_builder_positions() {
        let fun = Element::new("fun")
            .with_child(Element::new("bag").with_child(Node::text("cat")))
            .with_child(Node::text("x"))
            .with_child(Element::new("house"));
        let positions: Vec<_> = fun.child_elements().map(|e| e.meta.position).collect();
        assert_eq!(positions, vec![1, 3]);
        assert_eq!(fun.text_children().count(), 1);
    }

    #[test]
    fn test_prefixed_name() {
        let e = Element::new("soap:Envelope");
        assert_eq!(e.local_name(), "Envelope");
        assert_eq!(e.prefix(), Some("soap"));
        assert_eq!(Element::new("plain").prefix(), None);
    }

    #[test]
    fn test_node_kinds() {
        assert_eq!(Node::text("a").kind(), NodeKind::Text);
        assert_eq!(Node::from(Element::new("a")).kind(), NodeKind::Element);
        let ns = Namespace {
            prefix: None,
            uri: "urn:x".to_string(),
        };
        assert_eq!(NodeRef::Namespace(&ns).kind(), NodeKind::Namespace);
    }

    #[test]
    fn test_base_normalization() {
        let cwd = Path::new("/home/app");
        assert_eq!(Base::normalize(None, Some(cwd)), Base::Relative);
        assert_eq!(Base::normalize(Some(PathBuf::from(".")), None), Base::Relative);
        assert_eq!(Base::normalize(Some(cwd.to_path_buf()), Some(cwd)), Base::Relative);
        assert_eq!(
            Base::normalize(Some(PathBuf::from("/srv/feeds")), Some(cwd)),
            Base::Path(PathBuf::from("/srv/feeds"))
        );
        assert_eq!(
            Base::normalize(Some(cwd.to_path_buf()), None),
            Base::Path(cwd.to_path_buf())
        );
    }

    #[test]
    fn test_whitespace_text() {
        assert!(Text::new(" \n\t").is_whitespace());
        assert!(!Text::new(" a ").is_whitespace());
    }
}
