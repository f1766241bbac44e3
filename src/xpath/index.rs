//! Tree Index
//!
//! Flattens an element tree into an arena of `NodeId`s assigned in document
//! order, with parent/child links for axis navigation. Id 0 is the virtual
//! document node; an element's namespace nodes come right after it, before
//! its children.

use crate::dom::{Element, Node, NodeRef};

pub type NodeId = u32;

/// The virtual document node above the root element
pub const DOCUMENT: NodeId = 0;
/// The root element
pub const ROOT_ELEMENT: NodeId = 1;

#[derive(Debug)]
struct Entry<'d> {
    /// `None` for the document node
    node: Option<NodeRef<'d>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Namespace nodes declared on this element: `namespaces.0..namespaces.1`
    namespaces: (NodeId, NodeId),
    /// Index in the parent's `children`
    sibling_index: usize,
    /// Exclusive end of this node's subtree
    end: NodeId,
}

/// Document-order index over a borrowed element tree
#[derive(Debug)]
pub struct TreeIndex<'d> {
    entries: Vec<Entry<'d>>,
}

impl<'d> TreeIndex<'d> {
    pub fn build(root: &'d Element) -> Self {
        let mut index = TreeIndex { entries: Vec::new() };
        index.push(None, None);
        let root_id = index.visit(root, DOCUMENT);
        index.entries[DOCUMENT as usize].children.push(root_id);
        index.entries[DOCUMENT as usize].end = index.next_id();
        index
    }

    fn next_id(&self) -> NodeId {
        self.entries.len() as NodeId
    }

    fn push(&mut self, node: Option<NodeRef<'d>>, parent: Option<NodeId>) -> NodeId {
        let id = self.next_id();
        self.entries.push(Entry {
            node,
            parent,
            children: Vec::new(),
            namespaces: (id + 1, id + 1),
            sibling_index: 0,
            end: id + 1,
        });
        id
    }

    fn visit(&mut self, element: &'d Element, parent: NodeId) -> NodeId {
        let id = self.push(Some(NodeRef::Element(element)), Some(parent));
        for ns in &element.namespaces {
            self.push(Some(NodeRef::Namespace(ns)), Some(id));
        }
        self.entries[id as usize].namespaces.1 = self.next_id();

        for child in &element.content {
            let child_id = match child {
                Node::Element(e) => self.visit(e, id),
                other => self.push(Some(other.as_ref()), Some(id)),
            };
            let sibling_index = self.entries[id as usize].children.len();
            self.entries[child_id as usize].sibling_index = sibling_index;
            self.entries[id as usize].children.push(child_id);
        }
        self.entries[id as usize].end = self.next_id();
        id
    }

    /// The node behind an id; `None` for the document node
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'d>> {
        self.entries[id as usize].node
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries[id as usize].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id as usize].children
    }

    /// Namespace nodes declared on an element
    pub fn declared_namespaces(&self, id: NodeId) -> std::ops::Range<NodeId> {
        let (start, end) = self.entries[id as usize].namespaces;
        start..end
    }

    /// Descendants in document order, namespace nodes excluded
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        (id + 1..self.entries[id as usize].end)
            .filter(move |&d| !matches!(self.node(d), Some(NodeRef::Namespace(_))))
    }

    /// Siblings after `id`, nearest first
    pub fn following_siblings(&self, id: NodeId) -> &[NodeId] {
        match self.parent(id) {
            Some(parent) if !self.is_namespace(id) => {
                &self.children(parent)[self.entries[id as usize].sibling_index + 1..]
            }
            _ => &[],
        }
    }

    /// Siblings before `id`, in document order
    pub fn preceding_siblings(&self, id: NodeId) -> &[NodeId] {
        match self.parent(id) {
            Some(parent) if !self.is_namespace(id) => {
                &self.children(parent)[..self.entries[id as usize].sibling_index]
            }
            _ => &[],
        }
    }

    #[inline]
    pub fn is_namespace(&self, id: NodeId) -> bool {
        matches!(self.node(id), Some(NodeRef::Namespace(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Namespace;

    fn sample() -> Element {
        let mut fun = Element::new("fun");
        fun.namespaces.push(Namespace {
            prefix: Some("p".into()),
            uri: "urn:p".to_string(),
        });
        fun.with_child(Element::new("bag").with_child(Node::text("cat")))
            .with_child(Element::new("house"))
    }

    #[test]
    fn test_ids_in_document_order() {
        let root = sample();
        let index = TreeIndex::build(&root);
        // document, fun, xmlns:p, bag, "cat", house
        assert_eq!(index.len(), 6);
        assert!(index.node(DOCUMENT).is_none());
        assert_eq!(index.node(ROOT_ELEMENT).and_then(|n| n.name()).map(|n| &**n), Some("fun"));
        assert!(index.is_namespace(2));
        assert_eq!(index.children(ROOT_ELEMENT), &[3, 5]);
        assert_eq!(index.declared_namespaces(ROOT_ELEMENT), 2..3);
    }

    #[test]
    fn test_descendants_skip_namespaces() {
        let root = sample();
        let index = TreeIndex::build(&root);
        assert_eq!(index.descendants(DOCUMENT).collect::<Vec<_>>(), vec![1, 3, 4, 5]);
        assert_eq!(index.descendants(3).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_siblings() {
        let root = sample();
        let index = TreeIndex::build(&root);
        assert_eq!(index.following_siblings(3), &[5]);
        assert_eq!(index.preceding_siblings(5), &[3]);
        assert!(index.following_siblings(2).is_empty());
        assert!(index.following_siblings(ROOT_ELEMENT).is_empty());
    }
}
