//! Path Axes
//!
//! Supported axes:
//! - child, parent, self
//! - descendant, descendant-or-self, ancestor
//! - following-sibling, preceding-sibling
//! - namespace
//!
//! Each axis returns nodes in axis order: document order for forward axes,
//! nearest first for reverse axes.

use super::compiler::CompiledNodeTest;
use super::index::{NodeId, TreeIndex};
use super::parser::Axis;
use crate::dom::NodeRef;
use std::collections::HashSet;

/// Navigate along an axis from a context node
pub fn navigate(index: &TreeIndex<'_>, context: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => index.children(context).to_vec(),
        Axis::Descendant => index.descendants(context).collect(),
        Axis::DescendantOrSelf => std::iter::once(context).chain(index.descendants(context)).collect(),
        Axis::Parent => index.parent(context).into_iter().collect(),
        Axis::Ancestor => ancestor_axis(index, context),
        Axis::FollowingSibling => index.following_siblings(context).to_vec(),
        Axis::PrecedingSibling => index.preceding_siblings(context).iter().rev().copied().collect(),
        Axis::Self_ => vec![context],
        Axis::Namespace => namespace_axis(index, context),
    }
}

/// ancestor:: axis - parent, grandparent, ..., document node
fn ancestor_axis(index: &TreeIndex<'_>, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = context;
    while let Some(parent) = index.parent(current) {
        result.push(parent);
        current = parent;
    }
    result
}

/// namespace:: axis - namespaces in scope on an element, nearest declaration
/// of each prefix wins. An empty default declaration hides outer defaults.
fn namespace_axis(index: &TreeIndex<'_>, context: NodeId) -> Vec<NodeId> {
    if !matches!(index.node(context), Some(NodeRef::Element(_))) {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    let scopes = std::iter::once(context).chain(ancestor_axis(index, context));
    for element in scopes {
        for id in index.declared_namespaces(element) {
            let Some(NodeRef::Namespace(ns)) = index.node(id) else {
                continue;
            };
            if seen.insert(ns.prefix.clone()) && !ns.uri.is_empty() {
                result.push(id);
            }
        }
    }
    result.sort_unstable();
    result
}

/// Check if a node matches a node test. The principal node type is
/// namespace on the namespace axis and element everywhere else.
pub fn matches_node_test(index: &TreeIndex<'_>, id: NodeId, axis: Axis, node_test: &CompiledNodeTest) -> bool {
    let node = index.node(id);
    match node_test {
        CompiledNodeTest::Node => true,
        CompiledNodeTest::Text => matches!(node, Some(NodeRef::Text(_))),
        CompiledNodeTest::Any => match node {
            Some(NodeRef::Namespace(_)) => axis == Axis::Namespace,
            Some(NodeRef::Element(_)) => axis != Axis::Namespace,
            _ => false,
        },
        CompiledNodeTest::Name(name) => match node {
            Some(NodeRef::Element(e)) if axis != Axis::Namespace => &*e.name == name.as_str(),
            Some(NodeRef::Namespace(ns)) if axis == Axis::Namespace => ns.prefix.as_deref() == Some(name.as_str()),
            _ => false,
        },
        CompiledNodeTest::PrefixWildcard(prefix) => match node {
            Some(NodeRef::Element(e)) if axis != Axis::Namespace => e.prefix() == Some(prefix.as_str()),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Element, Namespace, Node};

    fn ns(prefix: Option<&str>, uri: &str) -> Namespace {
        Namespace {
            prefix: prefix.map(Into::into),
            uri: uri.to_string(),
        }
    }

    // <root xmlns:a="urn:a" xmlns="urn:d"><x xmlns:a="urn:a2" xmlns=""><y/></x>t</root>
    fn sample() -> Element {
        let mut x = Element::new("x").with_child(Element::new("y"));
        x.namespaces = vec![ns(Some("a"), "urn:a2"), ns(None, "")];
        let mut root = Element::new("root").with_child(x).with_child(Node::text("t"));
        root.namespaces = vec![ns(Some("a"), "urn:a"), ns(None, "urn:d")];
        root
    }

    // ids: 0 doc, 1 root, 2 a, 3 default, 4 x, 5 a2, 6 undeclare, 7 y, 8 "t"

    #[test]
    fn test_child_and_descendant_axes() {
        let root = sample();
        let index = TreeIndex::build(&root);
        assert_eq!(navigate(&index, 1, Axis::Child), vec![4, 8]);
        assert_eq!(navigate(&index, 1, Axis::Descendant), vec![4, 7, 8]);
        assert_eq!(navigate(&index, 4, Axis::DescendantOrSelf), vec![4, 7]);
    }

    #[test]
    fn test_reverse_axes_nearest_first() {
        let root = sample();
        let index = TreeIndex::build(&root);
        assert_eq!(navigate(&index, 7, Axis::Ancestor), vec![4, 1, 0]);
        assert_eq!(navigate(&index, 8, Axis::PrecedingSibling), vec![4]);
        assert_eq!(navigate(&index, 7, Axis::Parent), vec![4]);
    }

    #[test]
    fn test_namespace_axis_in_scope() {
        let root = sample();
        let index = TreeIndex::build(&root);
        assert_eq!(navigate(&index, 1, Axis::Namespace), vec![2, 3]);
        // x rebinds `a` and undeclares the default namespace
        assert_eq!(navigate(&index, 7, Axis::Namespace), vec![5]);
        assert!(navigate(&index, 8, Axis::Namespace).is_empty());
    }

    #[test]
    fn test_node_tests() {
        let root = sample();
        let index = TreeIndex::build(&root);
        let name = CompiledNodeTest::Name("x".to_string());
        assert!(matches_node_test(&index, 4, Axis::Child, &name));
        assert!(!matches_node_test(&index, 8, Axis::Child, &CompiledNodeTest::Any));
        assert!(matches_node_test(&index, 8, Axis::Child, &CompiledNodeTest::Text));
        let prefix = CompiledNodeTest::Name("a".to_string());
        assert!(matches_node_test(&index, 2, Axis::Namespace, &prefix));
        assert!(!matches_node_test(&index, 2, Axis::Child, &prefix));
    }
}
