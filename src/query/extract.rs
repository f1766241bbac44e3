//! Value extraction
//!
//! Each matched node extracts itself: an element yields the text it directly
//! contains, a text node yields its value, a namespace node has no value.

use crate::dom::{Element, Namespace, Node, NodeRef, Text};
use crate::error::QueryError;
use crate::repr::Repr;

/// Raw values carried by a node
pub trait Extract<'d> {
    /// Append this node's values in document order
    fn extract(self, out: &mut Vec<&'d [u8]>) -> Result<(), QueryError>;

    /// Text of the node and all its descendants, concatenated
    fn string_value(self, out: &mut Vec<u8>) -> Result<(), QueryError>;
}

impl<'d> Extract<'d> for &'d Element {
    fn extract(self, out: &mut Vec<&'d [u8]>) -> Result<(), QueryError> {
        out.extend(self.text_children().map(|t| t.value.as_slice()));
        Ok(())
    }

    fn string_value(self, out: &mut Vec<u8>) -> Result<(), QueryError> {
        for child in &self.content {
            match child {
                Node::Element(e) => e.string_value(out)?,
                Node::Text(t) => t.string_value(out)?,
                Node::Namespace(_) => {}
            }
        }
        Ok(())
    }
}

impl<'d> Extract<'d> for &'d Text {
    fn extract(self, out: &mut Vec<&'d [u8]>) -> Result<(), QueryError> {
        out.push(&self.value);
        Ok(())
    }

    fn string_value(self, out: &mut Vec<u8>) -> Result<(), QueryError> {
        out.extend_from_slice(&self.value);
        Ok(())
    }
}

impl<'d> Extract<'d> for &'d Namespace {
    fn extract(self, _out: &mut Vec<&'d [u8]>) -> Result<(), QueryError> {
        Err(unsupported(self))
    }

    fn string_value(self, _out: &mut Vec<u8>) -> Result<(), QueryError> {
        Err(unsupported(self))
    }
}

impl<'d> Extract<'d> for NodeRef<'d> {
    fn extract(self, out: &mut Vec<&'d [u8]>) -> Result<(), QueryError> {
        match self {
            NodeRef::Element(e) => e.extract(out),
            NodeRef::Text(t) => t.extract(out),
            NodeRef::Namespace(ns) => ns.extract(out),
        }
    }

    fn string_value(self, out: &mut Vec<u8>) -> Result<(), QueryError> {
        match self {
            NodeRef::Element(e) => e.string_value(out),
            NodeRef::Text(t) => t.string_value(out),
            NodeRef::Namespace(ns) => ns.string_value(out),
        }
    }
}

fn unsupported(ns: &Namespace) -> QueryError {
    QueryError::UnsupportedNamespaceSelection {
        prefix: ns.prefix.as_ref().map(ToString::to_string),
    }
}

/// Values of all matched nodes, in the caller's representation
pub fn extract_values<R: Repr>(nodes: &[NodeRef<'_>]) -> Result<Vec<R>, QueryError> {
    let mut raw = Vec::new();
    for &node in nodes {
        node.extract(&mut raw)?;
    }
    raw.into_iter()
        .map(|value| R::from_canonical(value).map_err(QueryError::from))
        .collect()
}

/// Like [`extract_values`], but `None` when nothing matched at all
pub fn extract_values_or_none<R: Repr>(nodes: &[NodeRef<'_>]) -> Result<Option<Vec<R>>, QueryError> {
    if nodes.is_empty() {
        return Ok(None);
    }
    extract_values(nodes).map(Some)
}

/// String value of the first matched node
pub fn first_string_value<R: Repr>(nodes: &[NodeRef<'_>]) -> Result<Option<R>, QueryError> {
    let Some(&first) = nodes.first() else {
        return Ok(None);
    };
    let mut value = Vec::new();
    first.string_value(&mut value)?;
    Ok(Some(R::from_canonical(&value)?))
}
