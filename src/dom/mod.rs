//! DOM Module - Owned XML Document Tree
//!
//! - Node: element/text/namespace nodes with interned names
//! - Document: event-driven tree builder with DTD validation
//! - Namespace: scope stack for prefix binding

pub mod document;
pub mod namespace;
pub mod node;

pub use document::Document;
pub use node::{Attribute, Base, Element, ElementMeta, Namespace, Node, NodeKind, NodeRef, Symbol, Text, TextKind};
