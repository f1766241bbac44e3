//! ResourceArc Wrappers
//!
//! A parsed document handed to Elixir as an opaque reference. The tree is
//! never mutated after parsing, so concurrent queries need no lock.

use crate::dom::Document;
use rustler::ResourceArc;

pub struct DocumentResource {
    pub doc: Document,
}

impl DocumentResource {
    pub fn new(doc: Document) -> Self {
        DocumentResource { doc }
    }
}

#[rustler::resource_impl]
impl rustler::Resource for DocumentResource {}

/// Type alias for document ResourceArc
pub type DocumentRef = ResourceArc<DocumentResource>;
