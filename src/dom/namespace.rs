//! Namespace Resolution
//!
//! Stack-based namespace resolver used while building a document.

use super::node::Symbol;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI); `None` is the default namespace
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: Option<Symbol>,
    uri: String,
    depth: usize,
}

/// A declaration the resolver refuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingError {
    /// `xml`/`xmlns` bound to another URI, or their URIs bound to another prefix
    Reserved,
    /// `xmlns:p=""`
    EmptyPrefixedUri,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: usize,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceResolver {
    /// Create a new namespace resolver with the `xml` prefix pre-bound
    pub fn new() -> Self {
        let mut bindings = Vec::with_capacity(16);
        bindings.push(NsBinding {
            prefix: Some(Symbol::from("xml")),
            uri: ns::XML.to_string(),
            depth: 0,
        });
        NamespaceResolver { bindings, depth: 0 }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), BindingError> {
        match prefix {
            Some("xml") if uri == ns::XML => return Ok(()),
            Some("xml") | Some("xmlns") => return Err(BindingError::Reserved),
            Some(_) if uri.is_empty() => return Err(BindingError::EmptyPrefixedUri),
            _ if uri == ns::XML || uri == ns::XMLNS => return Err(BindingError::Reserved),
            _ => {}
        }
        self.bindings.push(NsBinding {
            prefix: prefix.map(Symbol::from),
            uri: uri.to_string(),
            depth: self.depth,
        });
        Ok(())
    }

    /// Resolve a prefix (`None` for the default namespace) to a URI
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        // Search from most recent to oldest
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
            // An empty default declaration undeclares the default namespace
            .filter(|uri| !uri.is_empty())
    }

    /// Get current depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}
