//! XML Event Types
//!
//! Event types for pull-parser style XML processing. Names and raw slices
//! borrow from the input; text and attribute values are entity-decoded.

use crate::core::dtd::DtdDeclarations;
use std::borrow::Cow;

/// XML parsing event
#[derive(Debug, Clone)]
pub enum XmlEvent<'a> {
    /// Start of an element: `<name attrs...>` or `<name attrs.../>`
    StartElement(StartElement<'a>),
    /// End of an element: `</name>`
    EndElement(EndElement<'a>),
    /// Text content between tags
    Text(Cow<'a, [u8]>),
    /// CDATA section content
    CData(&'a [u8]),
    /// Comment content
    Comment(&'a [u8]),
    /// Processing instruction: `<?target data?>`
    ProcessingInstruction {
        target: &'a [u8],
        data: Option<&'a [u8]>,
    },
    /// XML declaration: `<?xml version="1.0"?>`
    XmlDeclaration {
        version: &'a [u8],
        encoding: Option<&'a [u8]>,
        standalone: Option<bool>,
    },
    /// DOCTYPE declaration with its internal subset
    DocType {
        name: &'a [u8],
        declarations: DtdDeclarations,
    },
}

/// An attribute as written in a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a [u8],
    /// Normalized and entity-decoded value
    pub value: Cow<'a, [u8]>,
    /// Byte offset of the attribute name
    pub offset: usize,
}

/// Start element event data
#[derive(Debug, Clone)]
pub struct StartElement<'a> {
    /// Full element name (may include prefix)
    pub name: &'a [u8],
    pub attributes: Vec<Attribute<'a>>,
    /// Written as `<name/>`
    pub empty: bool,
}

impl<'a> StartElement<'a> {
    /// Local name (after colon)
    pub fn local_name(&self) -> &'a [u8] {
        split_name(self.name).1
    }

    /// Namespace prefix (before colon), if any
    pub fn prefix(&self) -> Option<&'a [u8]> {
        split_name(self.name).0
    }

    /// Get the name as a string
    pub fn name_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.name).ok()
    }

    /// Get an attribute by name
    pub fn attribute(&self, name: &[u8]) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// End element event data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndElement<'a> {
    pub name: &'a [u8],
}

/// Split a name into prefix and local name at the colon
pub fn split_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    if let Some(pos) = memchr::memchr(b':', name) {
        (Some(&name[..pos]), &name[pos + 1..])
    } else {
        (None, name)
    }
}

impl<'a> XmlEvent<'a> {
    /// Get as start element if applicable
    pub fn as_start_element(&self) -> Option<&StartElement<'a>> {
        match self {
            XmlEvent::StartElement(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if applicable
    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            XmlEvent::Text(t) => Some(t.as_ref()),
            XmlEvent::CData(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_element() {
        let elem = StartElement {
            name: b"svg:rect",
            attributes: vec![],
            empty: true,
        };
        assert_eq!(elem.name_str(), Some("svg:rect"));
        assert_eq!(elem.local_name(), b"rect");
        assert_eq!(elem.prefix(), Some(&b"svg"[..]));
    }

    #[test]
    fn test_split_plain_name() {
        assert_eq!(split_name(b"div"), (None, &b"div"[..]));
    }
}
