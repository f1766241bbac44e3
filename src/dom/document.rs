//! XML Document
//!
//! Builds the owned element tree from reader events. The builder enforces
//! the structural rules the reader cannot see (tag nesting, one root, no
//! stray content), namespace binding, and the internal DTD subset.

use super::namespace::NamespaceResolver;
use super::node::{Attribute, Base, Element, Namespace, Node, Symbol, Text, TextKind};
use crate::config::ParseOptions;
use crate::core::dtd::{AttDefault, ContentSpec, DtdDeclarations};
use crate::core::encoding::to_utf8;
use crate::error::{ParseError, ParseErrorKind};
use crate::reader::{EndElement, SliceReader, StartElement, XmlEvent};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

/// A parsed document: its root element and DOCTYPE name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
    doctype: Option<Symbol>,
}

impl Document {
    /// Parse a complete document. Fails on the first well-formedness or
    /// validation error.
    pub fn parse(input: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
        let input = to_utf8(input)?;
        DocumentBuilder::new(&input, options).build()
    }

    /// Wrap an already built element tree
    pub fn from_root(root: Element) -> Self {
        Document { root, doctype: None }
    }

    #[inline]
    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn doctype(&self) -> Option<&Symbol> {
        self.doctype.as_ref()
    }

    pub fn into_root(self) -> Element {
        self.root
    }
}

/// An element still waiting for its end tag
struct Frame {
    element: Element,
    /// Offset of the start tag
    offset: usize,
    /// Resolved `xml:base`, inherited by children
    base: Option<PathBuf>,
}

struct DocumentBuilder<'a, 'o> {
    reader: SliceReader<'a>,
    options: &'o ParseOptions,
    stack: Vec<Frame>,
    namespaces: NamespaceResolver,
    root: Option<Element>,
    doctype: Option<(Symbol, DtdDeclarations)>,
    /// Looked up the first time an element has a base
    working_dir: OnceCell<Option<PathBuf>>,
}

impl<'a, 'o> DocumentBuilder<'a, 'o> {
    fn new(input: &'a [u8], options: &'o ParseOptions) -> Self {
        DocumentBuilder {
            reader: SliceReader::new(input),
            options,
            stack: Vec::new(),
            namespaces: NamespaceResolver::new(),
            root: None,
            doctype: None,
            working_dir: OnceCell::new(),
        }
    }

    fn working_dir(&self) -> Option<&Path> {
        self.working_dir
            .get_or_init(|| std::env::current_dir().ok())
            .as_deref()
    }

    fn error(&self, kind: ParseErrorKind, token: &[u8], offset: usize) -> ParseError {
        ParseError::at(kind, token, self.reader.input(), offset)
    }

    /// Declarations to validate against, if validation applies
    fn validation(&self) -> Option<&DtdDeclarations> {
        match &self.doctype {
            Some((_, decls)) if self.options.validate_dtd => Some(decls),
            _ => None,
        }
    }

    fn build(mut self) -> Result<Document, ParseError> {
        while let Some(event) = self.reader.next_event()? {
            let offset = self.reader.offset();
            match event {
                XmlEvent::StartElement(start) => self.start_element(start, offset)?,
                XmlEvent::EndElement(end) => self.end_element(end, offset)?,
                XmlEvent::Text(text) => self.text(Text::new(text.into_owned()), offset)?,
                XmlEvent::CData(text) => self.text(Text::cdata(text), offset)?,
                XmlEvent::DocType { name, declarations } => {
                    if self.doctype.is_some() || self.root.is_some() || !self.stack.is_empty() {
                        return Err(self.error(ParseErrorKind::InvalidDeclaration, b"DOCTYPE", offset));
                    }
                    let name = Symbol::from(String::from_utf8_lossy(name).as_ref());
                    self.doctype = Some((name, declarations));
                }
                XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction { .. } | XmlEvent::XmlDeclaration { .. } => {}
            }
        }

        if let Some(frame) = self.stack.last() {
            return Err(self.error(ParseErrorKind::UnclosedElement, frame.element.name.as_bytes(), frame.offset));
        }
        let Some(root) = self.root else {
            let end = self.reader.input().len();
            return Err(self.error(ParseErrorKind::MissingRoot, b"", end));
        };
        tracing::trace!(root = %root.name, "document built");
        Ok(Document {
            root,
            doctype: self.doctype.map(|(name, _)| name),
        })
    }

    fn text(&mut self, text: Text, offset: usize) -> Result<(), ParseError> {
        let Some(frame) = self.stack.last_mut() else {
            if text.kind == TextKind::Text && text.is_whitespace() {
                return Ok(());
            }
            let skipped = text.value.iter().take_while(|&&b| b.is_ascii_whitespace()).count();
            let token: Vec<u8> = text.value[skipped..].iter().take(16).copied().collect();
            return Err(self.error(ParseErrorKind::ContentOutsideRoot, &token, offset + skipped));
        };
        match (frame.element.content.last_mut(), text.kind) {
            // Text split by a comment or PI is one node
            (Some(Node::Text(last)), TextKind::Text) if last.kind == TextKind::Text => {
                last.value.extend_from_slice(&text.value);
            }
            _ => frame.element.content.push(Node::Text(text)),
        }
        Ok(())
    }

    fn start_element(&mut self, start: StartElement<'a>, offset: usize) -> Result<(), ParseError> {
        let name_offset = offset + 1;
        if self.stack.is_empty() && self.root.is_some() {
            return Err(self.error(ParseErrorKind::MultipleRoots, start.name, offset));
        }
        if self.stack.len() >= self.options.max_depth {
            return Err(self.error(ParseErrorKind::NestingTooDeep, start.name, offset));
        }
        self.check_declared(&start, offset)?;

        self.namespaces.push_scope();
        let name = utf8_symbol(start.name);
        let mut element = Element::new(&name);
        for attr in &start.attributes {
            let value = String::from_utf8_lossy(&attr.value).into_owned();
            let declared = match (attr.name, split_prefix(attr.name)) {
                (b"xmlns", _) => Some(None),
                (_, Some((b"xmlns", local))) => Some(Some(String::from_utf8_lossy(local).into_owned())),
                _ => None,
            };
            if let Some(prefix) = declared {
                self.namespaces
                    .declare(prefix.as_deref(), &value)
                    .map_err(|_| self.error(ParseErrorKind::InvalidAttribute, attr.name, attr.offset))?;
                element.namespaces.push(Namespace {
                    prefix: prefix.as_deref().map(Symbol::from),
                    uri: value,
                });
            } else {
                element.attributes.push(Attribute {
                    name: utf8_symbol(attr.name),
                    value,
                });
            }
        }

        // Prefixes must be bound once this element's own declarations are in scope
        if let Some(prefix) = start.prefix() {
            self.check_bound(prefix, name_offset)?;
        }
        for attr in &start.attributes {
            match split_prefix(attr.name) {
                Some((b"xmlns", _)) | None => {}
                Some((prefix, _)) => self.check_bound(prefix, attr.offset)?,
            }
        }

        self.apply_attribute_defaults(&mut element, offset)?;

        let parent = self.stack.last();
        element.meta.language = element
            .attribute("xml:lang")
            .map(str::to_string)
            .or_else(|| parent.and_then(|p| p.element.meta.language.clone()));
        let inherited = parent.map_or_else(|| self.options.base.clone(), |p| p.base.clone());
        let base = match element.attribute("xml:base") {
            Some(href) => Some(resolve_base(inherited.as_deref(), href)),
            None => inherited,
        };
        let cwd = base.as_ref().and_then(|_| self.working_dir());
        element.meta.base = Base::normalize(base.clone(), cwd);

        let frame = Frame {
            element,
            offset,
            base,
        };
        if start.empty {
            self.finish(frame, offset)
        } else {
            self.stack.push(frame);
            Ok(())
        }
    }

    fn end_element(&mut self, end: EndElement<'a>, offset: usize) -> Result<(), ParseError> {
        let Some(frame) = self.stack.pop() else {
            return Err(self.error(ParseErrorKind::UnexpectedEndTag, end.name, offset));
        };
        if frame.element.name.as_bytes() != end.name {
            return Err(self.error(ParseErrorKind::MismatchedEndTag, end.name, offset));
        }
        self.finish(frame, offset)
    }

    /// Close an element: validate its content, tidy text, attach to the parent
    fn finish(&mut self, frame: Frame, end_offset: usize) -> Result<(), ParseError> {
        self.namespaces.pop_scope();
        let mut element = frame.element;

        if let Some(spec) = self.validation().and_then(|d| d.element(element.name.as_bytes())) {
            let violates = match spec {
                ContentSpec::Empty => !element.content.is_empty(),
                ContentSpec::Children(_) => element
                    .content
                    .iter()
                    .any(|n| matches!(n, Node::Text(t) if t.kind == TextKind::CData || !t.is_whitespace())),
                ContentSpec::Any | ContentSpec::Mixed(_) => false,
            };
            if violates {
                return Err(self.error(ParseErrorKind::InvalidContent, element.name.as_bytes(), end_offset));
            }
        }

        if !self.options.keep_whitespace {
            element
                .content
                .retain(|n| !matches!(n, Node::Text(t) if t.kind == TextKind::Text && t.is_whitespace()));
        }
        for (i, child) in element.content.iter_mut().enumerate() {
            if let Node::Element(e) = child {
                e.meta.position = i + 1;
            }
        }

        match self.stack.last_mut() {
            Some(parent) => parent.element.content.push(Node::Element(element)),
            None => self.root = Some(element),
        }
        Ok(())
    }

    fn check_bound(&self, prefix: &[u8], offset: usize) -> Result<(), ParseError> {
        let prefix_str = String::from_utf8_lossy(prefix);
        if self.namespaces.resolve(Some(&prefix_str)).is_none() {
            return Err(self.error(ParseErrorKind::UnboundPrefix, prefix, offset));
        }
        Ok(())
    }

    /// DTD checks that only need the start tag
    fn check_declared(&self, start: &StartElement<'a>, offset: usize) -> Result<(), ParseError> {
        let Some(decls) = self.validation() else {
            return Ok(());
        };
        if let (Some((doctype, _)), true) = (&self.doctype, self.stack.is_empty()) {
            if doctype.as_bytes() != start.name {
                return Err(self.error(ParseErrorKind::RootNameMismatch, start.name, offset));
            }
        }
        for def in decls.attributes(start.name) {
            if def.default == AttDefault::Required && start.attribute(&def.name).is_none() {
                return Err(self.error(ParseErrorKind::MissingRequiredAttribute, &def.name, offset));
            }
        }
        if !decls.has_element_decls() {
            return Ok(());
        }
        if decls.element(start.name).is_none() {
            return Err(self.error(ParseErrorKind::UndeclaredElement, start.name, offset));
        }
        if let Some(parent) = self.stack.last() {
            let allowed = decls
                .element(parent.element.name.as_bytes())
                .is_none_or(|spec| spec.allows_child(start.name));
            if !allowed {
                return Err(self.error(ParseErrorKind::InvalidContent, start.name, offset));
            }
        }
        Ok(())
    }

    /// Add ATTLIST defaults for attributes the start tag leaves out
    fn apply_attribute_defaults(&self, element: &mut Element, offset: usize) -> Result<(), ParseError> {
        let Some((_, decls)) = &self.doctype else {
            return Ok(());
        };
        for def in decls.attributes(element.name.as_bytes()) {
            let (AttDefault::Default(value) | AttDefault::Fixed(value)) = &def.default else {
                continue;
            };
            let name = String::from_utf8_lossy(&def.name);
            match element.attribute(&name) {
                Some(given) if matches!(def.default, AttDefault::Fixed(_)) && given.as_bytes() != value.as_slice() => {
                    if self.options.validate_dtd {
                        return Err(self.error(ParseErrorKind::InvalidAttribute, &def.name, offset));
                    }
                }
                Some(_) => {}
                None if name == "xmlns" || name.starts_with("xmlns:") => {}
                None => element.attributes.push(Attribute {
                    name: Symbol::from(name.as_ref()),
                    value: String::from_utf8_lossy(value).into_owned(),
                }),
            }
        }
        Ok(())
    }
}

fn utf8_symbol(name: &[u8]) -> Symbol {
    Symbol::from(String::from_utf8_lossy(name).as_ref())
}

fn split_prefix(name: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = memchr::memchr(b':', name)?;
    Some((&name[..colon], &name[colon + 1..]))
}

/// Resolve an `xml:base` value against the inherited base
fn resolve_base(inherited: Option<&Path>, href: &str) -> PathBuf {
    let href = Path::new(href);
    match inherited {
        Some(parent) if !href.is_absolute() => parent.join(href),
        _ => href.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Document, ParseError> {
        Document::parse(input.as_bytes(), &ParseOptions::default())
    }

    fn parse_err(input: &str) -> ParseError {
        parse(input).unwrap_err()
    }

    #[test]
    fn test_parse_nested() {
        let doc = parse("<fun><bag>cat</bag><bag>brown</bag></fun>").unwrap();
        let root = doc.root();
        assert_eq!(&*root.name, "fun");
        let bags: Vec<_> = root.child_elements().collect();
        assert_eq!(bags.len(), 2);
        assert_eq!(bags[1].meta.position, 2);
        assert_eq!(bags[0].text_children().next().unwrap().value, b"cat");
    }

    #[test]
    fn test_whitespace_dropped_and_positions_follow() {
        let doc = parse("<a>\n  <b/>\n  <c/>\n</a>").unwrap();
        assert_eq!(doc.root().content.len(), 2);
        let positions: Vec<_> = doc.root().child_elements().map(|e| e.meta.position).collect();
        assert_eq!(positions, vec![1, 2]);

        let kept = Document::parse(b"<a> <b/></a>", &ParseOptions::default().keep_whitespace(true)).unwrap();
        assert_eq!(kept.root().content.len(), 2);
        assert_eq!(kept.root().child_elements().next().unwrap().meta.position, 2);
    }

    #[test]
    fn test_text_merged_across_comments() {
        let doc = parse("<a>one<!-- c -->two<![CDATA[three]]></a>").unwrap();
        let texts: Vec<_> = doc.root().text_children().collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].value, b"onetwo");
        assert_eq!(texts[1].kind, TextKind::CData);
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = parse_err("<x>this</xml>");
        assert_eq!(err.kind, ParseErrorKind::MismatchedEndTag);
        assert_eq!(err.token, "xml");
        assert_eq!((err.position.line, err.position.column), (1, 8));
    }

    #[test]
    fn test_structure_errors() {
        assert_eq!(parse_err("<a/></b>").kind, ParseErrorKind::UnexpectedEndTag);
        assert_eq!(parse_err("<a/><b/>").kind, ParseErrorKind::MultipleRoots);
        assert_eq!(parse_err("<a/>tail").kind, ParseErrorKind::ContentOutsideRoot);
        assert_eq!(parse_err("  <!-- only -->").kind, ParseErrorKind::MissingRoot);
        assert_eq!(parse_err("<a><b></b>").kind, ParseErrorKind::UnclosedElement);
        assert_eq!(parse_err("").kind, ParseErrorKind::MissingRoot);
    }

    #[test]
    fn test_namespaces_become_nodes() {
        let doc = parse("<s:env xmlns:s='urn:soap' xmlns='urn:d' id='1'><s:body/></s:env>").unwrap();
        let root = doc.root();
        assert_eq!(root.namespaces.len(), 2);
        assert_eq!(root.namespaces[0].prefix.as_deref(), Some("s"));
        assert_eq!(root.namespaces[1].prefix, None);
        assert_eq!(root.attributes.len(), 1);
        assert_eq!(root.attribute("id"), Some("1"));
    }

    #[test]
    fn test_unbound_prefix() {
        let err = parse_err("<a><p:b/></a>");
        assert_eq!(err.kind, ParseErrorKind::UnboundPrefix);
        assert_eq!(err.token, "p");
        assert_eq!(parse_err("<a p:x='1'/>").kind, ParseErrorKind::UnboundPrefix);
        assert!(parse("<a xml:lang='en'/>").is_ok());
    }

    #[test]
    fn test_language_and_base_inherited() {
        let doc = Document::parse(
            b"<a xml:lang='en' xml:base='feeds/'><b xml:base='daily'/><c/></a>",
            &ParseOptions::default().base("/srv"),
        )
        .unwrap();
        let root = doc.root();
        assert_eq!(root.meta.language.as_deref(), Some("en"));
        let children: Vec<_> = root.child_elements().collect();
        assert_eq!(children[0].meta.language.as_deref(), Some("en"));
        assert_eq!(children[0].meta.base, Base::Path(PathBuf::from("/srv/feeds/daily")));
        assert_eq!(children[1].meta.base, Base::Path(PathBuf::from("/srv/feeds/")));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}x{}", "<a>".repeat(depth), "</a>".repeat(depth));

        assert!(parse(&nested(256)).is_ok());
        let err = parse_err(&nested(257));
        assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);
        assert_eq!(err.token, "a");
        assert_eq!(err.position.column, 3 * 256 + 1);

        let err = parse_err(&nested(60_000));
        assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);

        let shallow = ParseOptions::default().max_depth(2);
        assert!(Document::parse(b"<a><b/></a>", &shallow).is_ok());
        let err = Document::parse(b"<a><b><c/></b></a>", &shallow).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestingTooDeep);
        assert_eq!(err.token, "c");
    }

    #[test]
    fn test_working_dir_base_is_relative() {
        let cwd = std::env::current_dir().unwrap();
        let doc = Document::parse(b"<a><b/></a>", &ParseOptions::default().base(&cwd)).unwrap();
        assert_eq!(doc.root().meta.base, Base::Relative);
        assert_eq!(doc.root().child_elements().next().unwrap().meta.base, Base::Relative);
    }

    #[test]
    fn test_default_base_is_relative() {
        let doc = parse("<a><b/></a>").unwrap();
        assert_eq!(doc.root().meta.base, Base::Relative);
    }

    #[test]
    fn test_utf16_document() {
        let mut input = vec![0xFF, 0xFE];
        for unit in "<a>é</a>".encode_utf16() {
            input.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = Document::parse(&input, &ParseOptions::default()).unwrap();
        assert_eq!(doc.root().text_children().next().unwrap().value, "é".as_bytes());
    }

    const NOTE_DTD: &str = "<!DOCTYPE note [\
        <!ELEMENT note (to, body)>\
        <!ELEMENT to (#PCDATA)>\
        <!ELEMENT body (#PCDATA)>\
        <!ELEMENT br EMPTY>\
        <!ATTLIST note id CDATA #REQUIRED lang CDATA 'en'>\
        ]>";

    #[test]
    fn test_dtd_valid_document() {
        let doc = parse(&format!("{NOTE_DTD}<note id='1'>\n <to>Ann</to>\n <body>Hi</body>\n</note>")).unwrap();
        assert_eq!(doc.doctype().map(|s| &**s), Some("note"));
        assert_eq!(doc.root().attribute("lang"), Some("en"));
    }

    #[test]
    fn test_dtd_violations() {
        assert_eq!(
            parse_err(&format!("{NOTE_DTD}<note><to/></note>")).kind,
            ParseErrorKind::MissingRequiredAttribute
        );
        assert_eq!(
            parse_err(&format!("{NOTE_DTD}<memo id='1'/>")).kind,
            ParseErrorKind::RootNameMismatch
        );
        assert_eq!(
            parse_err(&format!("{NOTE_DTD}<note id='1'><cc/></note>")).kind,
            ParseErrorKind::UndeclaredElement
        );
        assert_eq!(
            parse_err(&format!("{NOTE_DTD}<note id='1'>text<to/></note>")).kind,
            ParseErrorKind::InvalidContent
        );
        assert_eq!(
            parse_err(&format!("{NOTE_DTD}<note id='1'><br/></note>")).kind,
            ParseErrorKind::InvalidContent
        );
    }

    #[test]
    fn test_dtd_validation_can_be_disabled() {
        let options = ParseOptions::default().validate_dtd(false);
        let input = format!("{NOTE_DTD}<memo><cc/></memo>");
        assert!(Document::parse(input.as_bytes(), &options).is_ok());
    }

    #[test]
    fn test_doctype_after_root_rejected() {
        assert_eq!(parse_err("<a/><!DOCTYPE a>").kind, ParseErrorKind::InvalidDeclaration);
    }
}
