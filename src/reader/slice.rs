//! Zero-Copy Slice Reader
//!
//! Pulls events from a UTF-8 byte slice, enforcing the lexical
//! well-formedness rules (names, attributes, comments, references). Tree
//! structure (nesting, single root) is checked by the document builder.

use super::events::{Attribute, EndElement, StartElement, XmlEvent};
use crate::core::dtd::{parse_internal_subset, DtdDeclarations};
use crate::core::entities::{decode_text, EntityError, EntityMap};
use crate::core::names::{is_valid_name, is_valid_qname, is_xml_char};
use crate::core::scanner::{is_whitespace, Scanner};
use crate::error::{ParseError, ParseErrorKind};
use memchr::{memchr, memchr3, memmem};
use std::borrow::Cow;

/// Strict XML reader over a byte slice
pub struct SliceReader<'a> {
    input: &'a [u8],
    scanner: Scanner<'a>,
    /// General entities from the internal DTD subset
    entities: EntityMap,
    /// Start of the most recently returned event
    offset: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        SliceReader {
            input,
            scanner: Scanner::new(input),
            entities: EntityMap::new(),
            offset: 0,
        }
    }

    /// Byte offset where the last event started
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    fn error(&self, kind: ParseErrorKind, token: &[u8], offset: usize) -> ParseError {
        ParseError::at(kind, token, self.input, offset)
    }

    fn entity_error(&self, e: EntityError, base: usize) -> ParseError {
        self.error(e.kind, &e.token, base + e.offset)
    }

    /// Get the next XML event, `None` at end of input
    pub fn next_event(&mut self) -> Result<Option<XmlEvent<'a>>, ParseError> {
        if self.scanner.is_eof() {
            return Ok(None);
        }
        let start = self.scanner.position();
        self.offset = start;

        let event = if self.scanner.peek() != Some(b'<') {
            self.read_text(start)?
        } else if self.scanner.starts_with(b"<!--") {
            self.read_comment(start)?
        } else if self.scanner.starts_with(b"<![CDATA[") {
            self.read_cdata(start)?
        } else if self.scanner.starts_with(b"<!DOCTYPE") {
            self.read_doctype(start)?
        } else if self.scanner.starts_with(b"<?") {
            self.read_processing_instruction(start)?
        } else if self.scanner.starts_with(b"</") {
            self.read_end_tag(start)?
        } else if self.scanner.starts_with(b"<!") {
            let token = self.scanner.slice(start, (start + 9).min(self.input.len()));
            return Err(self.error(ParseErrorKind::InvalidDeclaration, token, start));
        } else {
            self.read_start_tag(start)?
        };
        Ok(Some(event))
    }

    fn read_text(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        let end = self.scanner.find_tag_start().unwrap_or(self.input.len());
        let raw = self.scanner.slice(start, end);
        self.scanner.set_position(end);

        if let Some(i) = memmem::find(raw, b"]]>") {
            return Err(self.error(ParseErrorKind::InvalidContent, b"]]>", start + i));
        }
        self.check_chars(raw, start)?;
        let text = decode_cow(newline_normalized(raw), &self.entities).map_err(|e| self.entity_error(e, start))?;
        Ok(XmlEvent::Text(text))
    }

    fn read_comment(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        self.scanner.advance(4);
        let end = self
            .scanner
            .find(b"-->")
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof, b"<!--", start))?;
        let body = self.scanner.slice(start + 4, end);
        if memmem::find(body, b"--").is_some() || body.ends_with(b"-") {
            return Err(self.error(ParseErrorKind::InvalidComment, b"--", start));
        }
        self.check_chars(body, start + 4)?;
        self.scanner.set_position(end + 3);
        Ok(XmlEvent::Comment(body))
    }

    fn read_cdata(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        self.scanner.advance(9);
        let end = self
            .scanner
            .find(b"]]>")
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof, b"<![CDATA[", start))?;
        let body = self.scanner.slice(start + 9, end);
        self.check_chars(body, start + 9)?;
        self.scanner.set_position(end + 3);
        Ok(XmlEvent::CData(body))
    }

    fn read_doctype(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        let invalid = |reader: &Self| reader.error(ParseErrorKind::InvalidDeclaration, b"DOCTYPE", start);
        self.scanner.advance(9);
        if self.scanner.skip_whitespace() == 0 {
            return Err(invalid(self));
        }
        let name_offset = self.scanner.position();
        let name = self.scanner.take_name_token();
        if !is_valid_qname(name) {
            return Err(self.error(ParseErrorKind::InvalidName, name, name_offset));
        }
        self.scanner.skip_whitespace();

        if self.scanner.starts_with(b"SYSTEM") || self.scanner.starts_with(b"PUBLIC") {
            let literals = if self.scanner.starts_with(b"PUBLIC") { 2 } else { 1 };
            self.scanner.advance(6);
            for _ in 0..literals {
                if self.scanner.skip_whitespace() == 0 || !self.skip_literal() {
                    return Err(invalid(self));
                }
            }
            self.scanner.skip_whitespace();
        }

        let mut declarations = DtdDeclarations::new();
        if self.scanner.peek() == Some(b'[') {
            self.scanner.advance(1);
            let subset_start = self.scanner.position();
            let subset_end = self
                .find_subset_end()
                .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof, b"DOCTYPE", start))?;
            let subset = self.scanner.slice(subset_start, subset_end);
            declarations = parse_internal_subset(subset, self.input, subset_start)?;
            self.scanner.set_position(subset_end + 1);
            self.scanner.skip_whitespace();
        }

        match self.scanner.peek() {
            Some(b'>') => self.scanner.advance(1),
            None => return Err(self.error(ParseErrorKind::UnexpectedEof, b"DOCTYPE", start)),
            Some(_) => return Err(invalid(self)),
        }
        self.entities = declarations.entities.clone();
        Ok(XmlEvent::DocType { name, declarations })
    }

    /// Skip a quoted literal at the cursor; false if there is none
    fn skip_literal(&mut self) -> bool {
        let Some(quote @ (b'"' | b'\'')) = self.scanner.peek() else {
            return false;
        };
        match memchr(quote, &self.scanner.remaining()[1..]) {
            Some(len) => {
                self.scanner.advance(len + 2);
                true
            }
            None => false,
        }
    }

    /// Find the `]` closing an internal subset, skipping literals and comments
    fn find_subset_end(&self) -> Option<usize> {
        let rest = self.scanner.remaining();
        let mut i = 0;
        while i < rest.len() {
            match rest[i] {
                b']' => return Some(self.scanner.position() + i),
                quote @ (b'"' | b'\'') => {
                    i += memchr(quote, &rest[i + 1..])? + 2;
                }
                b'<' if rest[i..].starts_with(b"<!--") => {
                    i += memmem::find(&rest[i + 4..], b"-->")? + 7;
                }
                _ => i += 1,
            }
        }
        None
    }

    fn read_processing_instruction(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        self.scanner.advance(2);
        let target_offset = self.scanner.position();
        let target = self.scanner.take_name_token();
        let end = self
            .scanner
            .find(b"?>")
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof, b"<?", start))?;

        if target.eq_ignore_ascii_case(b"xml") {
            // Only a lowercase declaration at the very start of the document
            if target != b"xml" || start != 0 {
                return Err(self.error(ParseErrorKind::InvalidDeclaration, target, start));
            }
            let body = self.scanner.slice(self.scanner.position(), end);
            let event = self
                .xml_declaration(body)
                .ok_or_else(|| self.error(ParseErrorKind::InvalidDeclaration, b"xml", start))?;
            self.scanner.set_position(end + 2);
            return Ok(event);
        }

        if !is_valid_name(target) {
            return Err(self.error(ParseErrorKind::InvalidName, target, target_offset));
        }
        let data_start = self.scanner.position();
        if data_start < end && !is_whitespace(self.input[data_start]) {
            return Err(self.error(ParseErrorKind::InvalidName, target, target_offset));
        }
        self.scanner.skip_whitespace();
        let data_start = self.scanner.position().min(end);
        let data = self.scanner.slice(data_start, end);
        self.check_chars(data, data_start)?;
        self.scanner.set_position(end + 2);
        Ok(XmlEvent::ProcessingInstruction {
            target,
            data: (!data.is_empty()).then_some(data),
        })
    }

    fn xml_declaration(&self, body: &'a [u8]) -> Option<XmlEvent<'a>> {
        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        for (name, value) in pseudo_attributes(body)? {
            match name {
                b"version" if version.is_none() => version = Some(value),
                b"encoding" if encoding.is_none() => encoding = Some(value),
                b"standalone" if standalone.is_none() => {
                    standalone = Some(match value {
                        b"yes" => true,
                        b"no" => false,
                        _ => return None,
                    })
                }
                _ => return None,
            }
        }
        Some(XmlEvent::XmlDeclaration {
            version: version?,
            encoding,
            standalone,
        })
    }

    fn read_end_tag(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        self.scanner.advance(2);
        let name_offset = self.scanner.position();
        let name = self.scanner.take_name_token();
        if !is_valid_qname(name) {
            return Err(self.error(ParseErrorKind::InvalidName, name_token(name, self.scanner.remaining()), name_offset));
        }
        self.scanner.skip_whitespace();
        match self.scanner.peek() {
            Some(b'>') => self.scanner.advance(1),
            None => return Err(self.error(ParseErrorKind::UnexpectedEof, name, start)),
            Some(_) => return Err(self.error(ParseErrorKind::InvalidName, name, name_offset)),
        }
        Ok(XmlEvent::EndElement(EndElement { name }))
    }

    fn read_start_tag(&mut self, start: usize) -> Result<XmlEvent<'a>, ParseError> {
        self.scanner.advance(1);
        let name_offset = self.scanner.position();
        let name = self.scanner.take_name_token();
        if !is_valid_qname(name) {
            return Err(self.error(ParseErrorKind::InvalidName, name_token(name, self.scanner.remaining()), name_offset));
        }

        let mut attributes: Vec<Attribute<'a>> = Vec::new();
        let empty = loop {
            let separated = self.scanner.skip_whitespace() > 0;
            match self.scanner.peek() {
                None => return Err(self.error(ParseErrorKind::UnexpectedEof, name, start)),
                Some(b'>') => {
                    self.scanner.advance(1);
                    break false;
                }
                Some(b'/') if self.scanner.peek_at(1) == Some(b'>') => {
                    self.scanner.advance(2);
                    break true;
                }
                Some(_) => {
                    let attr_offset = self.scanner.position();
                    let attribute = self.read_attribute(start, name)?;
                    if !separated {
                        return Err(self.error(ParseErrorKind::InvalidAttribute, attribute.name, attr_offset));
                    }
                    if attributes.iter().any(|a| a.name == attribute.name) {
                        return Err(self.error(ParseErrorKind::DuplicateAttribute, attribute.name, attr_offset));
                    }
                    attributes.push(attribute);
                }
            }
        };

        Ok(XmlEvent::StartElement(StartElement {
            name,
            attributes,
            empty,
        }))
    }

    fn read_attribute(&mut self, tag_start: usize, tag: &'a [u8]) -> Result<Attribute<'a>, ParseError> {
        let offset = self.scanner.position();
        let name = self.scanner.take_name_token();
        if !is_valid_qname(name) {
            return Err(self.error(
                ParseErrorKind::InvalidAttribute,
                name_token(name, self.scanner.remaining()),
                offset,
            ));
        }
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'=') {
            return Err(self.error(ParseErrorKind::InvalidAttribute, name, offset));
        }
        self.scanner.advance(1);
        self.scanner.skip_whitespace();

        let Some(quote @ (b'"' | b'\'')) = self.scanner.peek() else {
            return Err(self.error(ParseErrorKind::InvalidAttribute, name, offset));
        };
        let value_start = self.scanner.position() + 1;
        let len = memchr(quote, &self.input[value_start..])
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof, tag, tag_start))?;
        let raw = self.scanner.slice(value_start, value_start + len);
        self.scanner.set_position(value_start + len + 1);

        if let Some(i) = memchr(b'<', raw) {
            return Err(self.error(ParseErrorKind::InvalidAttribute, name, value_start + i));
        }
        self.check_chars(raw, value_start)?;
        let value = decode_cow(attribute_normalized(raw), &self.entities)
            .map_err(|e| self.entity_error(e, value_start))?;
        Ok(Attribute { name, value, offset })
    }

    /// Reject characters outside the XML character range
    fn check_chars(&self, raw: &[u8], base: usize) -> Result<(), ParseError> {
        let suspicious = raw.iter().any(|&b| (b < 0x20 && !is_whitespace(b)) || b == 0xEF);
        if !suspicious {
            return Ok(());
        }
        let text = std::str::from_utf8(raw).map_err(|e| {
            let at = e.valid_up_to();
            self.error(ParseErrorKind::InvalidEncoding, &raw[at..at + 1], base + at)
        })?;
        match text.char_indices().find(|&(_, c)| !is_xml_char(c)) {
            Some((i, c)) => {
                let mut buf = [0u8; 4];
                Err(self.error(ParseErrorKind::InvalidEncoding, c.encode_utf8(&mut buf).as_bytes(), base + i))
            }
            None => Ok(()),
        }
    }
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = Result<XmlEvent<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                // Stop after the first error
                self.scanner.set_position(self.input.len());
                Some(Err(e))
            }
        }
    }
}

/// Token to report for a bad name; an empty name reports the offending byte
fn name_token<'a>(name: &'a [u8], rest: &'a [u8]) -> &'a [u8] {
    if name.is_empty() {
        &rest[..rest.len().min(1)]
    } else {
        name
    }
}

/// `name="value"` pairs of an XML declaration
fn pseudo_attributes(body: &[u8]) -> Option<Vec<(&[u8], &[u8])>> {
    let mut scanner = Scanner::new(body);
    let mut pairs = Vec::new();
    loop {
        let separated = scanner.skip_whitespace() > 0;
        if scanner.is_eof() {
            return Some(pairs);
        }
        if !separated {
            return None;
        }
        let name = scanner.take_name_token();
        scanner.skip_whitespace();
        if scanner.peek() != Some(b'=') {
            return None;
        }
        scanner.advance(1);
        scanner.skip_whitespace();
        let quote @ (b'"' | b'\'') = scanner.peek()? else {
            return None;
        };
        let start = scanner.position() + 1;
        let len = memchr(quote, &body[start..])?;
        pairs.push((name, &body[start..start + len]));
        scanner.set_position(start + len + 1);
    }
}

/// Line-end normalization: `\r\n` and lone `\r` become `\n`
fn newline_normalized(raw: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'\r', raw).is_none() {
        return Cow::Borrowed(raw);
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\r' {
            out.push(b'\n');
            bytes.next_if_eq(&b'\n');
        } else {
            out.push(b);
        }
    }
    Cow::Owned(out)
}

/// Attribute-value normalization: every literal whitespace character becomes a space
fn attribute_normalized(raw: &[u8]) -> Cow<'_, [u8]> {
    if memchr3(b'\t', b'\n', b'\r', raw).is_none() {
        return Cow::Borrowed(raw);
    }
    let mut value = newline_normalized(raw).into_owned();
    for b in value.iter_mut() {
        if is_whitespace(*b) {
            *b = b' ';
        }
    }
    Cow::Owned(value)
}

fn decode_cow<'s>(text: Cow<'s, [u8]>, entities: &EntityMap) -> Result<Cow<'s, [u8]>, EntityError> {
    match text {
        Cow::Borrowed(raw) => decode_text(raw, entities),
        Cow::Owned(raw) => decode_text(&raw, entities).map(|decoded| Cow::Owned(decoded.into_owned())),
    }
}
