//! DTD Declaration Store
//!
//! Collects the declarations of an internal DTD subset: element content
//! models, attribute lists and general entities. The tree builder validates
//! elements against them as it closes each element.

use super::entities::{EntityMap, EntityValue};
use super::names::is_valid_qname;
use super::scanner::{is_whitespace, Scanner};
use crate::error::{ParseError, ParseErrorKind};
use std::collections::HashMap;

/// Collected DTD declarations
#[derive(Debug, Clone, Default)]
pub struct DtdDeclarations {
    /// Element declarations: name -> content spec
    pub elements: HashMap<Vec<u8>, ContentSpec>,
    /// Attribute lists: element name -> attributes
    pub attlists: HashMap<Vec<u8>, Vec<AttDef>>,
    /// General entities
    pub entities: EntityMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSpec {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`
    Mixed(Vec<Vec<u8>>),
    /// Element-only content; names mentioned anywhere in the model
    Children(Vec<Vec<u8>>),
}

impl ContentSpec {
    pub fn allows_text(&self) -> bool {
        matches!(self, ContentSpec::Any | ContentSpec::Mixed(_))
    }

    pub fn allows_child(&self, name: &[u8]) -> bool {
        match self {
            ContentSpec::Empty => false,
            ContentSpec::Any => true,
            ContentSpec::Mixed(names) | ContentSpec::Children(names) => {
                names.iter().any(|n| n == name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttDef {
    pub name: Vec<u8>,
    pub default: AttDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttDefault {
    Required,
    Implied,
    Fixed(Vec<u8>),
    Default(Vec<u8>),
}

impl DtdDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the subset constrains elements at all
    pub fn has_element_decls(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn element(&self, name: &[u8]) -> Option<&ContentSpec> {
        self.elements.get(name)
    }

    pub fn attributes(&self, element: &[u8]) -> &[AttDef] {
        self.attlists.get(element).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Parse an internal subset (the text between `[` and `]` of a DOCTYPE)
///
/// `offset` is the position of `subset` in `input`, for error reporting.
pub fn parse_internal_subset(subset: &[u8], input: &[u8], offset: usize) -> Result<DtdDeclarations, ParseError> {
    let mut decls = DtdDeclarations::new();
    let mut scanner = Scanner::new(subset);
    let error = |at: usize, token: &[u8]| {
        ParseError::at(ParseErrorKind::InvalidDeclaration, token, input, offset + at)
    };

    loop {
        scanner.skip_whitespace();
        if scanner.is_eof() {
            break;
        }
        let start = scanner.position();

        if scanner.starts_with(b"<!--") {
            let end = scanner.find(b"-->").ok_or_else(|| error(start, b"<!--"))?;
            scanner.set_position(end + 3);
        } else if scanner.starts_with(b"<?") {
            let end = scanner.find(b"?>").ok_or_else(|| error(start, b"<?"))?;
            scanner.set_position(end + 2);
        } else if scanner.peek() == Some(b'%') {
            // Parameter entity reference; external subsets are not loaded
            let end = scanner.find(b";").ok_or_else(|| error(start, b"%"))?;
            scanner.set_position(end + 1);
        } else if scanner.starts_with(b"<!") {
            let end = scanner.find_unquoted(b'>').ok_or_else(|| error(start, b"<!"))?;
            scanner.advance(2);
            let keyword = scanner.take_name_token();
            let body = scanner.slice(scanner.position(), end);
            let tokens = split_tokens(body);
            let result = match keyword {
                b"ELEMENT" => parse_element_decl(&tokens, &mut decls),
                b"ATTLIST" => parse_attlist_decl(&tokens, &mut decls),
                b"ENTITY" => parse_entity_decl(&tokens, &mut decls),
                b"NOTATION" => Ok(()),
                other => Err(other.to_vec()),
            };
            result.map_err(|token| error(start, &token))?;
            scanner.set_position(end + 1);
        } else {
            let token = &scanner.remaining()[..scanner.remaining().len().min(16)];
            return Err(error(start, token));
        }
    }

    Ok(decls)
}

/// Split a declaration body on whitespace, keeping quoted literals and
/// parenthesized groups (with their quantifier) whole
fn split_tokens(body: &[u8]) -> Vec<&[u8]> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        if is_whitespace(body[pos]) {
            pos += 1;
            continue;
        }
        let start = pos;
        match body[pos] {
            quote @ (b'"' | b'\'') => {
                pos += 1;
                while pos < body.len() && body[pos] != quote {
                    pos += 1;
                }
                pos = (pos + 1).min(body.len());
            }
            b'(' => {
                let mut depth = 0usize;
                while pos < body.len() {
                    match body[pos] {
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                pos += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    pos += 1;
                }
                while pos < body.len() && matches!(body[pos], b'?' | b'*' | b'+') {
                    pos += 1;
                }
            }
            _ => {
                while pos < body.len() && !is_whitespace(body[pos]) && body[pos] != b'(' {
                    pos += 1;
                }
            }
        }
        tokens.push(&body[start..pos]);
    }
    tokens
}

fn unquote(token: &[u8]) -> Option<&[u8]> {
    match token {
        [b'"', inner @ .., b'"'] | [b'\'', inner @ .., b'\''] => Some(inner),
        _ => None,
    }
}

fn group_names(group: &[u8]) -> Vec<Vec<u8>> {
    group
        .split(|&b| matches!(b, b'(' | b')' | b'|' | b',' | b'?' | b'*' | b'+') || is_whitespace(b))
        .filter(|name| !name.is_empty() && *name != b"#PCDATA")
        .map(<[u8]>::to_vec)
        .collect()
}

fn parse_element_decl(tokens: &[&[u8]], decls: &mut DtdDeclarations) -> Result<(), Vec<u8>> {
    let [name, spec] = tokens else {
        return Err(tokens.first().map_or_else(Vec::new, |t| t.to_vec()));
    };
    if !is_valid_qname(name) {
        return Err(name.to_vec());
    }
    let spec = match *spec {
        b"EMPTY" => ContentSpec::Empty,
        b"ANY" => ContentSpec::Any,
        group if group.starts_with(b"(") => {
            if memchr::memmem::find(group, b"#PCDATA").is_some() {
                ContentSpec::Mixed(group_names(group))
            } else {
                ContentSpec::Children(group_names(group))
            }
        }
        other => return Err(other.to_vec()),
    };
    if decls.elements.contains_key(*name) {
        // Element type declared more than once
        return Err(name.to_vec());
    }
    decls.elements.insert(name.to_vec(), spec);
    Ok(())
}

fn parse_attlist_decl(tokens: &[&[u8]], decls: &mut DtdDeclarations) -> Result<(), Vec<u8>> {
    let Some((element, mut rest)) = tokens.split_first() else {
        return Err(Vec::new());
    };
    let mut defs = Vec::new();
    while let [name, att_type, tail @ ..] = rest {
        let mut tail = tail;
        if *att_type == b"NOTATION" {
            tail = tail.get(1..).ok_or_else(|| att_type.to_vec())?;
        }
        let (default, tail) = match tail {
            [first, more @ ..] if *first == b"#REQUIRED" => (AttDefault::Required, more),
            [first, more @ ..] if *first == b"#IMPLIED" => (AttDefault::Implied, more),
            [first, value, more @ ..] if *first == b"#FIXED" => {
                let value = unquote(value).ok_or_else(|| value.to_vec())?;
                (AttDefault::Fixed(value.to_vec()), more)
            }
            [value, more @ ..] => {
                let value = unquote(value).ok_or_else(|| value.to_vec())?;
                (AttDefault::Default(value.to_vec()), more)
            }
            [] => return Err(name.to_vec()),
        };
        defs.push(AttDef {
            name: name.to_vec(),
            default,
        });
        rest = tail;
    }
    if let [dangling, ..] = rest {
        return Err(dangling.to_vec());
    }
    // Later ATTLISTs for the same element add attributes; first definition wins
    let list = decls.attlists.entry(element.to_vec()).or_default();
    for def in defs {
        if !list.iter().any(|d| d.name == def.name) {
            list.push(def);
        }
    }
    Ok(())
}

fn parse_entity_decl(tokens: &[&[u8]], decls: &mut DtdDeclarations) -> Result<(), Vec<u8>> {
    match tokens {
        // Parameter entities only matter for external subsets
        [percent, ..] if *percent == b"%" => Ok(()),
        [name, value] => {
            let value = unquote(value).ok_or_else(|| value.to_vec())?;
            decls.entities.declare(name.to_vec(), EntityValue::Internal(value.to_vec()));
            Ok(())
        }
        [name, kind, ..] if *kind == b"SYSTEM" || *kind == b"PUBLIC" => {
            decls.entities.declare(name.to_vec(), EntityValue::External);
            Ok(())
        }
        [first, ..] => Err(first.to_vec()),
        [] => Err(Vec::new()),
    }
}
