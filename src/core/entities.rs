//! XML Entity Decoding
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//! - Internal general entities declared in the DTD
//!
//! Uses Cow for zero-copy when no entities are present.

use crate::error::ParseErrorKind;
use memchr::memchr;
use std::borrow::Cow;
use std::collections::HashMap;

/// Nesting limit for entity replacement text
const MAX_EXPANSION_DEPTH: usize = 16;

/// A general entity declared in the DTD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValue {
    /// Replacement text of an internal entity
    Internal(Vec<u8>),
    /// SYSTEM/PUBLIC entity; never fetched
    External,
}

/// Declared general entities, first declaration wins
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    entities: HashMap<Vec<u8>, EntityValue>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: Vec<u8>, value: EntityValue) {
        self.entities.entry(name).or_insert(value);
    }

    pub fn get(&self, name: &[u8]) -> Option<&EntityValue> {
        self.entities.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// A reference could not be decoded; `offset` is relative to the decoded input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityError {
    pub kind: ParseErrorKind,
    pub token: Vec<u8>,
    pub offset: usize,
}

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text<'a>(input: &'a [u8], entities: &EntityMap) -> Result<Cow<'a, [u8]>, EntityError> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    let mut out = Vec::with_capacity(input.len());
    let mut open = Vec::new();
    decode_into(input, entities, &mut out, &mut open)?;
    Ok(Cow::Owned(out))
}

fn decode_into(
    input: &[u8],
    entities: &EntityMap,
    out: &mut Vec<u8>,
    open: &mut Vec<Vec<u8>>,
) -> Result<(), EntityError> {
    let mut pos = 0;

    while let Some(amp) = memchr(b'&', &input[pos..]) {
        out.extend_from_slice(&input[pos..pos + amp]);
        let start = pos + amp;
        let Some(semi) = memchr(b';', &input[start..]) else {
            return Err(EntityError {
                kind: ParseErrorKind::UndefinedEntity,
                token: input[start..].to_vec(),
                offset: start,
            });
        };
        let reference = &input[start + 1..start + semi];
        let fail = |kind| EntityError {
            kind,
            token: reference.to_vec(),
            offset: start,
        };

        if let Some(numeric) = reference.strip_prefix(b"#") {
            let c = decode_char_ref(numeric).ok_or_else(|| fail(ParseErrorKind::InvalidCharacterReference))?;
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        } else if let Some(predefined) = predefined_entity(reference) {
            out.push(predefined);
        } else {
            match entities.get(reference) {
                Some(EntityValue::Internal(text)) => {
                    if open.len() >= MAX_EXPANSION_DEPTH || open.iter().any(|n| n == reference) {
                        return Err(fail(ParseErrorKind::InvalidDeclaration));
                    }
                    open.push(reference.to_vec());
                    // Errors inside replacement text are reported at the reference
                    decode_into(text, entities, out, open).map_err(|inner| EntityError {
                        offset: start,
                        ..inner
                    })?;
                    open.pop();
                }
                Some(EntityValue::External) | None => {
                    return Err(fail(ParseErrorKind::UndefinedEntity));
                }
            }
        }
        pos = start + semi + 1;
    }

    out.extend_from_slice(&input[pos..]);
    Ok(())
}

#[inline]
fn predefined_entity(name: &[u8]) -> Option<u8> {
    match name {
        b"lt" => Some(b'<'),
        b"gt" => Some(b'>'),
        b"amp" => Some(b'&'),
        b"quot" => Some(b'"'),
        b"apos" => Some(b'\''),
        _ => None,
    }
}

/// Decode the digits of `&#...;` (without `&#` and `;`)
fn decode_char_ref(digits: &[u8]) -> Option<char> {
    let (digits, radix) = match digits.strip_prefix(b"x") {
        Some(hex) => (hex, 16),
        None => (digits, 10),
    };
    if digits.is_empty() {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    let value = u32::from_str_radix(s, radix).ok()?;
    char::from_u32(value).filter(|&c| super::names::is_xml_char(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<Vec<u8>, EntityError> {
        decode_text(input, &EntityMap::new()).map(Cow::into_owned)
    }

    #[test]
    fn test_no_entities_borrows() {
        let result = decode_text(b"hello world", &EntityMap::new()).unwrap();
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_predefined_entities() {
        assert_eq!(decode(b"a &lt; b &amp;&amp; c &gt; d").unwrap(), b"a < b && c > d");
        assert_eq!(decode(b"&quot;&apos;").unwrap(), b"\"'");
    }

    #[test]
    fn test_char_refs() {
        assert_eq!(decode(b"&#65;&#x42;").unwrap(), b"AB");
        assert_eq!(decode(b"&#x20AC;").unwrap(), "\u{20AC}".as_bytes());
    }

    #[test]
    fn test_invalid_char_ref() {
        let err = decode(b"ok &#0; bad").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidCharacterReference);
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_undefined_entity() {
        let err = decode(b"&nbsp;").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UndefinedEntity);
        assert_eq!(err.token, b"nbsp");
    }

    #[test]
    fn test_declared_entity_expands_recursively() {
        let mut map = EntityMap::new();
        map.declare(b"co".to_vec(), EntityValue::Internal(b"ACME &amp; Sons".to_vec()));
        map.declare(b"sig".to_vec(), EntityValue::Internal(b"-- &co;".to_vec()));
        let out = decode_text(b"&sig;", &map).unwrap();
        assert_eq!(out.as_ref(), b"-- ACME & Sons");
    }

    #[test]
    fn test_recursive_entity_rejected() {
        let mut map = EntityMap::new();
        map.declare(b"a".to_vec(), EntityValue::Internal(b"&b;".to_vec()));
        map.declare(b"b".to_vec(), EntityValue::Internal(b"&a;".to_vec()));
        let err = decode_text(b"x&a;", &map).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidDeclaration);
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn test_external_entity_not_expanded() {
        let mut map = EntityMap::new();
        map.declare(b"ext".to_vec(), EntityValue::External);
        assert_eq!(decode_text(b"&ext;", &map).unwrap_err().kind, ParseErrorKind::UndefinedEntity);
    }
}
