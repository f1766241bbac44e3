//! Tag and value representations
//!
//! Tags come in as bytes, text or interned symbols. Queries run on the byte
//! form; results convert back to whatever family the caller used.

use crate::dom::Symbol;
use crate::error::{ReprKind, RepresentationError};
use std::borrow::Cow;
use std::hash::Hash;

/// A textual family tags and values can live in
pub trait Repr: Clone + Eq + Hash + Sized {
    const KIND: ReprKind;

    /// The byte form queries run on
    fn to_canonical(&self) -> Cow<'_, [u8]>;

    fn from_canonical(bytes: &[u8]) -> Result<Self, RepresentationError>;
}

impl Repr for Vec<u8> {
    const KIND: ReprKind = ReprKind::Bytes;

    fn to_canonical(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }

    fn from_canonical(bytes: &[u8]) -> Result<Self, RepresentationError> {
        Ok(bytes.to_vec())
    }
}

impl Repr for String {
    const KIND: ReprKind = ReprKind::Text;

    fn to_canonical(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn from_canonical(bytes: &[u8]) -> Result<Self, RepresentationError> {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| RepresentationError::InvalidUtf8(ReprKind::Text))
    }
}

impl Repr for Symbol {
    const KIND: ReprKind = ReprKind::Symbol;

    fn to_canonical(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn from_canonical(bytes: &[u8]) -> Result<Self, RepresentationError> {
        std::str::from_utf8(bytes)
            .map(Symbol::from)
            .map_err(|_| RepresentationError::InvalidUtf8(ReprKind::Symbol))
    }
}

/// A tag whose family is only known at runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnyTag {
    Bytes(Vec<u8>),
    Text(String),
    Symbol(Symbol),
}

impl AnyTag {
    pub fn kind(&self) -> ReprKind {
        match self {
            AnyTag::Bytes(_) => ReprKind::Bytes,
            AnyTag::Text(_) => ReprKind::Text,
            AnyTag::Symbol(_) => ReprKind::Symbol,
        }
    }

    pub fn canonical(&self) -> Cow<'_, [u8]> {
        match self {
            AnyTag::Bytes(b) => b.to_canonical(),
            AnyTag::Text(s) => s.to_canonical(),
            AnyTag::Symbol(a) => a.to_canonical(),
        }
    }

    /// Render canonical bytes in a given family
    pub fn render(kind: ReprKind, bytes: &[u8]) -> Result<AnyTag, RepresentationError> {
        Ok(match kind {
            ReprKind::Bytes => AnyTag::Bytes(Vec::<u8>::from_canonical(bytes)?),
            ReprKind::Text => AnyTag::Text(String::from_canonical(bytes)?),
            ReprKind::Symbol => AnyTag::Symbol(Symbol::from_canonical(bytes)?),
        })
    }
}

/// Tags reduced to byte form, plus the family they came in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub kind: ReprKind,
    pub tags: Vec<Vec<u8>>,
}

impl Normalized {
    /// Convert the tags into a concrete family
    pub fn typed<R: Repr>(&self) -> Result<Vec<R>, RepresentationError> {
        self.tags.iter().map(|t| R::from_canonical(t)).collect()
    }
}

/// Normalize a tag list. Every tag must share the first tag's family; an
/// empty list is bytes.
pub fn normalize(tags: &[AnyTag]) -> Result<Normalized, RepresentationError> {
    let kind = tags.first().map_or(ReprKind::Bytes, AnyTag::kind);
    let tags = tags
        .iter()
        .enumerate()
        .map(|(index, tag)| {
            if tag.kind() != kind {
                return Err(RepresentationError::MixedRepresentation {
                    index,
                    expected: kind,
                    found: tag.kind(),
                });
            }
            let canonical = tag.canonical();
            if canonical.is_empty() {
                return Err(RepresentationError::EmptyTag);
            }
            Ok(canonical.into_owned())
        })
        .collect::<Result<Vec<_>, RepresentationError>>()?;
    Ok(Normalized { kind, tags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AnyTag::Bytes(b"bag".to_vec()))]
    #[case(AnyTag::Text("bag".to_string()))]
    #[case(AnyTag::Symbol(Symbol::from("bag")))]
    fn test_round_trip_through_every_family(#[case] tag: AnyTag) {
        for kind in [ReprKind::Bytes, ReprKind::Text, ReprKind::Symbol] {
            let other = AnyTag::render(kind, &tag.canonical()).unwrap();
            assert_eq!(other.kind(), kind);
            assert_eq!(AnyTag::render(tag.kind(), &other.canonical()).unwrap(), tag);
        }
    }

    #[test]
    fn test_normalize_keeps_family() {
        let tags = [AnyTag::Text("bag".into()), AnyTag::Text("house".into())];
        let normalized = normalize(&tags).unwrap();
        assert_eq!(normalized.kind, ReprKind::Text);
        assert_eq!(normalized.tags, vec![b"bag".to_vec(), b"house".to_vec()]);
        assert_eq!(normalized.typed::<String>().unwrap(), vec!["bag", "house"]);
    }

    #[test]
    fn test_normalize_rejects_mixed_families() {
        let tags = [AnyTag::Bytes(b"bag".to_vec()), AnyTag::Symbol(Symbol::from("house"))];
        assert_eq!(
            normalize(&tags),
            Err(RepresentationError::MixedRepresentation {
                index: 1,
                expected: ReprKind::Bytes,
                found: ReprKind::Symbol,
            })
        );
    }

    #[test]
    fn test_normalize_rejects_empty_tag() {
        assert_eq!(normalize(&[AnyTag::Text(String::new())]), Err(RepresentationError::EmptyTag));
        assert_eq!(normalize(&[]).unwrap().kind, ReprKind::Bytes);
    }

    #[test]
    fn test_invalid_utf8_cannot_become_text() {
        assert_eq!(
            String::from_canonical(b"\xff"),
            Err(RepresentationError::InvalidUtf8(ReprKind::Text))
        );
        assert_eq!(Vec::<u8>::from_canonical(b"\xff").unwrap(), vec![0xff]);
    }
}
