//! Elixir Term Conversion Utilities
//!
//! Binaries are byte tags and values, charlists are text, atoms are symbols.
//! Errors become `{:error, {kind, details}}`.

use crate::dom::Symbol;
use crate::error::QueryError;
use crate::query::{Projected, ProjectionMap, Source};
use crate::repr::{AnyTag, Repr};
use crate::resource::DocumentRef;
use rustler::types::atom::nil;
use rustler::{Atom, Binary, Encoder, Env, Error, NewBinary, NifResult, Term};

rustler::atoms! {
    ok,
    error,
}

/// A query source as received from Elixir
pub enum SourceTerm<'a> {
    Document(DocumentRef),
    Raw(Binary<'a>),
    /// Charlist XML, re-encoded as UTF-8
    Chars(Vec<u8>),
}

impl SourceTerm<'_> {
    pub fn as_source(&self) -> Source<'_> {
        match self {
            SourceTerm::Document(doc) => Source::Document(&doc.doc),
            SourceTerm::Raw(binary) => Source::Raw(binary.as_slice()),
            SourceTerm::Chars(bytes) => Source::Raw(bytes),
        }
    }
}

pub fn decode_source(term: Term<'_>) -> NifResult<SourceTerm<'_>> {
    if let Ok(doc) = term.decode::<DocumentRef>() {
        return Ok(SourceTerm::Document(doc));
    }
    if term.is_binary() {
        return Ok(SourceTerm::Raw(term.decode()?));
    }
    if term.is_list() {
        return Ok(SourceTerm::Chars(decode_charlist(term)?.into_bytes()));
    }
    Err(Error::BadArg)
}

pub fn decode_tag(term: Term<'_>) -> NifResult<AnyTag> {
    if term.is_binary() {
        let binary: Binary = term.decode()?;
        return Ok(AnyTag::Bytes(binary.as_slice().to_vec()));
    }
    if term.is_atom() {
        return Ok(AnyTag::Symbol(Symbol::from(term.atom_to_string()?)));
    }
    if term.is_list() {
        return Ok(AnyTag::Text(decode_charlist(term)?));
    }
    Err(Error::BadArg)
}

fn decode_charlist(term: Term<'_>) -> NifResult<String> {
    let codes: Vec<u32> = term.decode()?;
    codes
        .into_iter()
        .map(|code| char::from_u32(code).ok_or(Error::BadArg))
        .collect()
}

/// A representation that can go back to Elixir
pub trait EncodeRepr: Repr {
    fn encode_repr<'a>(&self, env: Env<'a>) -> NifResult<Term<'a>>;
}

impl EncodeRepr for Vec<u8> {
    fn encode_repr<'a>(&self, env: Env<'a>) -> NifResult<Term<'a>> {
        Ok(bytes_to_binary(env, self))
    }
}

impl EncodeRepr for String {
    fn encode_repr<'a>(&self, env: Env<'a>) -> NifResult<Term<'a>> {
        let codes: Vec<u32> = self.chars().map(u32::from).collect();
        Ok(codes.encode(env))
    }
}

impl EncodeRepr for Symbol {
    fn encode_repr<'a>(&self, env: Env<'a>) -> NifResult<Term<'a>> {
        Ok(Atom::from_str(env, self)?.encode(env))
    }
}

/// Copy bytes into a new binary term
#[inline]
fn bytes_to_binary<'a>(env: Env<'a>, bytes: &[u8]) -> Term<'a> {
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

pub fn values_to_term<'a, R: EncodeRepr>(env: Env<'a>, values: &[R]) -> NifResult<Term<'a>> {
    let mut list = Term::list_new_empty(env);
    for value in values.iter().rev() {
        list = list.list_prepend(value.encode_repr(env)?);
    }
    Ok(list)
}

/// `nil` when nothing matched
pub fn optional_values_to_term<'a, R: EncodeRepr>(env: Env<'a>, values: Option<&[R]>) -> NifResult<Term<'a>> {
    match values {
        Some(values) => values_to_term(env, values),
        None => Ok(nil().encode(env)),
    }
}

pub fn optional_value_to_term<'a, R: EncodeRepr>(env: Env<'a>, value: Option<&R>) -> NifResult<Term<'a>> {
    match value {
        Some(value) => value.encode_repr(env),
        None => Ok(nil().encode(env)),
    }
}

/// Projection maps become Elixir maps; missing tags are `nil`
pub fn projection_to_term<'a, R: EncodeRepr>(env: Env<'a>, map: &ProjectionMap<R>) -> NifResult<Term<'a>> {
    let mut term = Term::map_new(env);
    for (key, projected) in map {
        let value = match projected {
            Projected::Value(value) => value.encode_repr(env)?,
            Projected::Missing => nil().encode(env),
            Projected::Nested(nested) => projection_to_term(env, nested)?,
        };
        term = term.map_put(key.encode_repr(env)?, value)?;
    }
    Ok(term)
}

/// `{:error, {kind, details}}`
pub fn error_to_term<'a>(env: Env<'a>, err: &QueryError) -> NifResult<Term<'a>> {
    let kind = Atom::from_str(env, err.symbol())?;
    let details = match err {
        QueryError::MalformedDocument(e) => (
            Atom::from_str(env, e.kind.symbol())?,
            e.token.as_str(),
            (e.position.line, e.position.column),
        )
            .encode(env),
        QueryError::InvalidTagName { tag, kind, line, column } => {
            (tag.as_str(), Atom::from_str(env, kind.symbol())?, (*line, *column)).encode(env)
        }
        QueryError::InvalidPathExpression(e) => (e.message.as_str(), e.expression.as_str(), e.offset).encode(env),
        other => other.to_string().encode(env),
    };
    Ok((error(), (kind, details)).encode(env))
}
