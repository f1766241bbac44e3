//! XmlQuery - tag queries, path queries and map projection over XML
//!
//! Layers:
//! - Strict parser (reader + dom) and path engine (xpath), behind the
//!   `DocumentParser` / `PathEvaluator` traits
//! - Query layer: `get`, `xpath`, `to_map`, `text`, `xpath_many`
//! - NIF surface for `XmlQuery.Native`
//!
//! Tags and values keep the caller's representation: binaries, charlists
//! and atoms on the Elixir side; `Vec<u8>`, `String` and `Symbol` in Rust.

use rustler::{Encoder, Env, NifResult, ResourceArc, Term};

pub mod config;
pub mod core;
pub mod dom;
pub mod engine;
pub mod error;
pub mod query;
pub mod reader;
pub mod repr;
mod resource;
mod term;
pub mod xpath;

pub use config::{EngineConfig, ParseOptions};
pub use dom::{Document, Element, Namespace, Node, NodeKind, NodeRef, Symbol, Text};
pub use engine::{DocumentParser, PathEvaluator, XmlEngine};
pub use error::{ParseError, ParseErrorKind, PathError, QueryError, RepresentationError};
pub use query::{Projected, ProjectionMap, Query, Source};
pub use repr::{normalize, AnyTag, Repr};

use error::ReprKind;
use resource::{DocumentRef, DocumentResource};
use term::{EncodeRepr, SourceTerm};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Dispatch helpers
// ============================================================================

/// Run `$body` with `$tag` bound to the concrete representation
macro_rules! with_repr {
    ($tag:expr, $t:ident => $body:expr) => {
        match $tag {
            AnyTag::Bytes($t) => $body,
            AnyTag::Text($t) => $body,
            AnyTag::Symbol($t) => $body,
        }
    };
}

/// Run `$body` with `$tags` bound to the normalized tags in their family
macro_rules! with_repr_list {
    ($normalized:expr, $tags:ident => $body:expr) => {
        match $normalized.kind {
            ReprKind::Bytes => {
                let $tags = $normalized.typed::<Vec<u8>>();
                $body
            }
            ReprKind::Text => {
                let $tags = $normalized.typed::<String>();
                $body
            }
            ReprKind::Symbol => {
                let $tags = $normalized.typed::<Symbol>();
                $body
            }
        }
    };
}

fn respond<'a, T>(
    env: Env<'a>,
    result: Result<T, QueryError>,
    ok: impl FnOnce(T) -> NifResult<Term<'a>>,
) -> NifResult<Term<'a>> {
    match result {
        Ok(value) => ok(value),
        Err(e) => term::error_to_term(env, &e),
    }
}

fn decode_tags(tags: Vec<Term<'_>>) -> NifResult<Vec<AnyTag>> {
    tags.into_iter().map(term::decode_tag).collect()
}

fn get_as<'a, R: EncodeRepr>(env: Env<'a>, source: Source<'_>, tag: &R) -> NifResult<Term<'a>> {
    respond(env, query::get(source, tag), |values| term::values_to_term(env, &values))
}

fn xpath_as<'a, R: EncodeRepr>(env: Env<'a>, source: Source<'_>, expression: &R) -> NifResult<Term<'a>> {
    respond(env, query::xpath(source, expression), |found| {
        term::optional_values_to_term(env, found.as_deref())
    })
}

fn text_as<'a, R: EncodeRepr>(env: Env<'a>, source: Source<'_>, expression: &R) -> NifResult<Term<'a>> {
    respond(env, query::text(source, expression), |value| {
        term::optional_value_to_term(env, value.as_ref())
    })
}

fn to_map_as<'a, R: EncodeRepr>(
    env: Env<'a>,
    source: Source<'_>,
    tags: Result<Vec<R>, RepresentationError>,
) -> NifResult<Term<'a>> {
    let result = tags
        .map_err(QueryError::from)
        .and_then(|tags| query::to_map(source, &tags));
    respond(env, result, |map| term::projection_to_term(env, &map))
}

fn xpath_many_as<'a, R: EncodeRepr + Send + Sync>(
    env: Env<'a>,
    root: &Element,
    expressions: Result<Vec<R>, RepresentationError>,
) -> NifResult<Term<'a>> {
    let expressions = match expressions {
        Ok(expressions) => expressions,
        Err(e) => return term::error_to_term(env, &e.into()),
    };
    let results = query::xpath_many(root, &expressions);
    let mut list = Term::list_new_empty(env);
    for result in results.into_iter().rev() {
        let item = respond(env, result, |found| term::optional_values_to_term(env, found.as_deref()))?;
        list = list.list_prepend(item);
    }
    Ok(list)
}

// ============================================================================
// NIFs
// ============================================================================

/// Parse XML (binary or charlist) into a document reference.
/// Returns `{:ok, doc}` or `{:error, {kind, details}}`; a document passes through.
#[rustler::nif]
fn parse<'a>(env: Env<'a>, input: Term<'a>) -> NifResult<Term<'a>> {
    let doc = match term::decode_source(input)? {
        SourceTerm::Document(doc) => doc,
        SourceTerm::Raw(binary) => match query::parse(binary.as_slice()) {
            Ok(doc) => ResourceArc::new(DocumentResource::new(doc)),
            Err(e) => return term::error_to_term(env, &e),
        },
        SourceTerm::Chars(bytes) => match query::parse(&bytes) {
            Ok(doc) => ResourceArc::new(DocumentResource::new(doc)),
            Err(e) => return term::error_to_term(env, &e),
        },
    };
    Ok((term::ok(), doc).encode(env))
}

/// Values for a bare tag or path; always a list
#[rustler::nif]
fn get<'a>(env: Env<'a>, source: Term<'a>, tag: Term<'a>) -> NifResult<Term<'a>> {
    let source = term::decode_source(source)?;
    let tag = term::decode_tag(tag)?;
    with_repr!(tag, t => get_as(env, source.as_source(), &t))
}

/// Values for a path; `nil` when nothing matched
#[rustler::nif]
fn xpath<'a>(env: Env<'a>, source: Term<'a>, expression: Term<'a>) -> NifResult<Term<'a>> {
    let source = term::decode_source(source)?;
    let expression = term::decode_tag(expression)?;
    with_repr!(expression, e => xpath_as(env, source.as_source(), &e))
}

/// String value of the first match; `nil` when nothing matched
#[rustler::nif]
fn text<'a>(env: Env<'a>, source: Term<'a>, expression: Term<'a>) -> NifResult<Term<'a>> {
    let source = term::decode_source(source)?;
    let expression = term::decode_tag(expression)?;
    with_repr!(expression, e => text_as(env, source.as_source(), &e))
}

/// Nested map of the requested tags
#[rustler::nif]
fn to_map<'a>(env: Env<'a>, source: Term<'a>, tags: Vec<Term<'a>>) -> NifResult<Term<'a>> {
    let source = term::decode_source(source)?;
    let normalized = match repr::normalize(&decode_tags(tags)?) {
        Ok(normalized) => normalized,
        Err(e) => return term::error_to_term(env, &e.into()),
    };
    with_repr_list!(normalized, tags => to_map_as(env, source.as_source(), tags))
}

/// Evaluate paths in parallel; one result per expression
#[rustler::nif(schedule = "DirtyCpu")]
fn xpath_many<'a>(env: Env<'a>, doc_ref: DocumentRef, expressions: Vec<Term<'a>>) -> NifResult<Term<'a>> {
    let normalized = match repr::normalize(&decode_tags(expressions)?) {
        Ok(normalized) => normalized,
        Err(e) => return term::error_to_term(env, &e.into()),
    };
    let root = doc_ref.doc.root();
    with_repr_list!(normalized, expressions => xpath_many_as(env, root, expressions))
}

// ============================================================================
// NIF Initialization
// ============================================================================

#[allow(non_local_definitions)]
fn load(env: Env, _info: Term) -> bool {
    let _ = env; // DocumentResource is registered via #[rustler::resource_impl]
    true
}

rustler::init!("Elixir.XmlQuery.Native", load = load);
