//! Query evaluation
//!
//! A bare tag is checked by parsing `<tag></tag>` and then searched anywhere
//! in the document as `//tag`. Anything else is a path and goes to the
//! evaluator untouched.

use crate::dom::{Element, NodeRef};
use crate::engine::{DocumentParser, PathEvaluator};
use crate::error::{ParseErrorKind, QueryError};
use tracing::trace;

/// How an expression is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expression<'a> {
    BareTag(&'a [u8]),
    Path(&'a [u8]),
}

impl<'a> Expression<'a> {
    /// An expression is a bare tag unless it contains path syntax or is one
    /// of the abbreviated steps `.` and `..`
    pub fn classify(expression: &'a [u8]) -> Self {
        let is_path = matches!(expression, b"." | b"..")
            || expression.iter().any(|&b| {
                matches!(
                    b,
                    b'/' | b'[' | b']' | b'(' | b')' | b'@' | b'*' | b'|' | b'=' | b'!' | b'<' | b'>' | b'$' | b',' | b'\'' | b'"'
                ) || crate::core::scanner::is_whitespace(b)
            })
            || memchr::memmem::find(expression, b"::").is_some();

        if is_path {
            Expression::Path(expression)
        } else {
            Expression::BareTag(expression)
        }
    }
}

/// Unanchored search for a tag: `//tag`
pub fn expand(tag: &[u8]) -> Vec<u8> {
    let mut expression = Vec::with_capacity(tag.len() + 2);
    expression.extend_from_slice(b"//");
    expression.extend_from_slice(tag);
    expression
}

/// Check that a tag works as an element name by parsing `<tag></tag>`.
/// An unbound prefix is fine here; the tag only has to be a legal name.
pub fn validate_tag<P: DocumentParser + ?Sized>(parser: &P, tag: &[u8]) -> Result<(), QueryError> {
    let mut synthetic = Vec::with_capacity(tag.len() * 2 + 5);
    synthetic.push(b'<');
    synthetic.extend_from_slice(tag);
    synthetic.extend_from_slice(b"></");
    synthetic.extend_from_slice(tag);
    synthetic.push(b'>');

    match parser.parse_document(&synthetic) {
        Ok(_) => Ok(()),
        Err(e) if e.kind == ParseErrorKind::UnboundPrefix => Ok(()),
        Err(e) => Err(QueryError::InvalidTagName {
            tag: String::from_utf8_lossy(tag).into_owned(),
            kind: e.kind,
            line: e.position.line,
            column: e.position.column,
        }),
    }
}

/// Evaluate a path expression verbatim
pub fn evaluate_path<'d, E: PathEvaluator + ?Sized>(
    evaluator: &E,
    root: &'d Element,
    expression: &[u8],
) -> Result<Vec<NodeRef<'d>>, QueryError> {
    Ok(evaluator.evaluate_path(root, expression)?)
}

/// Evaluate several path expressions verbatim against one tree
pub fn evaluate_paths<'d, E: PathEvaluator + ?Sized>(
    evaluator: &E,
    root: &'d Element,
    expressions: &[&[u8]],
) -> Result<Vec<Vec<NodeRef<'d>>>, QueryError> {
    evaluator
        .evaluate_paths(root, expressions)
        .into_iter()
        .map(|found| found.map_err(QueryError::from))
        .collect()
}

/// Evaluate a bare tag or a path expression
pub fn evaluate<'d, P, E>(parser: &P, evaluator: &E, root: &'d Element, expression: &[u8]) -> Result<Vec<NodeRef<'d>>, QueryError>
where
    P: DocumentParser + ?Sized,
    E: PathEvaluator + ?Sized,
{
    match Expression::classify(expression) {
        Expression::Path(path) => evaluate_path(evaluator, root, path),
        Expression::BareTag(tag) => {
            validate_tag(parser, tag)?;
            let expanded = expand(tag);
            trace!(tag = %String::from_utf8_lossy(tag), "expanded bare tag");
            evaluate_path(evaluator, root, &expanded)
        }
    }
}
