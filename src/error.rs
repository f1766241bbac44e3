//! Error Types
//!
//! One taxonomy for everything the query layer can reject:
//! - `ParseError`: the document (or a synthetic tag document) is not well-formed
//! - `PathError`: a path expression does not follow the path grammar
//! - `RepresentationError`: tags or values cannot move between representations
//! - `QueryError`: what every public operation returns

use std::fmt;

/// Location inside a parsed input. Line and column are 1-based, offset is a byte index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    /// Compute the line/column of a byte offset
    pub fn locate(input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let before = &input[..offset];
        let line = memchr::memchr_iter(b'\n', before).count() + 1;
        let line_start = memchr::memrchr(b'\n', before).map_or(0, |p| p + 1);
        // Columns count characters, not bytes
        let column = before[line_start..]
            .iter()
            .filter(|&&b| (b & 0xC0) != 0x80)
            .count()
            + 1;
        Position { line, column, offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Classification of a document failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    MismatchedEndTag,
    UnexpectedEndTag,
    InvalidName,
    UnexpectedEof,
    UnclosedElement,
    DuplicateAttribute,
    InvalidAttribute,
    UndefinedEntity,
    InvalidCharacterReference,
    InvalidComment,
    InvalidDeclaration,
    MissingRoot,
    MultipleRoots,
    ContentOutsideRoot,
    InvalidEncoding,
    UndeclaredElement,
    InvalidContent,
    MissingRequiredAttribute,
    RootNameMismatch,
    UnboundPrefix,
    NestingTooDeep,
}

impl ParseErrorKind {
    /// Stable symbol for the classification (used as the atom at the NIF boundary)
    pub fn symbol(self) -> &'static str {
        match self {
            ParseErrorKind::MismatchedEndTag => "mismatched_end_tag",
            ParseErrorKind::UnexpectedEndTag => "unexpected_end_tag",
            ParseErrorKind::InvalidName => "invalid_name",
            ParseErrorKind::UnexpectedEof => "unexpected_eof",
            ParseErrorKind::UnclosedElement => "unclosed_element",
            ParseErrorKind::DuplicateAttribute => "duplicate_attribute",
            ParseErrorKind::InvalidAttribute => "invalid_attribute",
            ParseErrorKind::UndefinedEntity => "undefined_entity",
            ParseErrorKind::InvalidCharacterReference => "invalid_character_reference",
            ParseErrorKind::InvalidComment => "invalid_comment",
            ParseErrorKind::InvalidDeclaration => "invalid_declaration",
            ParseErrorKind::MissingRoot => "missing_root",
            ParseErrorKind::MultipleRoots => "multiple_roots",
            ParseErrorKind::ContentOutsideRoot => "content_outside_root",
            ParseErrorKind::InvalidEncoding => "invalid_encoding",
            ParseErrorKind::UndeclaredElement => "undeclared_element",
            ParseErrorKind::InvalidContent => "invalid_content",
            ParseErrorKind::MissingRequiredAttribute => "missing_required_attribute",
            ParseErrorKind::RootNameMismatch => "root_name_mismatch",
            ParseErrorKind::UnboundPrefix => "unbound_prefix",
            ParseErrorKind::NestingTooDeep => "nesting_too_deep",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A document failed well-formedness or DTD validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {position}: {token:?}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// The offending fragment (tag name, entity, ...)
    pub token: String,
    pub position: Position,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, token: impl Into<String>, position: Position) -> Self {
        ParseError {
            kind,
            token: token.into(),
            position,
        }
    }

    /// Build an error at a byte offset, resolving line/column against the input
    pub fn at(kind: ParseErrorKind, token: &[u8], input: &[u8], offset: usize) -> Self {
        ParseError::new(
            kind,
            String::from_utf8_lossy(token).into_owned(),
            Position::locate(input, offset),
        )
    }
}

/// A path expression does not follow the path grammar
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset} in {expression:?}")]
pub struct PathError {
    pub message: String,
    pub expression: String,
    pub offset: usize,
}

impl PathError {
    pub fn new(message: impl Into<String>, expression: &str, offset: usize) -> Self {
        PathError {
            message: message.into(),
            expression: expression.to_string(),
            offset,
        }
    }
}

/// Which of the three textual families a tag or value lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReprKind {
    Bytes,
    Text,
    Symbol,
}

impl fmt::Display for ReprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReprKind::Bytes => "bytes",
            ReprKind::Text => "text",
            ReprKind::Symbol => "symbol",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepresentationError {
    #[error("tag {index} is {found}, expected {expected} like the first tag")]
    MixedRepresentation {
        index: usize,
        expected: ReprKind,
        found: ReprKind,
    },
    #[error("value is not valid UTF-8 and cannot be converted to {0}")]
    InvalidUtf8(ReprKind),
    #[error("empty tag")]
    EmptyTag,
}

/// Error returned by every public query operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] ParseError),

    #[error("invalid tag name {tag:?} ({kind} at {line}:{column})")]
    InvalidTagName {
        tag: String,
        kind: ParseErrorKind,
        line: usize,
        column: usize,
    },

    #[error("invalid path expression: {0}")]
    InvalidPathExpression(#[from] PathError),

    #[error("namespace node selected where a value was expected (prefix {prefix:?})")]
    UnsupportedNamespaceSelection { prefix: Option<String> },

    #[error(transparent)]
    Representation(#[from] RepresentationError),
}

impl QueryError {
    /// Stable symbol for the error class (used as the atom at the NIF boundary)
    pub fn symbol(&self) -> &'static str {
        match self {
            QueryError::MalformedDocument(_) => "malformed_document",
            QueryError::InvalidTagName { .. } => "invalid_tag_name",
            QueryError::InvalidPathExpression(_) => "invalid_path_expression",
            QueryError::UnsupportedNamespaceSelection { .. } => "unsupported_namespace_selection",
            QueryError::Representation(_) => "representation_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_first_line() {
        let pos = Position::locate(b"<x>this</xml>", 7);
        assert_eq!(pos, Position { line: 1, column: 8, offset: 7 });
    }

    #[test]
    fn test_locate_counts_lines_and_chars() {
        let input = "<a>\n  <é/>\n</a>".as_bytes();
        let offset = input.iter().position(|&b| b == b'/').unwrap();
        let pos = Position::locate(input, offset);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 5);
    }

    #[test]
    fn test_error_symbols() {
        let err = QueryError::from(ParseError::new(
            ParseErrorKind::MismatchedEndTag,
            "xml",
            Position::default(),
        ));
        assert_eq!(err.symbol(), "malformed_document");
        assert_eq!(ParseErrorKind::MismatchedEndTag.symbol(), "mismatched_end_tag");
    }
}
