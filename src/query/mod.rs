//! Query operations
//!
//! `Query` binds a `DocumentParser` and a `PathEvaluator` and exposes the
//! public operations over raw XML, parsed documents or elements:
//! - `get`: bare tags or paths, always a list
//! - `xpath`: paths, `None` when nothing matched
//! - `to_map`: nested projection of a tag list
//! - `text`: string value of the first match
//! - `xpath_many`: independent paths in parallel
//!
//! The free functions use a process-wide `XmlEngine`.

pub mod evaluator;
pub mod extract;
pub mod parallel;
pub mod project;

pub use project::{Projected, ProjectionMap};

use crate::dom::{Document, Element};
use crate::engine::{DocumentParser, PathEvaluator, XmlEngine};
use crate::error::QueryError;
use crate::repr::Repr;
use std::borrow::Cow;
use std::sync::LazyLock;

/// What a query runs against
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Unparsed XML
    Raw(&'a [u8]),
    Document(&'a Document),
    Element(&'a Element),
}

impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(raw: &'a [u8]) -> Self {
        Source::Raw(raw)
    }
}

impl<'a> From<&'a Vec<u8>> for Source<'a> {
    fn from(raw: &'a Vec<u8>) -> Self {
        Source::Raw(raw)
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(raw: &'a str) -> Self {
        Source::Raw(raw.as_bytes())
    }
}

impl<'a> From<&'a String> for Source<'a> {
    fn from(raw: &'a String) -> Self {
        Source::Raw(raw.as_bytes())
    }
}

impl<'a> From<&'a Document> for Source<'a> {
    fn from(doc: &'a Document) -> Self {
        Source::Document(doc)
    }
}

impl<'a> From<&'a Element> for Source<'a> {
    fn from(element: &'a Element) -> Self {
        Source::Element(element)
    }
}

/// Query operations over injected collaborators
pub struct Query<'e, P: ?Sized, E: ?Sized> {
    parser: &'e P,
    evaluator: &'e E,
}

impl<P: ?Sized, E: ?Sized> Clone for Query<'_, P, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: ?Sized, E: ?Sized> Copy for Query<'_, P, E> {}

impl<'e, P, E> Query<'e, P, E>
where
    P: DocumentParser + ?Sized,
    E: PathEvaluator + ?Sized,
{
    pub fn new(parser: &'e P, evaluator: &'e E) -> Self {
        Query { parser, evaluator }
    }

    pub fn parse(&self, xml: &[u8]) -> Result<Document, QueryError> {
        Ok(self.parser.parse_document(xml)?)
    }

    /// The element to query; raw input is parsed, parsed input is borrowed
    pub fn resolve<'s>(&self, source: impl Into<Source<'s>>) -> Result<Cow<'s, Element>, QueryError> {
        Ok(match source.into() {
            Source::Raw(raw) => Cow::Owned(self.parse(raw)?.into_root()),
            Source::Document(doc) => Cow::Borrowed(doc.root()),
            Source::Element(element) => Cow::Borrowed(element),
        })
    }

    /// Values for a bare tag (searched anywhere) or a path. Nothing matched
    /// and matched-without-text both give an empty list.
    pub fn get<'s, R: Repr>(&self, source: impl Into<Source<'s>>, tag: &R) -> Result<Vec<R>, QueryError> {
        let root = self.resolve(source)?;
        let nodes = evaluator::evaluate(self.parser, self.evaluator, &root, &tag.to_canonical())?;
        extract::extract_values(&nodes)
    }

    /// Values for a path expression; `None` when nothing matched
    pub fn xpath<'s, R: Repr>(&self, source: impl Into<Source<'s>>, expression: &R) -> Result<Option<Vec<R>>, QueryError> {
        let root = self.resolve(source)?;
        let nodes = evaluator::evaluate_path(self.evaluator, &root, &expression.to_canonical())?;
        extract::extract_values_or_none(&nodes)
    }

    /// Project tags into a nested map
    pub fn to_map<'s, R: Repr>(&self, source: impl Into<Source<'s>>, tags: &[R]) -> Result<ProjectionMap<R>, QueryError> {
        let root = self.resolve(source)?;
        project::project(self.parser, self.evaluator, &root, tags)
    }

    /// String value of the first node a bare tag or path selects
    pub fn text<'s, R: Repr>(&self, source: impl Into<Source<'s>>, expression: &R) -> Result<Option<R>, QueryError> {
        let root = self.resolve(source)?;
        let nodes = evaluator::evaluate(self.parser, self.evaluator, &root, &expression.to_canonical())?;
        extract::first_string_value(&nodes)
    }
}

static DEFAULT_ENGINE: LazyLock<XmlEngine> = LazyLock::new(XmlEngine::default);

/// The process-wide engine behind the free functions
pub fn default_engine() -> &'static XmlEngine {
    &DEFAULT_ENGINE
}

/// `Query` over the default engine
pub fn default_query() -> Query<'static, XmlEngine, XmlEngine> {
    let engine = default_engine();
    Query::new(engine, engine)
}

/// Parse XML with the default engine
pub fn parse(xml: impl AsRef<[u8]>) -> Result<Document, QueryError> {
    default_query().parse(xml.as_ref())
}

pub fn get<'s, R: Repr>(source: impl Into<Source<'s>>, tag: &R) -> Result<Vec<R>, QueryError> {
    default_query().get(source, tag)
}

pub fn xpath<'s, R: Repr>(source: impl Into<Source<'s>>, expression: &R) -> Result<Option<Vec<R>>, QueryError> {
    default_query().xpath(source, expression)
}

pub fn to_map<'s, R: Repr>(source: impl Into<Source<'s>>, tags: &[R]) -> Result<ProjectionMap<R>, QueryError> {
    default_query().to_map(source, tags)
}

pub fn text<'s, R: Repr>(source: impl Into<Source<'s>>, expression: &R) -> Result<Option<R>, QueryError> {
    default_query().text(source, expression)
}

pub fn xpath_many<R: Repr + Send + Sync>(root: &Element, expressions: &[R]) -> Vec<Result<Option<Vec<R>>, QueryError>> {
    default_query().xpath_many(root, expressions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Node, NodeRef, Symbol};
    use crate::error::{ParseError, ParseErrorKind, PathError, Position};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Parser that always yields the same tree and an evaluator that only
    /// knows `//name` and `//name/text()`; both record their inputs.
    struct FakeEngine {
        root: Element,
        parsed: Mutex<Vec<String>>,
        evaluated: Mutex<Vec<String>>,
    }

    impl FakeEngine {
        fn new(root: Element) -> Self {
            FakeEngine {
                root,
                parsed: Mutex::new(Vec::new()),
                evaluated: Mutex::new(Vec::new()),
            }
        }

        fn parsed(&self) -> Vec<String> {
            self.parsed.lock().unwrap().clone()
        }

        fn evaluated(&self) -> Vec<String> {
            self.evaluated.lock().unwrap().clone()
        }
    }

    fn collect<'d>(element: &'d Element, name: &str, out: &mut Vec<NodeRef<'d>>) {
        if &*element.name == name {
            out.push(NodeRef::Element(element));
        }
        for child in element.child_elements() {
            collect(child, name, out);
        }
    }

    impl DocumentParser for FakeEngine {
        fn parse_document(&self, raw: &[u8]) -> Result<Document, ParseError> {
            let raw = String::from_utf8_lossy(raw).into_owned();
            self.parsed.lock().unwrap().push(raw.clone());
            if raw.as_bytes().get(1).is_some_and(u8::is_ascii_alphabetic) {
                Ok(Document::from_root(self.root.clone()))
            } else {
                Err(ParseError::new(
                    ParseErrorKind::InvalidName,
                    raw,
                    Position { line: 1, column: 2, offset: 1 },
                ))
            }
        }
    }

    impl PathEvaluator for FakeEngine {
        fn evaluate_path<'d>(&self, root: &'d Element, expression: &[u8]) -> Result<Vec<NodeRef<'d>>, PathError> {
            let expression = String::from_utf8_lossy(expression).into_owned();
            self.evaluated.lock().unwrap().push(expression.clone());
            let Some(path) = expression.strip_prefix("//") else {
                return Err(PathError::new("unsupported", &expression, 0));
            };
            let (name, text_only) = match path.strip_suffix("/text()") {
                Some(name) => (name, true),
                None => (path, false),
            };
            let mut elements = Vec::new();
            collect(root, name, &mut elements);
            if !text_only {
                return Ok(elements);
            }
            Ok(elements
                .into_iter()
                .filter_map(NodeRef::as_element)
                .flat_map(|e| e.text_children().map(NodeRef::Text))
                .collect())
        }
    }

    fn fun() -> Element {
        Element::new("fun")
            .with_child(Element::new("bag").with_child(Node::text("cat")))
            .with_child(Element::new("bag").with_child(Node::text("brown")))
    }

    #[test]
    fn test_get_validates_then_expands_bare_tags() {
        let fake = FakeEngine::new(fun());
        let query = Query::new(&fake, &fake);
        let doc = Document::from_root(fun());
        let values = query.get(&doc, &"bag".to_string()).unwrap();
        assert_eq!(values, vec!["cat", "brown"]);
        assert_eq!(fake.parsed(), vec!["<bag></bag>"]);
        assert_eq!(fake.evaluated(), vec!["//bag"]);
    }

    #[test]
    fn test_raw_source_is_parsed_once() {
        let fake = FakeEngine::new(fun());
        let query = Query::new(&fake, &fake);
        query.get("<fun/>", &"bag".to_string()).unwrap();
        assert_eq!(fake.parsed(), vec!["<fun/>", "<bag></bag>"]);

        let doc = query.parse(b"<fun/>").unwrap();
        query.get(&doc, &"bag".to_string()).unwrap();
        assert_eq!(fake.parsed().len(), 4);
    }

    #[test]
    fn test_invalid_tag_stops_before_evaluation() {
        let fake = FakeEngine::new(fun());
        let query = Query::new(&fake, &fake);
        let err = query.get(&fake.root, &b"1bag".to_vec()).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidTagName {
                tag: "1bag".to_string(),
                kind: ParseErrorKind::InvalidName,
                line: 1,
                column: 2,
            }
        );
        assert!(fake.evaluated().is_empty());
    }

    #[test]
    fn test_xpath_is_verbatim() {
        let fake = FakeEngine::new(fun());
        let query = Query::new(&fake, &fake);
        let values = query.xpath(&fake.root, &"//bag/text()".to_string()).unwrap();
        assert_eq!(values, Some(vec!["cat".to_string(), "brown".to_string()]));
        assert_eq!(query.xpath(&fake.root, &"//fun".to_string()).unwrap(), Some(vec![]));
        assert_eq!(query.xpath(&fake.root, &"//chance".to_string()).unwrap(), None);
        assert!(fake.parsed().is_empty());
        assert!(matches!(
            query.xpath(&fake.root, &"bag".to_string()),
            Err(QueryError::InvalidPathExpression(_))
        ));
    }

    #[test]
    fn test_to_map_with_fake() {
        let fake = FakeEngine::new(fun());
        let query = Query::new(&fake, &fake);
        let map = query.to_map(&fake.root, &[Symbol::from("bag"), Symbol::from("chance")]).unwrap();
        assert_eq!(map[&Symbol::from("bag")], Projected::Value(Symbol::from("cat")));
        assert_eq!(map[&Symbol::from("chance")], Projected::Missing);
    }

    const BAGS: &str = "<fun><bag>cat</bag><bag>brown</bag></fun>";
    const FUN: &str = "<fun><bag>cat</bag><house>dog</house></fun>";

    #[test]
    fn test_get_multiple_matches_in_order() {
        let doc = parse(BAGS).unwrap();
        assert_eq!(get(&doc, &"bag".to_string()).unwrap(), vec!["cat", "brown"]);
        assert_eq!(get(BAGS, &b"bag".to_vec()).unwrap(), vec![b"cat".to_vec(), b"brown".to_vec()]);
        assert_eq!(
            get(&doc, &Symbol::from("bag")).unwrap(),
            vec![Symbol::from("cat"), Symbol::from("brown")]
        );
    }

    #[test]
    fn test_get_matches_xpath_shorthand() {
        let doc = parse(FUN).unwrap();
        for tag in ["bag", "house", "fun", "chance"] {
            let via_get = get(&doc, &tag.to_string()).unwrap();
            let via_xpath = xpath(&doc, &format!("//{tag}")).unwrap().unwrap_or_default();
            assert_eq!(via_get, via_xpath, "{tag}");
        }
    }

    #[test]
    fn test_xpath_absent_versus_empty() {
        let doc = parse(FUN).unwrap();
        assert_eq!(xpath(&doc, &"//chance".to_string()).unwrap(), None);
        assert_eq!(xpath(&doc, &"/fun".to_string()).unwrap(), Some(vec![]));
        assert_eq!(xpath(&doc, &"/fun/house/text()".to_string()).unwrap(), Some(vec!["dog".to_string()]));
        // the root-only tag query gives [] through get
        assert!(get(&doc, &"fun".to_string()).unwrap().is_empty());
        assert!(get(&doc, &"chance".to_string()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let doc = parse(FUN).unwrap();
        assert!(matches!(get(&doc, &"1bag".to_string()), Err(QueryError::InvalidTagName { .. })));
        assert!(matches!(
            xpath(&doc, &"/fun/[".to_string()),
            Err(QueryError::InvalidPathExpression(_))
        ));
        let err = parse("<x>this</xml>").unwrap_err();
        let QueryError::MalformedDocument(e) = &err else {
            panic!("expected a malformed document, got {err:?}");
        };
        assert_eq!(e.kind, ParseErrorKind::MismatchedEndTag);
        assert!(matches!(get("<x>this</xml>", &"x".to_string()), Err(QueryError::MalformedDocument(_))));
    }

    #[test]
    fn test_abbreviated_steps_are_paths() {
        let doc = parse("<fun>top<bag>cat</bag></fun>").unwrap();
        assert_eq!(get(&doc, &".".to_string()).unwrap(), vec!["top".to_string()]);
        assert_eq!(get(&doc, &"..".to_string()).unwrap(), Vec::<String>::new());
        assert_eq!(xpath(&doc, &"..".to_string()).unwrap(), None);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 60_000;
        let deep = format!("{}x{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let err = get(deep.as_str(), &"a".to_string()).unwrap_err();
        let QueryError::MalformedDocument(e) = &err else {
            panic!("expected a malformed document, got {err:?}");
        };
        assert_eq!(e.kind, ParseErrorKind::NestingTooDeep);

        let within = format!("{}x{}", "<a>".repeat(200), "</a>".repeat(200));
        let doc = parse(&within).unwrap();
        assert_eq!(get(&doc, &"a".to_string()).unwrap(), vec!["x".to_string()]);
        assert_eq!(text(&doc, &"a".to_string()).unwrap().as_deref(), Some("x"));
        assert_eq!(to_map(&doc, &["a".to_string()]).unwrap()["a"], Projected::Value("x".to_string()));
    }

    #[test]
    fn test_parse_simple_document() {
        let doc = parse("<xml>this</xml>").unwrap();
        assert_eq!(&*doc.root().name, "xml");
        assert_eq!(doc.root().content, vec![Node::text("this")]);
    }

    #[test]
    fn test_to_map() {
        let map = to_map(FUN, &["bag".to_string(), "house".to_string()]).unwrap();
        assert_eq!(
            map,
            HashMap::from([
                ("bag".to_string(), Projected::Value("cat".to_string())),
                ("house".to_string(), Projected::Value("dog".to_string())),
            ])
        );

        let map = to_map(FUN, &["fun".to_string()]).unwrap();
        let Projected::Nested(fun) = &map["fun"] else {
            panic!("expected a nested map");
        };
        assert_eq!(fun["bag"], Projected::Value("cat".to_string()));
        assert_eq!(fun["house"], Projected::Value("dog".to_string()));

        assert_eq!(to_map(FUN, &["chance".to_string()]).unwrap()["chance"], Projected::Missing);
        assert_eq!(
            to_map(BAGS, &["bag".to_string()]).unwrap()["bag"],
            Projected::Value("cat".to_string())
        );
    }

    #[test]
    fn test_text() {
        let doc = parse("<fun><bag>brown <b>big</b> fox</bag></fun>").unwrap();
        assert_eq!(text(&doc, &"bag".to_string()).unwrap().as_deref(), Some("brown big fox"));
        assert_eq!(text(&doc, &"chance".to_string()).unwrap(), None);
    }

    #[test]
    fn test_namespace_selection_is_an_error() {
        let doc = parse(r#"<fun xmlns:p="urn:p"><bag>cat</bag></fun>"#).unwrap();
        assert_eq!(
            xpath(&doc, &"/fun/namespace::*".to_string()),
            Err(QueryError::UnsupportedNamespaceSelection {
                prefix: Some("p".to_string())
            })
        );
    }
}
