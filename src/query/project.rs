//! Map projection
//!
//! Each requested tag is searched with `//tag`. A tag that is missing maps to
//! `Missing`, a tag with text maps to its first value, and a textless container
//! maps to a nested projection of its child element names, scoped under it
//! (`//tag/child`, `//tag/child/grandchild`, ...).

use super::evaluator::{evaluate_paths, expand, validate_tag};
use super::extract::extract_values_or_none;
use crate::dom::{Element, NodeRef};
use crate::engine::{DocumentParser, PathEvaluator};
use crate::error::QueryError;
use crate::repr::Repr;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::trace;

/// Result of projecting one tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projected<R: Eq + Hash> {
    Value(R),
    /// The tag does not occur anywhere
    Missing,
    Nested(ProjectionMap<R>),
}

pub type ProjectionMap<R> = HashMap<R, Projected<R>>;

/// A tag or child scope waiting to be projected
struct Entry<R> {
    key: R,
    scope: Vec<u8>,
    shape: Shape<R>,
}

enum Shape<R> {
    Missing,
    Value(R),
    /// Indices of the children's entries
    Container(Vec<usize>),
}

/// Project `tags` from a document rooted at `root`.
///
/// Scopes are resolved one nesting level at a time, so each level costs two
/// batched evaluations over the same tree.
pub fn project<R, P, E>(parser: &P, evaluator: &E, root: &Element, tags: &[R]) -> Result<ProjectionMap<R>, QueryError>
where
    R: Repr,
    P: DocumentParser + ?Sized,
    E: PathEvaluator + ?Sized,
{
    let mut entries: Vec<Entry<R>> = Vec::with_capacity(tags.len());
    let mut requested = HashSet::with_capacity(tags.len());
    for tag in tags {
        if !requested.insert(tag) {
            continue;
        }
        let canonical = tag.to_canonical();
        validate_tag(parser, &canonical)?;
        entries.push(Entry {
            key: tag.clone(),
            scope: expand(&canonical),
            shape: Shape::Missing,
        });
    }
    let top_level = entries.len();

    let mut level = 0..top_level;
    let mut depth = 0;
    while !level.is_empty() {
        let scopes: Vec<&[u8]> = entries[level.clone()].iter().map(|e| e.scope.as_slice()).collect();
        let found = evaluate_paths(evaluator, root, &scopes)?;

        let mut containers = Vec::new();
        for (id, nodes) in level.zip(found) {
            match extract_values_or_none::<R>(&nodes)? {
                None => {}
                Some(values) => match values.into_iter().next() {
                    Some(first) => entries[id].shape = Shape::Value(first),
                    None => containers.push(id),
                },
            }
        }
        if containers.is_empty() {
            break;
        }

        let child_scopes: Vec<Vec<u8>> = containers
            .iter()
            .map(|&id| [entries[id].scope.as_slice(), &b"/*"[..]].concat())
            .collect();
        let child_scopes: Vec<&[u8]> = child_scopes.iter().map(Vec::as_slice).collect();
        let children = evaluate_paths(evaluator, root, &child_scopes)?;

        let next = entries.len();
        for (&id, nodes) in containers.iter().zip(children) {
            let names = child_names(&nodes);
            trace!(
                scope = %String::from_utf8_lossy(&entries[id].scope),
                depth,
                children = names.len(),
                "projecting container"
            );
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                let scope = [entries[id].scope.as_slice(), &b"/"[..], name.as_bytes()].concat();
                ids.push(entries.len());
                entries.push(Entry {
                    key: R::from_canonical(name.as_bytes())?,
                    scope,
                    shape: Shape::Missing,
                });
            }
            entries[id].shape = Shape::Container(ids);
        }
        level = next..entries.len();
        depth += 1;
    }

    // Children always come after their container, so one backward pass
    // assembles every nested map.
    let mut built: Vec<Option<Projected<R>>> = Vec::with_capacity(entries.len());
    built.resize_with(entries.len(), || None);
    for id in (0..entries.len()).rev() {
        let projected = match std::mem::replace(&mut entries[id].shape, Shape::Missing) {
            Shape::Missing => Projected::Missing,
            Shape::Value(value) => Projected::Value(value),
            Shape::Container(ids) => Projected::Nested(
                ids.into_iter()
                    .filter_map(|child| Some((entries[child].key.clone(), built[child].take()?)))
                    .collect(),
            ),
        };
        built[id] = Some(projected);
    }

    Ok(entries
        .into_iter()
        .zip(built)
        .take(top_level)
        .filter_map(|(entry, projected)| Some((entry.key, projected?)))
        .collect())
}

/// Distinct element names, first occurrence order
fn child_names<'d>(nodes: &[NodeRef<'d>]) -> Vec<&'d str> {
    let mut seen = HashSet::new();
    nodes
        .iter()
        .filter_map(|n| n.name())
        .map(|name| &**name)
        .filter(|name| seen.insert(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Symbol;
    use crate::engine::XmlEngine;
    use crate::error::PathError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how the projection reaches the path engine
    #[derive(Default)]
    struct CountingEngine {
        engine: XmlEngine,
        singles: AtomicUsize,
        batches: AtomicUsize,
    }

    impl PathEvaluator for CountingEngine {
        fn evaluate_path<'d>(&self, root: &'d Element, expression: &[u8]) -> Result<Vec<NodeRef<'d>>, PathError> {
            self.singles.fetch_add(1, Ordering::Relaxed);
            self.engine.evaluate_path(root, expression)
        }

        fn evaluate_paths<'d>(&self, root: &'d Element, expressions: &[&[u8]]) -> Vec<Result<Vec<NodeRef<'d>>, PathError>> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            self.engine.evaluate_paths(root, expressions)
        }
    }

    fn project_xml<R: Repr>(xml: &str, tags: &[R]) -> Result<ProjectionMap<R>, QueryError> {
        let engine = XmlEngine::default();
        let doc = engine.parse_document(xml.as_bytes())?;
        project(&engine, &engine, doc.root(), tags)
    }

    fn text(value: &str) -> Projected<String> {
        Projected::Value(value.to_string())
    }

    #[test]
    fn test_leaf_tags() {
        let map = project_xml(
            "<fun><bag>cat</bag><house>dog</house></fun>",
            &["bag".to_string(), "house".to_string()],
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["bag"], text("cat"));
        assert_eq!(map["house"], text("dog"));
    }

    #[test]
    fn test_container_nests() {
        let map = project_xml("<fun><bag>cat</bag><house>dog</house></fun>", &["fun".to_string()]).unwrap();
        let expected: ProjectionMap<String> =
            HashMap::from([("bag".to_string(), text("cat")), ("house".to_string(), text("dog"))]);
        assert_eq!(map["fun"], Projected::Nested(expected));
    }

    #[test]
    fn test_missing_tag() {
        let map = project_xml("<fun><bag>cat</bag></fun>", &["chance".to_string()]).unwrap();
        assert_eq!(map["chance"], Projected::Missing);
    }

    #[test]
    fn test_first_value_wins() {
        let map = project_xml("<fun><bag>cat</bag><bag>brown</bag></fun>", &["bag".to_string(), "bag".to_string()]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["bag"], text("cat"));
    }

    #[test]
    fn test_nested_values_stay_inside_container() {
        let xml = "<r><name>outer</name><person><name>ann</name><pet><name>rex</name></pet></person></r>";
        let map = project_xml(xml, &[b"person".to_vec()]).unwrap();
        let Projected::Nested(person) = &map[b"person".as_slice()] else {
            panic!("expected a nested map");
        };
        assert_eq!(person[b"name".as_slice()], Projected::Value(b"ann".to_vec()));
        let Projected::Nested(pet) = &person[b"pet".as_slice()] else {
            panic!("expected a nested map");
        };
        assert_eq!(pet[b"name".as_slice()], Projected::Value(b"rex".to_vec()));
    }

    #[test]
    fn test_empty_container_and_symbols() {
        let map = project_xml("<fun><box/></fun>", &[Symbol::from("box")]).unwrap();
        assert_eq!(map[&Symbol::from("box")], Projected::Nested(HashMap::new()));
    }

    #[test]
    fn test_pretty_printed_container() {
        let xml = "<fun>\n  <bag>cat</bag>\n</fun>";
        let map = project_xml(xml, &["fun".to_string()]).unwrap();
        assert_eq!(map["fun"], Projected::Nested(HashMap::from([("bag".to_string(), text("cat"))])));
    }

    #[test]
    fn test_one_batch_pair_per_level() {
        let counting = CountingEngine::default();
        let doc = counting
            .engine
            .parse_document(b"<r><a>1</a><b><c>2</c><d>3</d></b><e/></r>")
            .unwrap();
        let map = project(&counting.engine, &counting, doc.root(), &["r".to_string(), "zz".to_string()]).unwrap();

        let Projected::Nested(r) = &map["r"] else {
            panic!("expected a nested map");
        };
        assert_eq!(r["a"], text("1"));
        assert_eq!(r["e"], Projected::Nested(HashMap::new()));
        assert_eq!(
            r["b"],
            Projected::Nested(HashMap::from([("c".to_string(), text("2")), ("d".to_string(), text("3"))]))
        );
        assert_eq!(map["zz"], Projected::Missing);

        // r, zz | r/* | r/a, r/b, r/e | r/b/*, r/e/* | r/b/c, r/b/d
        assert_eq!(counting.batches.load(Ordering::Relaxed), 5);
        assert_eq!(counting.singles.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_invalid_tag() {
        let err = project_xml("<fun/>", &["1bag".to_string()]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTagName { .. }));
    }
}
