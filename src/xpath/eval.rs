//! Path Evaluation Engine
//!
//! Evaluates compiled path expressions against an element tree. Every value on
//! the stack is a node-set in document order.

use super::axes::{matches_node_test, navigate};
use super::compiler::{CompiledExpr, CompiledPredicate, CompiledStep, Op};
use super::index::{NodeId, TreeIndex, DOCUMENT, ROOT_ELEMENT};
use crate::dom::{Element, NodeRef};
use std::collections::HashSet;

/// Evaluate a compiled expression with the root element as context node.
/// The virtual document node never appears in the result.
pub fn evaluate<'d>(root: &'d Element, expr: &CompiledExpr) -> Vec<NodeRef<'d>> {
    evaluate_indexed(&TreeIndex::build(root), expr)
}

/// [`evaluate`] over an index that is already built
pub fn evaluate_indexed<'d>(index: &TreeIndex<'d>, expr: &CompiledExpr) -> Vec<NodeRef<'d>> {
    evaluate_compiled(index, expr, ROOT_ELEMENT)
        .into_iter()
        .filter_map(|id| index.node(id))
        .collect()
}

/// Evaluate a compiled expression from a context node
pub fn evaluate_compiled(index: &TreeIndex<'_>, expr: &CompiledExpr, context: NodeId) -> Vec<NodeId> {
    let mut stack: Vec<Vec<NodeId>> = Vec::new();

    for op in &expr.ops {
        match op {
            Op::Root => stack.push(vec![DOCUMENT]),
            Op::Context => stack.push(vec![context]),
            Op::Step(step) => {
                let nodes = stack.pop().unwrap_or_else(|| vec![context]);
                stack.push(apply_step(index, &nodes, step));
            }
            Op::Union => {
                let right = stack.pop().unwrap_or_default();
                let left = stack.pop().unwrap_or_default();
                let mut seen: HashSet<NodeId> = left.iter().copied().collect();
                let mut result = left;
                result.extend(right.into_iter().filter(|id| seen.insert(*id)));
                result.sort_unstable();
                stack.push(result);
            }
        }
    }

    stack.pop().unwrap_or_default()
}

/// Select a step from every node of a node-set. Predicates see each context
/// node's candidates in axis order; the merged result is in document order.
fn apply_step(index: &TreeIndex<'_>, nodes: &[NodeId], step: &CompiledStep) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for &node in nodes {
        let mut candidates: Vec<NodeId> = navigate(index, node, step.axis)
            .into_iter()
            .filter(|&id| matches_node_test(index, id, step.axis, &step.node_test))
            .collect();
        for predicate in &step.predicates {
            candidates = filter_predicate(index, candidates, predicate);
        }
        result.extend(candidates.into_iter().filter(|id| seen.insert(*id)));
    }

    result.sort_unstable();
    result
}

fn filter_predicate(index: &TreeIndex<'_>, candidates: Vec<NodeId>, predicate: &CompiledPredicate) -> Vec<NodeId> {
    let size = candidates.len();
    match predicate {
        CompiledPredicate::Position(n) => candidates
            .into_iter()
            .enumerate()
            .filter(|(i, _)| (*i + 1) as f64 == *n)
            .map(|(_, id)| id)
            .collect(),
        CompiledPredicate::Last => candidates.into_iter().skip(size.saturating_sub(1)).collect(),
        CompiledPredicate::Exists(inner) => candidates
            .into_iter()
            .filter(|&id| !evaluate_compiled(index, inner, id).is_empty())
            .collect(),
    }
}
