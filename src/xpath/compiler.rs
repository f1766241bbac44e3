//! Path Expression Compiler
//!
//! Compiles parsed path expressions into a flat op list evaluated on a
//! node-set stack.

use super::parser::{Axis, Expr, LocationPath, NodeTest, Predicate};
use crate::error::PathError;

/// Compiled path expression
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    pub ops: Vec<Op>,
}

/// Compiled operation
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push the document node
    Root,
    /// Push the context node
    Context,
    /// Replace the top node-set by the step's selection from each node
    Step(CompiledStep),
    /// Union the two topmost node-sets
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStep {
    pub axis: Axis,
    pub node_test: CompiledNodeTest,
    pub predicates: Vec<CompiledPredicate>,
}

/// Compiled node test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledNodeTest {
    Any,
    Name(String),
    PrefixWildcard(String),
    Node,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledPredicate {
    /// 1-based proximity position; fractional positions never match
    Position(f64),
    Last,
    Exists(CompiledExpr),
}

impl CompiledExpr {
    /// Compile a parsed expression
    pub fn compile(expr: &Expr) -> Self {
        let mut ops = Vec::new();
        Self::compile_expr(expr, &mut ops);
        CompiledExpr { ops }
    }

    fn compile_expr(expr: &Expr, ops: &mut Vec<Op>) {
        match expr {
            Expr::Path(path) => Self::compile_path(path, ops),
            Expr::Union(left, right) => {
                Self::compile_expr(left, ops);
                Self::compile_expr(right, ops);
                ops.push(Op::Union);
            }
        }
    }

    fn compile_path(path: &LocationPath, ops: &mut Vec<Op>) {
        ops.push(if path.absolute { Op::Root } else { Op::Context });
        for step in &path.steps {
            let node_test = match &step.node_test {
                NodeTest::Any => CompiledNodeTest::Any,
                NodeTest::Name(n) => CompiledNodeTest::Name(n.clone()),
                NodeTest::PrefixWildcard(p) => CompiledNodeTest::PrefixWildcard(p.clone()),
                NodeTest::Node => CompiledNodeTest::Node,
                NodeTest::Text => CompiledNodeTest::Text,
            };
            let predicates = step
                .predicates
                .iter()
                .map(|pred| match pred {
                    Predicate::Position(n) => CompiledPredicate::Position(*n),
                    Predicate::Last => CompiledPredicate::Last,
                    Predicate::Exists(inner) => CompiledPredicate::Exists(CompiledExpr::compile(inner)),
                })
                .collect();
            ops.push(Op::Step(CompiledStep {
                axis: step.axis,
                node_test,
                predicates,
            }));
        }
    }
}

/// Compile a path expression string
pub fn compile(expression: &str) -> Result<CompiledExpr, PathError> {
    let expr = super::parser::parse(expression)?;
    Ok(CompiledExpr::compile(&expr))
}
