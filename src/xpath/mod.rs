//! Path Engine
//!
//! Abbreviated and axis-qualified location paths with:
//! - Child, descendant, parent, ancestor, sibling, self and namespace axes
//! - Name, prefix wildcard, `node()` and `text()` tests
//! - Positional, `last()` and existence predicates
//! - Unions

pub mod axes;
pub mod compiler;
pub mod eval;
pub mod index;
pub mod lexer;
pub mod parser;

pub use compiler::{compile, CompiledExpr};
pub use eval::{evaluate, evaluate_indexed};
pub use index::TreeIndex;
