//! Parser and path-evaluator collaborators
//!
//! The query layer only talks to these two traits. `XmlEngine` implements
//! both with the built-in strict parser and path engine, caching compiled
//! expressions in an LRU.

use crate::config::EngineConfig;
use crate::dom::{Document, Element, NodeRef};
use crate::error::{ParseError, PathError};
use crate::xpath::{self, CompiledExpr, TreeIndex};
use lru::LruCache;
use rayon::prelude::*;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Turns raw XML into a document tree
pub trait DocumentParser {
    fn parse_document(&self, raw: &[u8]) -> Result<Document, ParseError>;
}

/// Evaluates a path expression against an element tree
pub trait PathEvaluator {
    /// Matching nodes in document order
    fn evaluate_path<'d>(&self, root: &'d Element, expression: &[u8]) -> Result<Vec<NodeRef<'d>>, PathError>;

    /// Several expressions against the same tree, results in input order
    fn evaluate_paths<'d>(&self, root: &'d Element, expressions: &[&[u8]]) -> Vec<Result<Vec<NodeRef<'d>>, PathError>> {
        expressions
            .iter()
            .map(|expression| self.evaluate_path(root, expression))
            .collect()
    }
}

/// Built-in parser and path engine
pub struct XmlEngine {
    config: EngineConfig,
    cache: Mutex<LruCache<Vec<u8>, Arc<CompiledExpr>>>,
}

impl XmlEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Mutex::new(LruCache::new(config.path_cache_capacity));
        XmlEngine { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile an expression, going through the cache
    pub fn compile(&self, expression: &[u8]) -> Result<Arc<CompiledExpr>, PathError> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(expression)
            .cloned();
        if let Some(compiled) = cached {
            trace!(expression = %String::from_utf8_lossy(expression), "path cache hit");
            return Ok(compiled);
        }

        let text = std::str::from_utf8(expression).map_err(|e| {
            PathError::new(
                "expression is not valid UTF-8",
                &String::from_utf8_lossy(expression),
                e.valid_up_to(),
            )
        })?;
        let compiled = Arc::new(xpath::compile(text)?);
        debug!(expression = text, ops = compiled.ops.len(), "compiled path expression");

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(expression.to_vec(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of cached compiled expressions
    pub fn cached_expressions(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for XmlEngine {
    fn default() -> Self {
        XmlEngine::new(EngineConfig::default())
    }
}

impl DocumentParser for XmlEngine {
    fn parse_document(&self, raw: &[u8]) -> Result<Document, ParseError> {
        Document::parse(raw, &self.config.parse)
    }
}

impl PathEvaluator for XmlEngine {
    fn evaluate_path<'d>(&self, root: &'d Element, expression: &[u8]) -> Result<Vec<NodeRef<'d>>, PathError> {
        let compiled = self.compile(expression)?;
        Ok(xpath::evaluate(root, &compiled))
    }

    /// The tree is indexed once and the expressions run in parallel over it
    fn evaluate_paths<'d>(&self, root: &'d Element, expressions: &[&[u8]]) -> Vec<Result<Vec<NodeRef<'d>>, PathError>> {
        let index = TreeIndex::build(root);
        trace!(nodes = index.len(), expressions = expressions.len(), "indexed tree for batch");
        expressions
            .par_iter()
            .map(|expression| -> Result<Vec<NodeRef<'d>>, PathError> {
                let compiled = self.compile(expression)?;
                Ok(xpath::evaluate_indexed(&index, &compiled))
            })
            .collect()
    }
}
