//! Parallel path queries
//!
//! The expressions go to the evaluator as one batch over one read-only tree;
//! values are then extracted in parallel with Rayon.

use super::extract::extract_values_or_none;
use super::Query;
use crate::dom::Element;
use crate::engine::{DocumentParser, PathEvaluator};
use crate::error::QueryError;
use crate::repr::Repr;
use rayon::prelude::*;

impl<P, E> Query<'_, P, E>
where
    P: DocumentParser + Sync + ?Sized,
    E: PathEvaluator + Sync + ?Sized,
{
    /// [`Query::xpath`] for each expression, results in input order
    pub fn xpath_many<R>(&self, root: &Element, expressions: &[R]) -> Vec<Result<Option<Vec<R>>, QueryError>>
    where
        R: Repr + Send + Sync,
    {
        let canonical: Vec<_> = expressions.iter().map(Repr::to_canonical).collect();
        let canonical: Vec<&[u8]> = canonical.iter().map(|c| &**c).collect();
        self.evaluator
            .evaluate_paths(root, &canonical)
            .into_par_iter()
            .map(|found| extract_values_or_none::<R>(&found?))
            .collect()
    }
}
