use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::filters::compare_candidates;
use crate::models::{CandidateMatch, Constraints, OverlapDimension};
use crate::services::{CatalogStore, StoreResult};

/// Candidate generation stage
///
/// Finds catalog games that share categories or designers with a seed. An
/// empty identifier set short-circuits to an empty list without touching
/// the store.
#[derive(Clone)]
pub struct CandidateGenerator {
    store: Arc<dyn CatalogStore>,
}

impl CandidateGenerator {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Games sharing at least one of `category_ids`, annotated with `cat_overlap`
    pub async fn by_category(
        &self,
        category_ids: &[i64],
        constraints: &Constraints,
    ) -> StoreResult<Vec<CandidateMatch>> {
        self.generate(OverlapDimension::Category, category_ids, constraints).await
    }

    /// Games sharing at least one of `designer_ids`, annotated with `designer_overlap`
    pub async fn by_designer(
        &self,
        designer_ids: &[i64],
        constraints: &Constraints,
    ) -> StoreResult<Vec<CandidateMatch>> {
        self.generate(OverlapDimension::Designer, designer_ids, constraints).await
    }

    async fn generate(
        &self,
        dimension: OverlapDimension,
        ids: &[i64],
        constraints: &Constraints,
    ) -> StoreResult<Vec<CandidateMatch>> {
        // Identifiers are a set; duplicates must not inflate the overlap
        let ids: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            tracing::debug!(dimension = dimension.as_str(), "Empty identifier set, skipping store");
            return Ok(Vec::new());
        }

        let mut rows = self.store.overlap_candidates(dimension, &ids, constraints).await?;

        // The store already orders and caps; re-apply so every backend agrees
        rows.sort_by(|a, b| compare_candidates(dimension, a, b));
        rows.truncate(usize::try_from(constraints.limit_candidates).unwrap_or(usize::MAX));

        tracing::debug!(
            dimension = dimension.as_str(),
            ids = ids.len(),
            candidates = rows.len(),
            "Generated candidates"
        );

        Ok(rows)
    }
}
