use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::models::{Candidate, Constraints, GameStats, ScoredCandidate};
use crate::services::{CatalogStore, StoreResult};

pub const CATEGORY_WEIGHT: f64 = 0.55;
pub const DESIGNER_WEIGHT: f64 = 0.45;
pub const POPULARITY_WEIGHT: f64 = 0.15;

/// Quality term: average rating plus a log-damped popularity bonus
///
/// Missing stats count as zero.
#[inline]
pub fn quality(stats: GameStats) -> f64 {
    let avgscore = stats.avgscore.unwrap_or(0.0);
    let votes = stats.numvotes.unwrap_or(0).max(0) as f64;
    avgscore + POPULARITY_WEIGHT * (votes + 1.0).log10()
}

/// Blended score for one merged candidate
///
/// score = 0.55 * cat_overlap + 0.45 * designer_overlap + quality
#[inline]
pub fn blended_score(candidate: &Candidate, stats: GameStats) -> f64 {
    CATEGORY_WEIGHT * candidate.cat_overlap
        + DESIGNER_WEIGHT * candidate.designer_overlap
        + quality(stats)
}

/// Group candidates by game, keeping the highest overlap seen per dimension
///
/// Excluded games are dropped before merging. The result is keyed by
/// `g_id`, so iteration order is independent of input order.
pub fn merge_candidates(candidates: &[Candidate], exclude: &HashSet<i64>) -> BTreeMap<i64, Candidate> {
    let mut merged: BTreeMap<i64, Candidate> = BTreeMap::new();

    for candidate in candidates.iter().filter(|c| !exclude.contains(&c.g_id)) {
        merged
            .entry(candidate.g_id)
            .and_modify(|existing| {
                existing.cat_overlap = existing.cat_overlap.max(candidate.cat_overlap);
                existing.designer_overlap = existing.designer_overlap.max(candidate.designer_overlap);
            })
            .or_insert(*candidate);
    }

    merged
}

/// Score merged candidates and sort them best first
///
/// Equal scores fall back to ascending `g_id`.
pub fn rank(merged: &BTreeMap<i64, Candidate>, stats: &HashMap<i64, GameStats>) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = merged
        .values()
        .map(|candidate| {
            let game_stats = stats.get(&candidate.g_id).copied().unwrap_or_default();
            ScoredCandidate {
                g_id: candidate.g_id,
                score: blended_score(candidate, game_stats),
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.g_id.cmp(&b.g_id))
    });

    scored
}

/// Merge, score and select stage
#[derive(Clone)]
pub struct Scorer {
    store: Arc<dyn CatalogStore>,
}

impl Scorer {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Top `constraints.limit_final` game identifiers, best first
    ///
    /// Stats for every surviving candidate are fetched in a single store
    /// call. An empty merged set returns an empty list without a query.
    pub async fn score(
        &self,
        candidates: &[Candidate],
        constraints: &Constraints,
        exclude: &HashSet<i64>,
    ) -> StoreResult<Vec<i64>> {
        let merged = merge_candidates(candidates, exclude);
        if merged.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = merged.keys().copied().collect();
        let stats = self.store.game_stats(&ids).await?;

        let mut ranked = rank(&merged, &stats);
        ranked.truncate(usize::try_from(constraints.limit_final).unwrap_or(usize::MAX));

        tracing::debug!(
            input = candidates.len(),
            merged = merged.len(),
            selected = ranked.len(),
            "Scored candidates"
        );

        Ok(ranked.into_iter().map(|s| s.g_id).collect())
    }
}
