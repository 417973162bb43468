use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{CandidateGenerator, ProfileFetcher, Scorer};
use crate::models::{Candidate, Constraints, Game};
use crate::services::{CatalogStore, StoreResult};

/// Recommendation pipeline bound to one catalog store
///
/// Every stage shares the same store handle. The pipeline never writes to
/// stdout; it only reports through `tracing`.
///
/// # Pipeline Stages
/// 1. Seed hydration (`ProfileFetcher`)
/// 2. Candidate generation by category and by designer
/// 3. Merge, score and select (`Scorer`)
/// 4. Card hydration for the selected games
#[derive(Clone)]
pub struct Recommender {
    store: Arc<dyn CatalogStore>,
    generator: CandidateGenerator,
    scorer: Scorer,
    profiles: ProfileFetcher,
}

impl Recommender {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            generator: CandidateGenerator::new(store.clone()),
            scorer: Scorer::new(store.clone()),
            profiles: ProfileFetcher::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    pub fn generator(&self) -> &CandidateGenerator {
        &self.generator
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn profiles(&self) -> &ProfileFetcher {
        &self.profiles
    }

    /// Games similar to `g_id`, best first
    ///
    /// An unknown seed yields an empty list. The seed itself is never
    /// recommended.
    pub async fn recommend_similar(&self, g_id: i64, constraints: &Constraints) -> StoreResult<Vec<Game>> {
        let Some(seed) = self.profiles.fetch_profile(g_id).await? else {
            return Ok(Vec::new());
        };

        let by_category = self.generator.by_category(&seed.category_ids(), constraints).await?;
        let by_designer = self.generator.by_designer(&seed.designer_ids(), constraints).await?;

        let candidates: Vec<Candidate> = by_category
            .iter()
            .chain(by_designer.iter())
            .map(|row| row.candidate())
            .collect();

        let exclude: HashSet<i64> = [seed.g_id].into_iter().collect();
        let selected = self.scorer.score(&candidates, constraints, &exclude).await?;

        tracing::info!(
            seed = seed.g_id,
            candidates = candidates.len(),
            selected = selected.len(),
            "Recommended similar games"
        );

        self.profiles.fetch_cards(&selected).await
    }

    /// Release the store connection
    pub async fn close(&self) {
        self.store.close().await;
    }
}
