use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::filters::{compare_candidates, matches_constraints};
use crate::models::{CandidateMatch, Category, Constraints, Designer, Game, GameStats, OverlapDimension};
use crate::services::store::{normalize_query, CatalogStore, StoreError, StoreResult};

/// In-process catalog with the same query semantics as [`PostgresStore`]
///
/// Games are registered hydrated (with their categories and designers);
/// lookups return bare or hydrated copies as the trait requires. Every
/// trait call bumps a counter so callers can assert on store traffic.
///
/// [`PostgresStore`]: crate::services::PostgresStore
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: Vec<Game>,
    categories: Vec<Category>,
    designers: Vec<Designer>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a game along with any categories and designers it references
    pub fn with_game(mut self, game: Game) -> Self {
        for category in &game.categories {
            if !self.categories.iter().any(|c| c.c_id == category.c_id) {
                self.categories.push(category.clone());
            }
        }
        for designer in &game.designers {
            if !self.designers.iter().any(|d| d.des_id == designer.des_id) {
                self.designers.push(designer.clone());
            }
        }
        self.games.retain(|g| g.g_id != game.g_id);
        self.games.push(game);
        self
    }

    /// Register a category that no game references yet
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.retain(|c| c.c_id != category.c_id);
        self.categories.push(category);
        self
    }

    /// Register a designer that no game references yet
    pub fn with_designer(mut self, designer: Designer) -> Self {
        self.designers.retain(|d| d.des_id != designer.des_id);
        self.designers.push(designer);
        self
    }

    /// Number of trait calls served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    fn find(&self, g_id: i64) -> Option<&Game> {
        self.games.iter().find(|g| g.g_id == g_id)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn limit_len(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn games_by_name(&self, name_query: &str, limit: u32) -> StoreResult<Vec<Game>> {
        self.record_query();
        let needle = name_query.trim();

        let mut games: Vec<Game> = self
            .games
            .iter()
            .filter(|g| contains_ignore_case(&g.name, needle))
            .map(Game::bare)
            .collect();

        games.sort_by(|a, b| {
            b.numvotes
                .is_some()
                .cmp(&a.numvotes.is_some())
                .then_with(|| b.numvotes.cmp(&a.numvotes))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.g_id.cmp(&b.g_id))
        });
        games.truncate(limit_len(limit));
        Ok(games)
    }

    async fn game_by_id(&self, g_id: i64) -> StoreResult<Option<Game>> {
        self.record_query();
        Ok(self.find(g_id).map(Game::bare))
    }

    async fn categories_for_game(&self, g_id: i64) -> StoreResult<Vec<Category>> {
        self.record_query();
        let mut categories = self.find(g_id).map(|g| g.categories.clone()).unwrap_or_default();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.c_id.cmp(&b.c_id)));
        Ok(categories)
    }

    async fn designers_for_game(&self, g_id: i64) -> StoreResult<Vec<Designer>> {
        self.record_query();
        let mut designers = self.find(g_id).map(|g| g.designers.clone()).unwrap_or_default();
        designers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.des_id.cmp(&b.des_id)));
        Ok(designers)
    }

    async fn search_categories(&self, query: Option<&str>, limit: u32) -> StoreResult<Vec<Category>> {
        self.record_query();
        let needle = normalize_query(query);

        let mut categories: Vec<Category> = self
            .categories
            .iter()
            .filter(|c| needle.as_deref().map_or(true, |q| contains_ignore_case(&c.name, q)))
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.c_id.cmp(&b.c_id)));
        categories.truncate(limit_len(limit));
        Ok(categories)
    }

    async fn search_designers(&self, query: Option<&str>, limit: u32) -> StoreResult<Vec<Designer>> {
        self.record_query();
        let needle = normalize_query(query);

        let mut designers: Vec<Designer> = self
            .designers
            .iter()
            .filter(|d| needle.as_deref().map_or(true, |q| contains_ignore_case(&d.name, q)))
            .cloned()
            .collect();
        designers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.des_id.cmp(&b.des_id)));
        designers.truncate(limit_len(limit));
        Ok(designers)
    }

    async fn games_by_designer(&self, designer_name: &str, limit: u32) -> StoreResult<Vec<Game>> {
        self.record_query();
        let needle = designer_name.trim();

        let mut games: Vec<Game> = self
            .games
            .iter()
            .filter_map(|g| {
                let mut matching: Vec<Designer> = g
                    .designers
                    .iter()
                    .filter(|d| contains_ignore_case(&d.name, needle))
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    return None;
                }
                matching.sort_by(|a, b| a.name.cmp(&b.name));
                let mut game = g.bare();
                game.designers = matching;
                Some(game)
            })
            .collect();

        games.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.g_id.cmp(&b.g_id)));
        games.truncate(limit_len(limit));
        Ok(games)
    }

    async fn overlap_candidates(
        &self,
        dimension: OverlapDimension,
        ids: &[i64],
        constraints: &Constraints,
    ) -> StoreResult<Vec<CandidateMatch>> {
        self.record_query();
        if ids.is_empty() {
            return Err(StoreError::InvalidInput(format!(
                "{} overlap query needs at least one identifier",
                dimension.as_str()
            )));
        }
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();

        let mut rows: Vec<CandidateMatch> = self
            .games
            .iter()
            .filter(|g| matches_constraints(g, constraints))
            .filter_map(|g| {
                let attached: BTreeSet<i64> = match dimension {
                    OverlapDimension::Category => g.category_ids().into_iter().collect(),
                    OverlapDimension::Designer => g.designer_ids().into_iter().collect(),
                };
                let overlap = attached.intersection(&wanted).count();
                if overlap == 0 {
                    return None;
                }
                let overlap = u32::try_from(overlap).unwrap_or(u32::MAX);
                let (cat_overlap, designer_overlap) = match dimension {
                    OverlapDimension::Category => (overlap, 0),
                    OverlapDimension::Designer => (0, overlap),
                };
                Some(CandidateMatch {
                    g_id: g.g_id,
                    name: g.name.clone(),
                    numvotes: g.numvotes,
                    cat_overlap,
                    designer_overlap,
                })
            })
            .collect();

        rows.sort_by(|a, b| compare_candidates(dimension, a, b));
        rows.truncate(limit_len(constraints.limit_candidates));
        Ok(rows)
    }

    async fn game_stats(&self, ids: &[i64]) -> StoreResult<HashMap<i64, GameStats>> {
        self.record_query();
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.find(*id).map(|g| {
                    (g.g_id, GameStats { avgscore: g.avgscore, numvotes: g.numvotes })
                })
            })
            .collect())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        self.record_query();
        Ok(true)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(c_id: i64, name: &str) -> Category {
        Category { c_id, name: name.to_string() }
    }

    fn designer(des_id: i64, name: &str) -> Designer {
        Designer { des_id, name: name.to_string(), country: None }
    }

    fn create_store() -> MemoryStore {
        MemoryStore::new()
            .with_game(Game {
                numvotes: Some(900),
                categories: vec![category(1, "Strategy"), category(2, "Economic")],
                designers: vec![designer(10, "Uwe Rosenberg")],
                ..Game::new(100, "Agricola")
            })
            .with_game(Game {
                numvotes: Some(5000),
                categories: vec![category(1, "Strategy")],
                designers: vec![designer(11, "Klaus Teuber"), designer(12, "Benjamin Teuber")],
                ..Game::new(200, "Catan")
            })
            .with_game(Game {
                numvotes: None,
                categories: vec![category(3, "Party")],
                designers: vec![designer(13, "Vlaada Chvatil")],
                ..Game::new(300, "Codenames")
            })
            .with_category(category(4, "Wargame"))
            .with_designer(designer(14, "Reiner Knizia"))
    }

    #[tokio::test]
    async fn test_games_by_name_case_insensitive() {
        let store = create_store();
        let games = store.games_by_name("  CAT ", 10).await.unwrap();

        assert_eq!(games.len(), 1);
        assert_eq!(games[0].name, "Catan");
        assert!(games[0].categories.is_empty(), "search results are bare");
    }

    #[tokio::test]
    async fn test_search_categories_lists_all_without_query() {
        let store = create_store();
        let all = store.search_categories(None, 10).await.unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["Economic", "Party", "Strategy", "Wargame"]);
        assert_eq!(store.search_categories(Some(""), 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_designers_includes_unreferenced() {
        let store = create_store();
        let all = store.search_designers(None, 10).await.unwrap();
        assert_eq!(all.len(), 5);

        let found = store.search_designers(Some("knizia"), 10).await.unwrap();
        assert_eq!(found, vec![designer(14, "Reiner Knizia")]);
        assert!(store.games_by_designer("knizia", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_games_by_designer_attaches_matching_designers() {
        let store = create_store();
        let games = store.games_by_designer("teuber", 10).await.unwrap();

        assert_eq!(games.len(), 1);
        assert_eq!(games[0].g_id, 200);
        let designers: Vec<&str> = games[0].designers.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(designers, vec!["Benjamin Teuber", "Klaus Teuber"]);
    }

    #[tokio::test]
    async fn test_overlap_counts_distinct_identifiers() {
        let store = create_store();
        let constraints = Constraints { min_votes: 0, ..Constraints::default() };
        let rows = store
            .overlap_candidates(OverlapDimension::Category, &[1, 2, 2], &constraints)
            .await
            .unwrap();

        let summary: Vec<(i64, u32)> = rows.iter().map(|r| (r.g_id, r.cat_overlap)).collect();
        assert_eq!(summary, vec![(100, 2), (200, 1)]);
    }

    #[tokio::test]
    async fn test_game_stats_skips_unknown_ids() {
        let store = create_store();
        let stats = store.game_stats(&[100, 999]).await.unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[&100].numvotes, Some(900));
    }

    #[tokio::test]
    async fn test_query_counter() {
        let store = create_store();
        assert_eq!(store.query_count(), 0);
        store.game_by_id(100).await.unwrap();
        store.health_check().await.unwrap();
        assert_eq!(store.query_count(), 2);
    }
}
