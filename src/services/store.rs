use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CandidateMatch, Category, Constraints, Designer, Game, GameStats, OverlapDimension};

/// Errors that can occur when reading the catalog
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only catalog capability shared by every pipeline component
///
/// Implementations own their connection lifecycle and enforce their own
/// query timeouts. Search operations match case-insensitively on a trimmed
/// substring.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Bare games whose name contains `name_query`, most voted first
    async fn games_by_name(&self, name_query: &str, limit: u32) -> StoreResult<Vec<Game>>;

    /// Bare game row, `None` when the identifier is unknown
    async fn game_by_id(&self, g_id: i64) -> StoreResult<Option<Game>>;

    /// Categories attached to a game, ordered by name
    async fn categories_for_game(&self, g_id: i64) -> StoreResult<Vec<Category>>;

    /// Designers attached to a game, ordered by name
    async fn designers_for_game(&self, g_id: i64) -> StoreResult<Vec<Designer>>;

    /// Categories whose name contains `query`; `None` lists all
    async fn search_categories(&self, query: Option<&str>, limit: u32) -> StoreResult<Vec<Category>>;

    /// Designers whose name contains `query`; `None` lists all
    async fn search_designers(&self, query: Option<&str>, limit: u32) -> StoreResult<Vec<Designer>>;

    /// Games by a designer whose name contains `designer_name`
    ///
    /// Ordered by game name. Each game carries only the matching designers.
    async fn games_by_designer(&self, designer_name: &str, limit: u32) -> StoreResult<Vec<Game>>;

    /// Games sharing at least one of `ids` on `dimension`
    ///
    /// `ids` is non-empty and free of duplicates. Rows pass `constraints`,
    /// are ordered by overlap desc, votes desc (unknown last), `g_id` asc,
    /// and are capped at `constraints.limit_candidates`.
    async fn overlap_candidates(
        &self,
        dimension: OverlapDimension,
        ids: &[i64],
        constraints: &Constraints,
    ) -> StoreResult<Vec<CandidateMatch>>;

    /// Quality inputs for every known identifier in `ids`, in one round trip
    async fn game_stats(&self, ids: &[i64]) -> StoreResult<HashMap<i64, GameStats>>;

    async fn health_check(&self) -> StoreResult<bool>;

    /// Release the underlying connection; the store is unusable afterwards
    async fn close(&self);
}

/// Normalize a user search string; blank means "no filter"
pub fn normalize_query(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
}
