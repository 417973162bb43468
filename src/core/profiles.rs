use std::sync::Arc;

use crate::models::Game;
use crate::services::{CatalogStore, StoreResult};

/// Hydrates games with their category and designer sets
#[derive(Clone)]
pub struct ProfileFetcher {
    store: Arc<dyn CatalogStore>,
}

impl ProfileFetcher {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Fully hydrated game, or `None` when the identifier is unknown
    pub async fn fetch_profile(&self, g_id: i64) -> StoreResult<Option<Game>> {
        let Some(mut game) = self.store.game_by_id(g_id).await? else {
            tracing::debug!(g_id, "Game not found");
            return Ok(None);
        };

        game.categories = self.store.categories_for_game(g_id).await?;
        game.designers = self.store.designers_for_game(g_id).await?;

        Ok(Some(game))
    }

    /// Hydrated games in input order; unknown identifiers are skipped
    pub async fn fetch_cards(&self, g_ids: &[i64]) -> StoreResult<Vec<Game>> {
        let mut cards = Vec::with_capacity(g_ids.len());

        for &g_id in g_ids {
            if let Some(game) = self.fetch_profile(g_id).await? {
                cards.push(game);
            }
        }

        Ok(cards)
    }
}
