use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::core::Recommender;
use crate::models::{
    Candidate, CandidateEntry, CategoryCandidatesArgs, DesignerCandidatesArgs, FetchCardsArgs, GameProfileArgs,
    GamesByDesignerArgs, GamesByNameArgs, NameSearchArgs, RecommendSimilarArgs, ScoreCandidatesArgs,
};
use crate::services::{store::normalize_query, StoreError};

/// Recoverable failures raised inside a tool
///
/// All of them are reported to the caller as a tool error response; the
/// request loop keeps running.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode result: {0}")]
    Serialization(serde_json::Error),
}

pub type ToolResult = Result<Value, ToolError>;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// Bound callable behind a registry entry
pub type ToolHandler = for<'a> fn(&'a Recommender, Value) -> ToolFuture<'a>;

/// Decode and validate tool arguments; a missing argument object counts as `{}`
pub fn parse_args<T>(arguments: Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Validate,
{
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let args: T = serde_json::from_value(arguments).map_err(ToolError::InvalidArguments)?;
    args.validate()?;
    Ok(args)
}

fn to_result<T: Serialize>(value: T) -> ToolResult {
    serde_json::to_value(value).map_err(ToolError::Serialization)
}

pub fn get_games_by_name(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: GamesByNameArgs = parse_args(arguments)?;
        let games = recommender.store().games_by_name(&args.name_query, args.limit).await?;
        tracing::debug!(query = %args.name_query, rows = games.len(), "Searched games by name");
        to_result(games)
    })
}

pub fn get_game_profile(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: GameProfileArgs = parse_args(arguments)?;
        let game = recommender.profiles().fetch_profile(args.g_id).await?;
        to_result(game)
    })
}

pub fn search_categories(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: NameSearchArgs = parse_args(arguments)?;
        let query = normalize_query(args.query.as_deref());
        let categories = recommender.store().search_categories(query.as_deref(), args.limit).await?;
        to_result(categories)
    })
}

pub fn search_designers(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: NameSearchArgs = parse_args(arguments)?;
        let query = normalize_query(args.query.as_deref());
        let designers = recommender.store().search_designers(query.as_deref(), args.limit).await?;
        to_result(designers)
    })
}

pub fn get_games_by_designer(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: GamesByDesignerArgs = parse_args(arguments)?;
        let games = recommender
            .store()
            .games_by_designer(&args.designer_name, args.limit)
            .await?;
        to_result(games)
    })
}

pub fn candidate_by_categories(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: CategoryCandidatesArgs = parse_args(arguments)?;
        let rows = recommender.generator().by_category(&args.c_ids, &args.constraints).await?;
        to_result(rows)
    })
}

pub fn candidate_by_designers(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: DesignerCandidatesArgs = parse_args(arguments)?;
        let rows = recommender.generator().by_designer(&args.des_ids, &args.constraints).await?;
        to_result(rows)
    })
}

pub fn score_candidates(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: ScoreCandidatesArgs = parse_args(arguments)?;
        let candidates: Vec<Candidate> = args
            .candidates
            .iter()
            .filter_map(|entry| match CandidateEntry::from_value(entry) {
                Some(parsed) => Some(Candidate::from(parsed)),
                None => {
                    tracing::warn!(entry = %entry, "Skipping invalid candidate entry");
                    None
                }
            })
            .collect();
        let exclude: HashSet<i64> = args.exclude_g_ids.into_iter().collect();

        let selected = recommender.scorer().score(&candidates, &args.constraints, &exclude).await?;
        to_result(selected)
    })
}

pub fn fetch_game_cards(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: FetchCardsArgs = parse_args(arguments)?;
        let cards = recommender.profiles().fetch_cards(&args.g_ids).await?;
        to_result(cards)
    })
}

pub fn recommend_similar(recommender: &Recommender, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: RecommendSimilarArgs = parse_args(arguments)?;
        let games = recommender.recommend_similar(args.g_id, &args.constraints).await?;
        to_result(games)
    })
}

const CONSTRAINTS_DOC: &str = "Constraints object. Optional keys: players (exact count the game \
     must support), minplayers, maxplayers, minplaytime, maxplaytime (minutes), min_votes \
     (default 500; games with unknown votes pass), limit_candidates (default 200), limit_final \
     (default 8).";

pub fn constraints_schema() -> Value {
    json!({
        "type": "object",
        "description": CONSTRAINTS_DOC,
        "properties": {
            "players": {"type": "integer"},
            "minplayers": {"type": "integer"},
            "maxplayers": {"type": "integer"},
            "minplaytime": {"type": "integer"},
            "maxplaytime": {"type": "integer"},
            "min_votes": {"type": "integer", "default": 500},
            "limit_candidates": {"type": "integer", "minimum": 1, "default": 200},
            "limit_final": {"type": "integer", "minimum": 1, "default": 8}
        }
    })
}

pub fn id_list_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {"type": "integer"},
        "description": description
    })
}
