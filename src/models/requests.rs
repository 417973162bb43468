use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::domain::Constraints;

/// JSON-RPC request envelope
///
/// Every field is lenient so a well-formed JSON line that is not a proper
/// request still yields an id to echo back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
}

/// Params of a `tools/call` request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GamesByNameArgs {
    pub name_query: String,
    #[validate(range(min = 1))]
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GameProfileArgs {
    pub g_id: i64,
}

/// Substring search over categories or designers; no query lists everything
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NameSearchArgs {
    #[serde(default)]
    pub query: Option<String>,
    #[validate(range(min = 1))]
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GamesByDesignerArgs {
    pub designer_name: String,
    #[validate(range(min = 1))]
    #[serde(default = "default_designer_games_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryCandidatesArgs {
    pub c_ids: Vec<i64>,
    #[validate(nested)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DesignerCandidatesArgs {
    pub des_ids: Vec<i64>,
    #[validate(nested)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScoreCandidatesArgs {
    /// Raw entries; each one is normalized on its own so a bad entry is
    /// skipped instead of failing the call
    pub candidates: Vec<Value>,
    #[validate(nested)]
    pub constraints: Constraints,
    pub exclude_g_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FetchCardsArgs {
    pub g_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecommendSimilarArgs {
    pub g_id: i64,
    #[validate(nested)]
    #[serde(default)]
    pub constraints: Constraints,
}

fn default_search_limit() -> u32 {
    10
}

fn default_designer_games_limit() -> u32 {
    100
}
