// Tool registry
pub mod tools;

use serde_json::{json, Value};

use crate::models::ToolDescriptor;
use tools::{constraints_schema, id_list_schema};

pub use tools::{parse_args, ToolError, ToolFuture, ToolHandler, ToolResult};

/// One callable tool: advertised shape plus the handler it dispatches to
#[derive(Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

impl ToolSpec {
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Immutable capability table, built once at startup
///
/// Lookups are by exact name; listing preserves registration order.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }

    /// Every board game tool, in the order they are advertised
    pub fn standard() -> Self {
        Self::new(vec![
            ToolSpec {
                name: "get_games_by_name",
                description: "Search games by (partial) name, case-insensitive. Returns bare game \
                              records ordered by vote count.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name_query": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1, "default": 10}
                    },
                    "required": ["name_query"]
                }),
                handler: tools::get_games_by_name,
            },
            ToolSpec {
                name: "get_game_profile",
                description: "Fetch one game with its categories and designers. Returns null when \
                              the id is unknown.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "g_id": {"type": "integer"}
                    },
                    "required": ["g_id"]
                }),
                handler: tools::get_game_profile,
            },
            ToolSpec {
                name: "search_categories",
                description: "Search categories by name substring. Omit query to list all.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1, "default": 10}
                    },
                    "required": []
                }),
                handler: tools::search_categories,
            },
            ToolSpec {
                name: "search_designers",
                description: "Search designers by name substring. Omit query to list all.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1, "default": 10}
                    },
                    "required": []
                }),
                handler: tools::search_designers,
            },
            ToolSpec {
                name: "get_games_by_designer",
                description: "List games by a designer whose name contains designer_name, ordered \
                              by game name.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "designer_name": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1, "default": 100}
                    },
                    "required": ["designer_name"]
                }),
                handler: tools::get_games_by_designer,
            },
            ToolSpec {
                name: "candidate_by_categories",
                description: "Generate candidate games sharing categories with c_ids. Each row \
                              carries cat_overlap; ordered by overlap then votes.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "c_ids": id_list_schema("Category ids of the seed"),
                        "constraints": constraints_schema()
                    },
                    "required": ["c_ids", "constraints"]
                }),
                handler: tools::candidate_by_categories,
            },
            ToolSpec {
                name: "candidate_by_designers",
                description: "Generate candidate games sharing designers with des_ids. Each row \
                              carries designer_overlap; ordered by overlap then votes.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "des_ids": id_list_schema("Designer ids of the seed"),
                        "constraints": constraints_schema()
                    },
                    "required": ["des_ids", "constraints"]
                }),
                handler: tools::candidate_by_designers,
            },
            ToolSpec {
                name: "score_candidates",
                description: "Merge candidate lists (max overlap per game), drop exclude_g_ids, \
                              score by 0.55*cat_overlap + 0.45*designer_overlap + quality and \
                              return the top limit_final game ids. Entries that are neither \
                              an id nor an object with an integer g_id are skipped.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "candidates": {
                            "type": "array",
                            "items": {
                                "oneOf": [
                                    {"type": "integer"},
                                    {
                                        "type": "object",
                                        "properties": {
                                            "g_id": {"type": "integer"},
                                            "cat_overlap": {"type": "number", "minimum": 0},
                                            "designer_overlap": {"type": "number", "minimum": 0}
                                        },
                                        "required": ["g_id"]
                                    }
                                ]
                            }
                        },
                        "constraints": constraints_schema(),
                        "exclude_g_ids": id_list_schema("Game ids that must not be recommended")
                    },
                    "required": ["candidates", "constraints", "exclude_g_ids"]
                }),
                handler: tools::score_candidates,
            },
            ToolSpec {
                name: "fetch_game_cards",
                description: "Fetch hydrated games for g_ids in the given order. Unknown ids are \
                              skipped.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "g_ids": id_list_schema("Game ids to fetch")
                    },
                    "required": ["g_ids"]
                }),
                handler: tools::fetch_game_cards,
            },
            ToolSpec {
                name: "recommend_similar",
                description: "Recommend games similar to g_id: generate candidates from its \
                              categories and designers, score them and return hydrated cards.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "g_id": {"type": "integer"},
                        "constraints": constraints_schema()
                    },
                    "required": ["g_id"]
                }),
                handler: tools::recommend_similar,
            },
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(ToolSpec::descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
