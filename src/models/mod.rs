// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Game, Designer, Category, Constraints, OverlapDimension, Candidate, CandidateEntry, CandidateMatch, GameStats, ScoredCandidate};
pub use requests::{JsonRpcRequest, ToolCallParams, GamesByNameArgs, GameProfileArgs, NameSearchArgs, GamesByDesignerArgs, CategoryCandidatesArgs, DesignerCandidatesArgs, ScoreCandidatesArgs, FetchCardsArgs, RecommendSimilarArgs};
pub use responses::{JsonRpcResponse, JsonRpcError, ToolDescriptor};
