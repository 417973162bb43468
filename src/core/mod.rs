// Core pipeline exports
pub mod candidates;
pub mod filters;
pub mod profiles;
pub mod recommender;
pub mod scoring;

pub use candidates::CandidateGenerator;
pub use filters::{compare_candidates, matches_constraints};
pub use profiles::ProfileFetcher;
pub use recommender::Recommender;
pub use scoring::{blended_score, merge_candidates, quality, rank, Scorer};
