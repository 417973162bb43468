//! Tabletop Recs - board game recommendation tools over JSON-RPC
//!
//! This library provides the recommendation pipeline (candidate generation,
//! scoring and card hydration) and the line-delimited tool server that
//! exposes it to an orchestrating caller.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;

// Re-export commonly used types
pub use core::{CandidateGenerator, ProfileFetcher, Recommender, Scorer};
pub use models::{Candidate, CandidateEntry, Category, Constraints, Designer, Game};
pub use routes::{ToolError, ToolRegistry};
pub use server::{ServerError, ToolServer};
pub use services::{CatalogStore, MemoryStore, PostgresStore, StoreError};
