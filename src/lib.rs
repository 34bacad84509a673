pub mod cache;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod preference;
pub mod ranking;
pub mod reactions;
pub mod server;
pub mod service;
pub mod store;
pub mod vectors;

// Re-export commonly used types
pub use cache::{CacheStats, EntryState, RecommendationCache};
pub use error::{RecError, Result};
pub use model::{Item, NewItem, RankedResult, Reaction, ReactionKind, TargetKind};
pub use ranking::{ExhaustiveRanker, Ranker};
pub use service::RecommendationService;
