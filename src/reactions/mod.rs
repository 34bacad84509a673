//! Reaction Log - append-only approve/reject history per user
//!
//! The preference aggregator only reads through `list_reactions`; `append`
//! exists for the event path that records reactions before signalling
//! invalidation.

mod memory;
mod sqlite;

pub use memory::MemoryReactionLog;
pub use sqlite::SqliteReactionLog;

use crate::error::Result;
use crate::model::Reaction;

pub trait ReactionLog: Send + Sync {
    /// Every reaction authored by `user_id`, oldest first
    fn list_reactions(&self, user_id: &str) -> Result<Vec<Reaction>>;

    /// Record a reaction; fails with `Conflict` on a duplicate id
    fn append(&self, reaction: Reaction) -> Result<()>;
}
