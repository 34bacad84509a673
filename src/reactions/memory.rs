//! In-memory reaction log

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::ReactionLog;
use crate::error::{RecError, Result};
use crate::model::{Reaction, ReactionId};

#[derive(Default)]
struct Inner {
    by_author: HashMap<String, Vec<Reaction>>,
    ids: HashSet<ReactionId>,
}

#[derive(Default)]
pub struct MemoryReactionLog {
    inner: RwLock<Inner>,
}

impl MemoryReactionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReactionLog for MemoryReactionLog {
    fn list_reactions(&self, user_id: &str) -> Result<Vec<Reaction>> {
        let mut reactions = self
            .inner
            .read()
            .by_author
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        reactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(reactions)
    }

    fn append(&self, reaction: Reaction) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.ids.insert(reaction.id) {
            return Err(RecError::Conflict(format!(
                "reaction {} already exists",
                reaction.id
            )));
        }
        inner
            .by_author
            .entry(reaction.author_id.clone())
            .or_default()
            .push(reaction);
        Ok(())
    }
}
