//! Vector Store - items and their immutable embeddings
//!
//! Public interface:
//! - `VectorStore` trait (get / list_eligible / put)
//! - `MemoryVectorStore` for tests and the `memory` backend
//! - `SqliteVectorStore` persisting to the shared database

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use std::sync::Arc;

use crate::error::{RecError, Result};
use crate::model::{Item, ItemId};

/// Lazy sequence of items from one `list_eligible` call
///
/// Order is stable within one call and nowhere else.
pub type ItemIter = Box<dyn Iterator<Item = Arc<Item>> + Send>;

/// Storage for items, keyed by id
///
/// Items are immutable once stored: there is no update operation.
pub trait VectorStore: Send + Sync {
    /// Embedding dimension D enforced on insert
    fn dimension(&self) -> usize;

    /// Fetch one item
    fn get(&self, id: ItemId) -> Result<Arc<Item>>;

    /// Items eligible for ranking, optionally excluding one author's items
    fn list_eligible(&self, exclude_author: Option<&str>) -> Result<ItemIter>;

    /// Insert a new item; fails with `Conflict` on a duplicate id
    fn put(&self, item: Item) -> Result<()>;

    /// Number of stored items
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Shared insert-time check: length D and finite components
pub(crate) fn check_embedding(expected: usize, item: &Item) -> Result<()> {
    if item.embedding.len() != expected {
        return Err(RecError::DimensionMismatch {
            expected,
            actual: item.embedding.len(),
        });
    }
    if item.embedding.iter().any(|v| !v.is_finite()) {
        return Err(RecError::InvalidArgument(format!(
            "item {} has a non-finite embedding component",
            item.id
        )));
    }
    Ok(())
}

/// Lazily filter a snapshot by author
pub(crate) fn eligible_iter(items: Vec<Arc<Item>>, exclude_author: Option<&str>) -> ItemIter {
    match exclude_author {
        Some(author) => {
            let author = author.to_string();
            Box::new(items.into_iter().filter(move |item| item.author_id != author))
        }
        None => Box::new(items.into_iter()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use crate::model::{Item, ItemId};

    /// Item created `minute` minutes after a fixed epoch
    pub fn item(id: ItemId, author: &str, embedding: &[f32], minute: i64) -> Item {
        Item {
            id,
            author_id: author.to_string(),
            text: format!("item {}", id),
            embedding: embedding.to_vec(),
            created_at: Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(minute),
            approve_count: 0,
            reject_count: 0,
            comment_count: 0,
        }
    }
}
