//! In-memory vector store

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{check_embedding, eligible_iter, ItemIter, VectorStore};
use crate::error::{RecError, Result};
use crate::model::{Item, ItemId};

#[derive(Default)]
struct Inner {
    /// Insertion order, used as the stable iteration order
    items: Vec<Arc<Item>>,
    by_id: HashMap<ItemId, usize>,
}

pub struct MemoryVectorStore {
    dimension: usize,
    inner: RwLock<Inner>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl VectorStore for MemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get(&self, id: ItemId) -> Result<Arc<Item>> {
        let inner = self.inner.read();
        inner
            .by_id
            .get(&id)
            .map(|&idx| Arc::clone(&inner.items[idx]))
            .ok_or_else(|| RecError::NotFound(format!("item {}", id)))
    }

    fn list_eligible(&self, exclude_author: Option<&str>) -> Result<ItemIter> {
        // Snapshot under the read lock, filter lazily after releasing it
        let snapshot = self.inner.read().items.clone();
        Ok(eligible_iter(snapshot, exclude_author))
    }

    fn put(&self, item: Item) -> Result<()> {
        check_embedding(self.dimension, &item)?;

        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&item.id) {
            return Err(RecError::Conflict(format!("item {} already exists", item.id)));
        }
        let idx = inner.items.len();
        inner.by_id.insert(item.id, idx);
        inner.items.push(Arc::new(item));
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.read().items.len())
    }
}
