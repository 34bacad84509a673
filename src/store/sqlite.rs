//! SQLite-backed vector store
//!
//! Embeddings live in a BLOB column as little-endian f32, so a read returns
//! exactly the bits that were written.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use super::{check_embedding, ItemIter, VectorStore};
use crate::db::sqlite::is_constraint_violation;
use crate::db::Database;
use crate::error::{RecError, Result};
use crate::model::{Item, ItemId};
use crate::vectors::{from_blob, to_blob};

const ITEM_COLUMNS: &str =
    "id, author_id, text, embedding, created_at, approve_count, reject_count, comment_count";

pub struct SqliteVectorStore {
    db: Arc<Database>,
    dimension: usize,
}

impl SqliteVectorStore {
    pub fn new(db: Arc<Database>, dimension: usize) -> Self {
        Self { db, dimension }
    }
}

/// Raw row before the blob is decoded (decode errors are not rusqlite errors)
struct ItemRow {
    id: ItemId,
    author_id: String,
    text: String,
    embedding: Vec<u8>,
    created_at: DateTime<Utc>,
    approve_count: i64,
    reject_count: i64,
    comment_count: i64,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            text: row.get(2)?,
            embedding: row.get(3)?,
            created_at: row.get(4)?,
            approve_count: row.get(5)?,
            reject_count: row.get(6)?,
            comment_count: row.get(7)?,
        })
    }

    fn into_item(self) -> Result<Item> {
        Ok(Item {
            id: self.id,
            author_id: self.author_id,
            text: self.text,
            embedding: from_blob(&self.embedding)?,
            created_at: self.created_at,
            approve_count: self.approve_count.max(0) as u64,
            reject_count: self.reject_count.max(0) as u64,
            comment_count: self.comment_count.max(0) as u64,
        })
    }
}

impl VectorStore for SqliteVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get(&self, id: ItemId) -> Result<Arc<Item>> {
        let row = self
            .db
            .connection()
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS),
                [id],
                ItemRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Arc::new(row.into_item()?)),
            None => Err(RecError::NotFound(format!("item {}", id))),
        }
    }

    fn list_eligible(&self, exclude_author: Option<&str>) -> Result<ItemIter> {
        let rows: Vec<ItemRow> = {
            let conn = self.db.connection();
            let rows = match exclude_author {
                Some(author) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM items WHERE author_id != ? ORDER BY id",
                        ITEM_COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map([author], ItemRow::from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM items ORDER BY id",
                        ITEM_COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map([], ItemRow::from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                }
            };
            rows
        };

        let items = rows
            .into_iter()
            .map(|row| row.into_item().map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(items.into_iter()))
    }

    fn put(&self, item: Item) -> Result<()> {
        check_embedding(self.dimension, &item)?;

        let result = self.db.connection().execute(
            &format!(
                "INSERT INTO items ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                ITEM_COLUMNS
            ),
            params![
                item.id,
                item.author_id,
                item.text,
                to_blob(&item.embedding),
                item.created_at,
                item.approve_count as i64,
                item.reject_count as i64,
                item.comment_count as i64,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(RecError::Conflict(format!(
                "item {} already exists",
                item.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .connection()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
