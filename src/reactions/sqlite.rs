//! SQLite-backed reaction log

use rusqlite::{params, Row};
use std::sync::Arc;

use super::ReactionLog;
use crate::db::sqlite::is_constraint_violation;
use crate::db::Database;
use crate::error::{RecError, Result};
use crate::model::{Reaction, ReactionKind, TargetKind};

pub struct SqliteReactionLog {
    db: Arc<Database>,
}

impl SqliteReactionLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<Reaction> {
    let target_kind: String = row.get(1)?;
    let kind: String = row.get(4)?;

    let target_kind = TargetKind::parse(&target_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown target kind '{}'", target_kind).into(),
        )
    })?;
    let kind = ReactionKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown reaction kind '{}'", kind).into(),
        )
    })?;

    Ok(Reaction {
        id: row.get(0)?,
        target_kind,
        target_id: row.get(2)?,
        author_id: row.get(3)?,
        kind,
        created_at: row.get(5)?,
    })
}

impl ReactionLog for SqliteReactionLog {
    fn list_reactions(&self, user_id: &str) -> Result<Vec<Reaction>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, target_kind, target_id, author_id, kind, created_at
             FROM reactions
             WHERE author_id = ?
             ORDER BY created_at, id",
        )?;
        let reactions = stmt
            .query_map([user_id], reaction_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reactions)
    }

    fn append(&self, reaction: Reaction) -> Result<()> {
        let result = self.db.connection().execute(
            "INSERT INTO reactions (id, target_kind, target_id, author_id, kind, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                reaction.id,
                reaction.target_kind.as_str(),
                reaction.target_id,
                reaction.author_id,
                reaction.kind.as_str(),
                reaction.created_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(RecError::Conflict(format!(
                "reaction {} already exists",
                reaction.id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
