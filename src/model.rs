//! Domain types shared by the store, aggregator, ranker and cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type ItemId = i64;
pub type ReactionId = i64;

/// A text item with its immutable embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub author_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approve_count: u64,
    #[serde(default)]
    pub reject_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

/// Item submission before its embedding exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub id: ItemId,
    #[serde(alias = "author_id")]
    pub author_id: String,
    pub text: String,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "likesCount", alias = "approve_count")]
    pub approve_count: u64,
    #[serde(default, alias = "dislikesCount", alias = "reject_count")]
    pub reject_count: u64,
    #[serde(default, alias = "commentsCount", alias = "comment_count")]
    pub comment_count: u64,
}

impl NewItem {
    /// Attach an embedding, stamping the creation time if the caller gave none
    pub fn into_item(self, embedding: Vec<f32>) -> Item {
        Item {
            id: self.id,
            author_id: self.author_id,
            text: self.text,
            embedding,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            approve_count: self.approve_count,
            reject_count: self.reject_count,
            comment_count: self.comment_count,
        }
    }
}

/// What a reaction points at; reactions without a target kind are on items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetKind {
    #[default]
    #[serde(alias = "POST", alias = "item", alias = "post")]
    Item,
    #[serde(alias = "comment")]
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Item => "ITEM",
            TargetKind::Comment => "COMMENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ITEM" | "POST" => Some(TargetKind::Item),
            "COMMENT" => Some(TargetKind::Comment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactionKind {
    #[serde(alias = "LIKE", alias = "approve", alias = "like")]
    Approve,
    #[serde(alias = "DISLIKE", alias = "reject", alias = "dislike")]
    Reject,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Approve => "APPROVE",
            ReactionKind::Reject => "REJECT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "APPROVE" | "LIKE" => Some(ReactionKind::Approve),
            "REJECT" | "DISLIKE" => Some(ReactionKind::Reject),
            _ => None,
        }
    }
}

/// One append-only approve/reject signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: ReactionId,
    #[serde(
        default,
        alias = "target_kind",
        alias = "targetType",
        alias = "target_type"
    )]
    pub target_kind: TargetKind,
    #[serde(alias = "target_id")]
    pub target_id: ItemId,
    #[serde(alias = "author_id")]
    pub author_id: String,
    #[serde(alias = "type")]
    pub kind: ReactionKind,
    #[serde(default = "Utc::now", alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// A user's aggregated position in embedding space
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceVector {
    pub user_id: String,
    pub vector: Vec<f32>,
    pub updated_at: DateTime<Utc>,
    /// Reactions that contributed an embedding
    pub contributing: usize,
}

impl PreferenceVector {
    pub fn zero(user_id: &str, dimension: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            vector: vec![0.0; dimension],
            updated_at: Utc::now(),
            contributing: 0,
        }
    }

    /// True for "no preference"
    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }
}

/// Request parameters that distinguish cache entries for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestParams {
    pub limit: usize,
    pub exclude_author_posts: bool,
}

#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: Arc<Item>,
    pub score: f32,
}

/// Ordered top-N for one user and parameter tuple
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub user_id: String,
    pub items: Vec<ScoredItem>,
    pub computed_at: DateTime<Utc>,
    pub params: RequestParams,
}

impl RankedResult {
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|s| s.item.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_accepts_source_vocabulary() {
        let json = r#"{
            "id": 7,
            "targetType": "POST",
            "targetId": 3,
            "authorId": "alice",
            "type": "DISLIKE",
            "createdAt": "2025-12-17T10:00:00Z"
        }"#;
        let reaction: Reaction = serde_json::from_str(json).unwrap();
        assert_eq!(reaction.target_kind, TargetKind::Item);
        assert_eq!(reaction.kind, ReactionKind::Reject);
        assert_eq!(reaction.author_id, "alice");
    }

    #[test]
    fn test_kind_parse_round_trips_storage_names() {
        for kind in [ReactionKind::Approve, ReactionKind::Reject] {
            assert_eq!(ReactionKind::parse(kind.as_str()), Some(kind));
        }
        for kind in [TargetKind::Item, TargetKind::Comment] {
            assert_eq!(TargetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ReactionKind::parse("meh"), None);
    }

    #[test]
    fn test_zero_preference() {
        let pref = PreferenceVector::zero("bob", 4);
        assert!(pref.is_zero());
        assert_eq!(pref.vector.len(), 4);
    }
}
