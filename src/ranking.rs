//! Ranking Engine - score the corpus against a preference vector
//!
//! Exhaustive cosine scan, parallel over items with rayon. Order is score
//! descending, then newest first, then lowest id, so identical inputs
//! always produce identical output. A zero preference scores every item 0
//! and the result degenerates to "newest first".

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::config::{RankingConfig, RecencyBoosts};
use crate::error::{RecError, Result};
use crate::model::{Item, ScoredItem};
use crate::store::VectorStore;
use crate::vectors::cosine_similarity;

/// Ranking strategy behind the recommendation service
///
/// An approximate index can replace the exhaustive scan by implementing
/// this trait; callers depend only on this contract.
pub trait Ranker: Send + Sync {
    /// Ranker name for logging
    fn name(&self) -> &'static str;

    /// Top `limit` items by similarity to `preference`
    ///
    /// `limit` must be positive. With `exclude_author` set, no item by that
    /// author appears in the result.
    fn rank(
        &self,
        preference: &[f32],
        exclude_author: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredItem>>;
}

pub struct ExhaustiveRanker {
    store: Arc<dyn VectorStore>,
    config: RankingConfig,
}

impl ExhaustiveRanker {
    pub fn new(store: Arc<dyn VectorStore>, config: RankingConfig) -> Self {
        Self { store, config }
    }

    fn score(&self, preference: &[f32], item: &Item, now: DateTime<Utc>) -> Result<Option<f32>> {
        let similarity = cosine_similarity(preference, &item.embedding)?;
        if similarity < self.config.min_score {
            return Ok(None);
        }

        let mut score = if self.config.recency_boost {
            similarity * recency_boost(&self.config.recency, item.created_at, now)
        } else {
            similarity
        };

        // -0.0 would sort below 0.0 under total_cmp and break created_at ties
        if score == 0.0 {
            score = 0.0;
        }
        Ok(Some(score))
    }
}

/// Age-bucket multiplier; items from the future count as brand new
pub fn recency_boost(boosts: &RecencyBoosts, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age = now.signed_duration_since(created_at);
    if age < chrono::Duration::hours(1) {
        boosts.within_1h
    } else if age < chrono::Duration::hours(6) {
        boosts.within_6h
    } else if age < chrono::Duration::hours(24) {
        boosts.within_24h
    } else if age < chrono::Duration::days(3) {
        boosts.within_3d
    } else if age < chrono::Duration::days(7) {
        boosts.within_7d
    } else {
        boosts.older
    }
}

/// Score descending, created_at descending, id ascending
fn ranking_order(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.item.created_at.cmp(&a.item.created_at))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

impl Ranker for ExhaustiveRanker {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn rank(
        &self,
        preference: &[f32],
        exclude_author: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScoredItem>> {
        if limit == 0 {
            return Err(RecError::InvalidArgument(
                "limit must be a positive integer".to_string(),
            ));
        }
        let dimension = self.store.dimension();
        if preference.len() != dimension {
            return Err(RecError::DimensionMismatch {
                expected: dimension,
                actual: preference.len(),
            });
        }

        let items: Vec<Arc<Item>> = self.store.list_eligible(exclude_author)?.collect();
        let candidates = items.len();
        let now = Utc::now();

        let mut scored: Vec<ScoredItem> = items
            .into_par_iter()
            .map(|item| {
                Ok(self
                    .score(preference, &item, now)?
                    .map(|score| ScoredItem { item, score }))
            })
            .collect::<Result<Vec<Option<ScoredItem>>>>()?
            .into_iter()
            .flatten()
            .collect();

        scored.par_sort_unstable_by(ranking_order);
        scored.truncate(limit);

        debug!(
            ranker = self.name(),
            candidates,
            returned = scored.len(),
            "ranked corpus"
        );
        Ok(scored)
    }
}
