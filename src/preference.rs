//! Preference Aggregator - fold a user's reactions into one vector
//!
//! `pref = wApprove * Σ approved embeddings - wReject * Σ rejected embeddings`
//!
//! Always a full recomputation from the reaction log. Reactions on comments
//! carry no embedding and are passed over, as are reactions whose target
//! item was never stored. Repeated reactions on one item all count: an
//! approve followed by a reject of the same item contributes both terms.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{Aggregation, PreferenceConfig};
use crate::error::{RecError, Result};
use crate::model::{PreferenceVector, ReactionKind, TargetKind};
use crate::reactions::ReactionLog;
use crate::store::VectorStore;
use crate::vectors::normalize;

pub struct PreferenceAggregator {
    store: Arc<dyn VectorStore>,
    reactions: Arc<dyn ReactionLog>,
    config: PreferenceConfig,
}

/// Running sum of one reaction kind
struct Accumulator {
    sum: Vec<f32>,
    count: usize,
}

impl Accumulator {
    fn new(dimension: usize) -> Self {
        Self {
            sum: vec![0.0; dimension],
            count: 0,
        }
    }

    fn add(&mut self, embedding: &[f32]) {
        for (acc, v) in self.sum.iter_mut().zip(embedding) {
            *acc += v;
        }
        self.count += 1;
    }

    /// Weighted contribution under the configured aggregation
    fn weighted(&self, weight: f32, aggregation: Aggregation) -> impl Iterator<Item = f32> + '_ {
        let scale = match aggregation {
            Aggregation::Sum => weight,
            Aggregation::Mean if self.count > 0 => weight / self.count as f32,
            Aggregation::Mean => 0.0,
        };
        self.sum.iter().map(move |v| v * scale)
    }
}

impl PreferenceAggregator {
    pub fn new(
        store: Arc<dyn VectorStore>,
        reactions: Arc<dyn ReactionLog>,
        config: PreferenceConfig,
    ) -> Self {
        Self {
            store,
            reactions,
            config,
        }
    }

    /// Compute the user's preference vector from their full reaction set
    ///
    /// A user with no qualifying reactions gets the zero vector.
    pub fn compute(&self, user_id: &str) -> Result<PreferenceVector> {
        let dimension = self.store.dimension();
        let reactions = self.reactions.list_reactions(user_id)?;

        let mut approved = Accumulator::new(dimension);
        let mut rejected = Accumulator::new(dimension);

        for reaction in &reactions {
            if reaction.target_kind != TargetKind::Item {
                continue;
            }

            let item = match self.store.get(reaction.target_id) {
                Ok(item) => item,
                Err(RecError::NotFound(_)) => {
                    debug!(
                        user_id,
                        item_id = reaction.target_id,
                        "reaction target has no stored embedding, skipping"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            if item.embedding.len() != dimension {
                return Err(RecError::DimensionMismatch {
                    expected: dimension,
                    actual: item.embedding.len(),
                });
            }

            match reaction.kind {
                ReactionKind::Approve => approved.add(&item.embedding),
                ReactionKind::Reject => rejected.add(&item.embedding),
            }
        }

        if approved.count + rejected.count == 0 {
            debug!(user_id, reactions = reactions.len(), "no qualifying reactions");
            return Ok(PreferenceVector::zero(user_id, dimension));
        }

        let aggregation = self.config.aggregation;
        let mut vector: Vec<f32> = approved
            .weighted(self.config.approve_weight, aggregation)
            .zip(rejected.weighted(self.config.reject_weight, aggregation))
            .map(|(a, r)| a - r)
            .collect();

        if self.config.normalize {
            normalize(&mut vector);
        }

        let contributing = approved.count + rejected.count;
        info!(
            user_id,
            reactions = reactions.len(),
            contributing,
            "computed preference vector"
        );

        Ok(PreferenceVector {
            user_id: user_id.to_string(),
            vector,
            updated_at: Utc::now(),
            contributing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reaction;
    use crate::reactions::MemoryReactionLog;
    use crate::store::test_support::item;
    use crate::store::MemoryVectorStore;
    use crate::vectors::norm;
    use approx::assert_relative_eq;

    struct Fixture {
        store: Arc<MemoryVectorStore>,
        log: Arc<MemoryReactionLog>,
        next_id: i64,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryVectorStore::new(2));
            store.put(item(1, "author", &[1.0, 0.0], 0)).unwrap();
            store.put(item(2, "author", &[0.0, 1.0], 1)).unwrap();
            store.put(item(3, "author", &[0.7, 0.7], 2)).unwrap();
            Self {
                store,
                log: Arc::new(MemoryReactionLog::new()),
                next_id: 1,
            }
        }

        fn react(&mut self, user: &str, target_kind: TargetKind, target: i64, kind: ReactionKind) {
            self.log
                .append(Reaction {
                    id: self.next_id,
                    target_kind,
                    target_id: target,
                    author_id: user.to_string(),
                    kind,
                    created_at: Utc::now(),
                })
                .unwrap();
            self.next_id += 1;
        }

        fn aggregator(&self, config: PreferenceConfig) -> PreferenceAggregator {
            PreferenceAggregator::new(self.store.clone(), self.log.clone(), config)
        }
    }

    #[test]
    fn test_no_reactions_is_zero_vector() {
        let fx = Fixture::new();
        let pref = fx.aggregator(PreferenceConfig::default()).compute("nobody").unwrap();
        assert!(pref.is_zero());
        assert_eq!(pref.vector.len(), 2);
        assert_eq!(pref.contributing, 0);
    }

    #[test]
    fn test_single_approval() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert_eq!(pref.vector, vec![1.0, 0.0]);
    }

    #[test]
    fn test_rejection_subtracts() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 2, ReactionKind::Reject);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert_eq!(pref.vector, vec![1.0, -1.0]);
    }

    #[test]
    fn test_weights_apply() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 2, ReactionKind::Reject);
        let config = PreferenceConfig {
            approve_weight: 2.0,
            reject_weight: 0.5,
            ..Default::default()
        };
        let pref = fx.aggregator(config).compute("u").unwrap();
        assert_eq!(pref.vector, vec![2.0, -0.5]);
    }

    #[test]
    fn test_comment_reactions_ignored() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Comment, 1, ReactionKind::Approve);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert!(pref.is_zero());
    }

    #[test]
    fn test_missing_target_skipped() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 404, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 2, ReactionKind::Approve);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert_eq!(pref.vector, vec![0.0, 1.0]);
        assert_eq!(pref.contributing, 1);
    }

    #[test]
    fn test_approve_then_reject_same_item_is_additive() {
        // Both reactions count; the later one does not supersede the earlier
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 3, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 3, ReactionKind::Reject);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert!(pref.is_zero());
        assert_eq!(pref.contributing, 2);
    }

    #[test]
    fn test_other_users_reactions_ignored() {
        let mut fx = Fixture::new();
        fx.react("other", TargetKind::Item, 2, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert_eq!(pref.vector, vec![1.0, 0.0]);
    }

    #[test]
    fn test_not_normalized_by_default() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 3, ReactionKind::Approve);
        let pref = fx.aggregator(PreferenceConfig::default()).compute("u").unwrap();
        assert_relative_eq!(pref.vector[0], 1.7, epsilon = 1e-6);
        assert_relative_eq!(pref.vector[1], 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_mean_aggregation_with_normalize() {
        let mut fx = Fixture::new();
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        fx.react("u", TargetKind::Item, 3, ReactionKind::Approve);
        let config = PreferenceConfig {
            aggregation: Aggregation::Mean,
            normalize: true,
            ..Default::default()
        };
        let pref = fx.aggregator(config).compute("u").unwrap();
        // mean = [0.85, 0.35]
        let expected_norm = (0.85_f32 * 0.85 + 0.35 * 0.35).sqrt();
        assert_relative_eq!(pref.vector[0], 0.85 / expected_norm, epsilon = 1e-5);
        assert_relative_eq!(pref.vector[1], 0.35 / expected_norm, epsilon = 1e-5);
        assert_relative_eq!(norm(&pref.vector), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_recomputation_reflects_new_reactions() {
        let mut fx = Fixture::new();
        let aggregator = fx.aggregator(PreferenceConfig::default());
        fx.react("u", TargetKind::Item, 1, ReactionKind::Approve);
        assert_eq!(aggregator.compute("u").unwrap().vector, vec![1.0, 0.0]);
        fx.react("u", TargetKind::Item, 2, ReactionKind::Reject);
        assert_eq!(aggregator.compute("u").unwrap().vector, vec![1.0, -1.0]);
    }
}
