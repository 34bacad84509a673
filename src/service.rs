//! Recommendation service - the orchestrator in front of the core
//!
//! Wires the vector store, reaction log, aggregator, ranker, cache and
//! encoder together. Writes go through here so every write is followed by
//! the invalidation it implies:
//! - a new item makes every cached result stale (the corpus changed)
//! - a new reaction makes only its author's results stale

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::RecommendationCache;
use crate::config::{Config, StorageBackend};
use crate::db::Database;
use crate::embeddings::{create_embedder, EmbeddingEngine};
use crate::error::{RecError, Result};
use crate::model::{
    Item, ItemId, NewItem, PreferenceVector, RankedResult, Reaction, RequestParams,
};
use crate::preference::PreferenceAggregator;
use crate::ranking::{ExhaustiveRanker, Ranker};
use crate::reactions::{MemoryReactionLog, ReactionLog, SqliteReactionLog};
use crate::store::{MemoryVectorStore, SqliteVectorStore, VectorStore};

/// Page size when the caller does not name one
pub const DEFAULT_LIMIT: i64 = 10;

pub struct RecommendationService {
    store: Arc<dyn VectorStore>,
    reactions: Arc<dyn ReactionLog>,
    embedder: Arc<dyn EmbeddingEngine>,
    aggregator: PreferenceAggregator,
    ranker: Arc<dyn Ranker>,
    cache: RecommendationCache,
}

impl RecommendationService {
    /// Assemble a service with the exhaustive ranker
    ///
    /// The encoder and the store must agree on the embedding dimension.
    pub fn new(
        store: Arc<dyn VectorStore>,
        reactions: Arc<dyn ReactionLog>,
        embedder: Arc<dyn EmbeddingEngine>,
        config: &Config,
    ) -> Result<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(RecError::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimension(),
            });
        }

        let aggregator = PreferenceAggregator::new(
            Arc::clone(&store),
            Arc::clone(&reactions),
            config.preference.clone(),
        );
        let ranker: Arc<dyn Ranker> = Arc::new(ExhaustiveRanker::new(
            Arc::clone(&store),
            config.ranking.clone(),
        ));

        Ok(Self {
            store,
            reactions,
            embedder,
            aggregator,
            ranker,
            cache: RecommendationCache::new(Duration::from_secs(config.cache.ttl_secs))
                .with_max_entries_per_user(config.cache.max_entries_per_user)
                .with_sweep_interval(Duration::from_secs(config.cache.sweep_interval_secs)),
        })
    }

    /// Open storage and the encoder named by the configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let dimension = config.embedding.dimension;
        let (store, reactions): (Arc<dyn VectorStore>, Arc<dyn ReactionLog>) =
            match config.storage.backend {
                StorageBackend::Sqlite => {
                    let db = Arc::new(Database::open(&config.storage.path).with_context(|| {
                        format!("Failed to open database {:?}", config.storage.path)
                    })?);
                    (
                        Arc::new(SqliteVectorStore::new(Arc::clone(&db), dimension)),
                        Arc::new(SqliteReactionLog::new(db)),
                    )
                }
                StorageBackend::Memory => (
                    Arc::new(MemoryVectorStore::new(dimension)),
                    Arc::new(MemoryReactionLog::new()),
                ),
            };

        let embedder = create_embedder(&config.embedding)?;
        info!(
            backend = ?config.storage.backend,
            model = embedder.model_name(),
            dimension,
            "recommendation service ready"
        );
        Ok(Self::new(store, reactions, embedder, config)?)
    }

    /// Swap the ranking strategy
    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.ranker = ranker;
        self
    }

    /// Top `limit` items for `user_id`, served from cache when fresh
    ///
    /// `limit` is signed so a negative value from a caller is rejected
    /// rather than wrapped.
    pub fn recommend(
        &self,
        user_id: &str,
        limit: i64,
        exclude_author_posts: bool,
    ) -> Result<Arc<RankedResult>> {
        if user_id.trim().is_empty() {
            return Err(RecError::InvalidArgument("user_id must not be empty".to_string()));
        }
        if limit <= 0 {
            return Err(RecError::InvalidArgument(format!(
                "limit must be a positive integer, got {}",
                limit
            )));
        }
        let limit = usize::try_from(limit)
            .map_err(|_| RecError::InvalidArgument(format!("limit {} is too large", limit)))?;

        let params = RequestParams {
            limit,
            exclude_author_posts,
        };
        self.cache.sweep_if_due();
        self.cache
            .get_or_compute(user_id, params, || self.compute(user_id, params))
    }

    fn compute(&self, user_id: &str, params: RequestParams) -> Result<RankedResult> {
        let preference = self.aggregator.compute(user_id)?;
        let exclude_author = params.exclude_author_posts.then_some(user_id);
        let items = self
            .ranker
            .rank(&preference.vector, exclude_author, params.limit)?;

        info!(
            user_id,
            limit = params.limit,
            returned = items.len(),
            zero_preference = preference.is_zero(),
            ranker = self.ranker.name(),
            "computed recommendations"
        );

        Ok(RankedResult {
            user_id: user_id.to_string(),
            items,
            computed_at: Utc::now(),
            params,
        })
    }

    /// Mark the user's entries stale and recompute the default request
    pub fn refresh(&self, user_id: &str) -> Result<Arc<RankedResult>> {
        self.on_reaction_created(user_id);
        self.recommend(user_id, DEFAULT_LIMIT, true)
    }

    /// Embed and store a new item, then invalidate every user
    pub fn create_item(&self, new_item: NewItem) -> Result<Arc<Item>> {
        // Duplicate ids fail before paying for an encoder call
        match self.store.get(new_item.id) {
            Ok(_) => {
                return Err(RecError::Conflict(format!(
                    "item {} already exists",
                    new_item.id
                )))
            }
            Err(RecError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let embedding = self.embedder.embed(&new_item.text)?;
        let id = new_item.id;
        let author = new_item.author_id.clone();
        self.store.put(new_item.into_item(embedding))?;

        info!(item_id = id, author_id = %author, "item created");
        self.on_item_created();
        self.store.get(id)
    }

    /// Append a reaction, then invalidate its author
    pub fn record_reaction(&self, reaction: Reaction) -> Result<()> {
        if reaction.author_id.trim().is_empty() {
            return Err(RecError::InvalidArgument(
                "reaction author_id must not be empty".to_string(),
            ));
        }
        let author = reaction.author_id.clone();
        let reaction_id = reaction.id;
        let kind = reaction.kind;
        self.reactions.append(reaction)?;

        info!(reaction_id, author_id = %author, kind = kind.as_str(), "reaction recorded");
        self.on_reaction_created(&author);
        Ok(())
    }

    /// Invalidation signal for an item written outside this service
    pub fn on_item_created(&self) -> usize {
        self.cache.invalidate_all()
    }

    /// Invalidation signal for a reaction written outside this service
    pub fn on_reaction_created(&self, user_id: &str) -> usize {
        self.cache.invalidate_user(user_id)
    }

    pub fn get_item(&self, id: ItemId) -> Result<Arc<Item>> {
        self.store.get(id)
    }

    pub fn item_count(&self) -> Result<usize> {
        self.store.len()
    }

    /// The user's current preference vector, always recomputed
    pub fn preference(&self, user_id: &str) -> Result<PreferenceVector> {
        self.aggregator.compute(user_id)
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingEngine> {
        &self.embedder
    }
}
