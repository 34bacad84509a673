//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use affinity::config::Config;
use affinity::embeddings::EmbeddingEngine;
use affinity::model::{ItemId, NewItem, Reaction, ReactionKind, ScoredItem, TargetKind};
use affinity::reactions::MemoryReactionLog;
use affinity::store::MemoryVectorStore;
use affinity::{ExhaustiveRanker, Ranker, RecError, RecommendationService};

/// Encoder with a fixed text -> vector table
pub struct TableEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(dimension: usize, entries: Vec<(&str, Vec<f32>)>) -> Self {
        Self {
            dimension,
            table: entries
                .into_iter()
                .map(|(text, v)| (text.to_string(), v))
                .collect(),
        }
    }
}

impl EmbeddingEngine for TableEmbedder {
    fn embed(&self, text: &str) -> affinity::Result<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| RecError::EncodingUnavailable(format!("no vector for {:?}", text)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

/// Ranker that counts passes and takes its time doing them
pub struct CountingRanker {
    inner: ExhaustiveRanker,
    pub calls: AtomicUsize,
    delay: std::time::Duration,
}

impl CountingRanker {
    pub fn new(inner: ExhaustiveRanker, delay: std::time::Duration) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Ranker for CountingRanker {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn rank(
        &self,
        preference: &[f32],
        exclude_author: Option<&str>,
        limit: usize,
    ) -> affinity::Result<Vec<ScoredItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.rank(preference, exclude_author, limit)
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()
}

pub fn two_dimensional_config() -> Config {
    let mut config = Config::default();
    config.embedding.dimension = 2;
    config
}

/// The three-item corpus: [1,0] by alice, [0,1] by bob, [0.7,0.7] by carol
pub struct Scenario {
    pub store: Arc<MemoryVectorStore>,
    pub service: RecommendationService,
    /// Present when built with `Scenario::counting`
    pub ranker: Option<Arc<CountingRanker>>,
    next_reaction: AtomicUsize,
}

impl Scenario {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Scenario whose ranking passes are counted and slowed by `delay`
    pub fn counting(delay: std::time::Duration) -> Self {
        Self::build(Some(delay))
    }

    fn build(counting_delay: Option<std::time::Duration>) -> Self {
        let config = two_dimensional_config();
        let store = Arc::new(MemoryVectorStore::new(2));
        let embedder = TableEmbedder::new(
            2,
            vec![
                ("east", vec![1.0, 0.0]),
                ("north", vec![0.0, 1.0]),
                ("northeast", vec![0.7, 0.7]),
                ("south", vec![0.0, -1.0]),
            ],
        );
        let mut service = RecommendationService::new(
            store.clone(),
            Arc::new(MemoryReactionLog::new()),
            Arc::new(embedder),
            &config,
        )
        .unwrap();
        let mut ranker = None;
        if let Some(delay) = counting_delay {
            let counting = Arc::new(CountingRanker::new(
                ExhaustiveRanker::new(store.clone(), config.ranking.clone()),
                delay,
            ));
            service = service.with_ranker(counting.clone());
            ranker = Some(counting);
        }

        let scenario = Self {
            store,
            service,
            ranker,
            next_reaction: AtomicUsize::new(1),
        };
        scenario.add_item(1, "alice", "east", 0);
        scenario.add_item(2, "bob", "north", 1);
        scenario.add_item(3, "carol", "northeast", 2);
        scenario
    }

    pub fn add_item(&self, id: ItemId, author: &str, text: &str, minute: i64) {
        self.service
            .create_item(NewItem {
                id,
                author_id: author.to_string(),
                text: text.to_string(),
                created_at: Some(epoch() + Duration::minutes(minute)),
                approve_count: 0,
                reject_count: 0,
                comment_count: 0,
            })
            .unwrap();
    }

    pub fn react(&self, user: &str, target: ItemId, kind: ReactionKind) {
        let id = self.next_reaction.fetch_add(1, Ordering::SeqCst) as i64;
        self.service
            .record_reaction(Reaction {
                id,
                target_kind: TargetKind::Item,
                target_id: target,
                author_id: user.to_string(),
                kind,
                created_at: Utc::now(),
            })
            .unwrap();
    }
}
