//! Cache coalescing and invalidation scope under concurrent requests

mod common;

use std::sync::{Arc, Barrier};
use std::time::Duration;

use common::Scenario;

use affinity::model::{ReactionKind, RequestParams};
use affinity::EntryState;

const PARAMS: RequestParams = RequestParams {
    limit: 10,
    exclude_author_posts: true,
};

#[test]
fn test_concurrent_stale_requests_rank_once() {
    let scenario = Scenario::counting(Duration::from_millis(150));
    let ranker = scenario.ranker.clone().unwrap();
    scenario.react("dave", 1, ReactionKind::Approve);

    // Warm, then invalidate so every thread hits the same stale key
    scenario.service.recommend("dave", 10, true).unwrap();
    scenario.service.on_reaction_created("dave");
    assert_eq!(scenario.service.cache().state("dave", PARAMS), EntryState::Stale);
    let before = ranker.calls();

    let threads = 16;
    let barrier = Barrier::new(threads);
    let results: Vec<Vec<i64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    scenario.service.recommend("dave", 10, true).unwrap().item_ids()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(ranker.calls() - before, 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert!(scenario.service.cache().stats().coalesced >= 1);
}

#[test]
fn test_different_users_compute_independently() {
    let scenario = Scenario::counting(Duration::from_millis(50));
    let ranker = scenario.ranker.clone().unwrap();

    std::thread::scope(|s| {
        for user in ["u1", "u2", "u3", "u4"] {
            let service = &scenario.service;
            s.spawn(move || service.recommend(user, 10, true).unwrap());
        }
    });

    assert_eq!(ranker.calls(), 4);
    assert_eq!(scenario.service.cache().stats().users, 4);
}

#[test]
fn test_reaction_invalidates_only_its_author() {
    let scenario = Scenario::new();
    scenario.service.recommend("dave", 10, true).unwrap();
    scenario.service.recommend("erin", 10, true).unwrap();

    scenario.react("dave", 2, ReactionKind::Approve);

    assert_eq!(scenario.service.cache().state("dave", PARAMS), EntryState::Stale);
    assert_eq!(scenario.service.cache().state("erin", PARAMS), EntryState::Fresh);
}

#[test]
fn test_new_item_invalidates_every_user() {
    let scenario = Scenario::new();
    let small = RequestParams {
        limit: 1,
        exclude_author_posts: false,
    };
    scenario.service.recommend("dave", 10, true).unwrap();
    scenario.service.recommend("erin", 1, false).unwrap();

    scenario.add_item(4, "frank", "south", 10);

    assert_eq!(scenario.service.cache().state("dave", PARAMS), EntryState::Stale);
    assert_eq!(scenario.service.cache().state("erin", small), EntryState::Stale);

    let refreshed = scenario.service.recommend("erin", 1, false).unwrap();
    assert_eq!(refreshed.item_ids(), vec![4]);
}

#[test]
fn test_fresh_hit_returns_same_result() {
    let scenario = Scenario::counting(Duration::ZERO);
    let ranker = scenario.ranker.clone().unwrap();

    let first = scenario.service.recommend("dave", 10, true).unwrap();
    let second = scenario.service.recommend("dave", 10, true).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(ranker.calls(), 1);
    assert_eq!(scenario.service.cache().stats().hits, 1);
}

#[test]
fn test_refresh_forces_recompute() {
    let scenario = Scenario::counting(Duration::ZERO);
    let ranker = scenario.ranker.clone().unwrap();

    let first = scenario.service.recommend("dave", 10, true).unwrap();
    let refreshed = scenario.service.refresh("dave").unwrap();

    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert_eq!(ranker.calls(), 2);
    assert_eq!(scenario.service.cache().state("dave", PARAMS), EntryState::Fresh);
}
