//! End-to-end ranking behaviour through the public service API

mod common;

use approx::assert_relative_eq;
use common::Scenario;

use affinity::model::ReactionKind;
use affinity::{EntryState, RecError};

#[test]
fn test_approve_item_one_ranks_east_first() {
    let scenario = Scenario::new();
    scenario.react("dave", 1, ReactionKind::Approve);

    let preference = scenario.service.preference("dave").unwrap();
    assert_eq!(preference.vector, vec![1.0, 0.0]);

    let result = scenario.service.recommend("dave", 2, true).unwrap();
    assert_eq!(result.item_ids(), vec![1, 3]);
    assert_relative_eq!(result.items[0].score, 1.0, epsilon = 1e-6);
    assert_relative_eq!(result.items[1].score, 0.707, epsilon = 1e-3);
}

#[test]
fn test_reject_pulls_item_two_negative_once_invalidated() {
    let scenario = Scenario::new();
    scenario.react("dave", 1, ReactionKind::Approve);

    let before = scenario.service.recommend("dave", 3, true).unwrap();
    let item_two_before = before.items.iter().find(|s| s.item.id == 2).unwrap();
    assert_eq!(item_two_before.score, 0.0);

    scenario.react("dave", 2, ReactionKind::Reject);
    assert_eq!(
        scenario.service.cache().state("dave", before.params),
        EntryState::Stale
    );
    assert_eq!(scenario.service.preference("dave").unwrap().vector, vec![1.0, -1.0]);

    let after = scenario.service.recommend("dave", 3, true).unwrap();
    let item_two_after = after.items.iter().find(|s| s.item.id == 2).unwrap();
    assert!(item_two_after.score < 0.0);
    assert_eq!(after.item_ids(), vec![1, 3, 2]);
}

#[test]
fn test_zero_preference_falls_back_to_newest_first() {
    let scenario = Scenario::new();
    let result = scenario.service.recommend("newcomer", 2, true).unwrap();
    assert_eq!(result.item_ids(), vec![3, 2]);
    assert!(result.items.iter().all(|s| s.score == 0.0));
}

#[test]
fn test_comment_only_user_gets_fallback() {
    let scenario = Scenario::new();
    scenario
        .service
        .record_reaction(affinity::Reaction {
            id: 99,
            target_kind: affinity::TargetKind::Comment,
            target_id: 1,
            author_id: "dave".to_string(),
            kind: ReactionKind::Approve,
            created_at: chrono::Utc::now(),
        })
        .unwrap();
    let result = scenario.service.recommend("dave", 3, true).unwrap();
    assert_eq!(result.item_ids(), vec![3, 2, 1]);
}

#[test]
fn test_ranking_is_deterministic() {
    let scenario = Scenario::new();
    scenario.add_item(4, "erin", "east", 2);
    scenario.add_item(5, "frank", "east", 2);
    scenario.react("dave", 1, ReactionKind::Approve);

    let first = scenario.service.recommend("dave", 5, false).unwrap().item_ids();
    scenario.service.on_reaction_created("dave");
    let second = scenario.service.recommend("dave", 5, false).unwrap().item_ids();

    // Equal scores: item 1 is older than 4 and 5, which tie on time too
    assert_eq!(first, vec![4, 5, 1, 3, 2]);
    assert_eq!(first, second);
}

#[test]
fn test_exclusion_removes_own_items() {
    let scenario = Scenario::new();
    scenario.add_item(4, "alice", "northeast", 3);
    scenario.react("alice", 3, ReactionKind::Approve);

    let result = scenario.service.recommend("alice", 10, true).unwrap();
    assert!(result.items.iter().all(|s| s.item.author_id != "alice"));
    assert_eq!(result.item_ids(), vec![3, 2]);

    let with_own = scenario.service.recommend("alice", 10, false).unwrap();
    assert_eq!(with_own.items.len(), 4);
}

#[test]
fn test_invalid_limits() {
    let scenario = Scenario::new();
    for limit in [0, -1] {
        assert!(matches!(
            scenario.service.recommend("dave", limit, true),
            Err(RecError::InvalidArgument(_))
        ));
    }
}

#[test]
fn test_encoder_failure_surfaces() {
    let scenario = Scenario::new();
    let err = scenario
        .service
        .create_item(affinity::NewItem {
            id: 10,
            author_id: "erin".to_string(),
            text: "unknown text".to_string(),
            created_at: None,
            approve_count: 0,
            reject_count: 0,
            comment_count: 0,
        })
        .unwrap_err();
    assert!(matches!(err, RecError::EncodingUnavailable(_)));
    assert!(matches!(
        scenario.service.get_item(10),
        Err(RecError::NotFound(_))
    ));
}
