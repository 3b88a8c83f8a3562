//! Discovery and reconciliation scenarios.

use crate::*;
use linkup_core::config::DirectoryConfig;
use linkup_core::types::now_ms;
use linkup_services::{LinkState, SearchOutcome};

/// Registry holds u1; u2 sees it, u1 itself does not.
#[tokio::test]
async fn self_exclusion_both_ways() {
    let swarm = Swarm::new("self-exclusion");
    let u1 = swarm.login(user("u1")).await;
    settle().await;

    // only u1 has pulsed; seed nothing else
    let as_u1: Vec<String> = u1.discovery_candidates().await.into_iter().map(|c| c.id).collect();
    assert!(as_u1.is_empty());

    let u2 = swarm.login(user("u2")).await;
    settle().await;
    let as_u2: Vec<String> = u2.discovery_candidates().await.into_iter().map(|c| c.id).collect();
    assert!(as_u2.contains(&"u1".to_string()));
    assert!(!as_u2.contains(&"u2".to_string()));
}

/// An entry exactly one millisecond past the window is gone.
#[tokio::test]
async fn staleness_window_is_a_hard_boundary() {
    let swarm = Swarm::new("staleness");
    let window_ms = DirectoryConfig::default().staleness_secs * 1000;
    let now = now_ms();
    swarm
        .seed_registry(vec![
            identity("fresh", now),
            identity("expired", now - window_ms - 1),
        ])
        .await;

    let u9 = swarm.login(user("u9")).await;
    let ids: Vec<String> = u9.discovery_candidates().await.into_iter().map(|c| c.id).collect();

    assert!(ids.contains(&"fresh".to_string()));
    assert!(!ids.contains(&"expired".to_string()));
}

/// Candidates come back ordered: most recent heartbeat first, id ties.
#[tokio::test]
async fn candidate_order_is_deterministic() {
    let swarm = Swarm::new("ordering");
    let now = now_ms();
    swarm
        .seed_registry(vec![
            identity("older", now - 5_000),
            identity("b-tied", now - 1_000),
            identity("a-tied", now - 1_000),
        ])
        .await;

    let u9 = swarm.login(user("u9")).await;
    let ids: Vec<String> = u9
        .discovery_candidates()
        .await
        .into_iter()
        .map(|c| c.id)
        .filter(|id| id != "u9")
        .collect();

    assert_eq!(ids, vec!["a-tied", "b-tied", "older"]);
}

/// Discovery fills the peer cache so profiles resolve offline.
#[tokio::test]
async fn discovery_populates_the_peer_cache() {
    let swarm = Swarm::new("cache");
    swarm.seed_registry(vec![identity("u1", now_ms())]).await;

    let u2 = swarm.login(user("u2")).await;
    u2.discovery_candidates().await;

    let cached = u2.store().get_user_by_id("u1").unwrap();
    assert_eq!(cached.name, "U1");
}

/// Directed search: exact match (trimmed, case-insensitive) or a typed
/// not-found — never an error.
#[tokio::test]
async fn search_finds_active_peers_and_dials_them() {
    let swarm = Swarm::new("search");
    let _u1 = swarm.login(user("u1")).await;
    settle().await; // u1's heartbeat must land before u2's first publish reads
    let u2 = swarm.login(user("u2")).await;
    settle().await;

    match u2.search("  U1  ").await {
        SearchOutcome::Found(found) => assert_eq!(found.id, "u1"),
        SearchOutcome::NotFound => panic!("u1 should be found"),
    }
    settle().await;
    assert_eq!(
        u2.links().iter().find(|l| l.peer_id == "u1").map(|l| l.state),
        Some(LinkState::Open),
        "search hit should have dialed the peer"
    );

    assert!(matches!(u2.search("linkup-p2p-u1").await, SearchOutcome::Found(_)));
    assert!(matches!(u2.search("u404").await, SearchOutcome::NotFound));
}
