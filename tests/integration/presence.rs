//! Presence pulse and address-claim scenarios.

use crate::*;
use linkup_core::types::now_ms;
use serde_json::Value;

fn registry_entry(doc: &Value, id: &str) -> Option<Value> {
    doc.as_array()?
        .iter()
        .find(|entry| entry["id"] == id)
        .cloned()
}

/// The pulse publishes immediately at login and keeps `last_seen` moving.
#[tokio::test]
async fn pulse_keeps_the_registry_entry_fresh() {
    let swarm = Swarm::new("pulse-fresh");
    let _u1 = swarm.login(user("u1")).await;
    settle().await;

    let first = registry_entry(&swarm.docs.peek("registry"), "u1")
        .expect("login should publish a heartbeat immediately");
    let first_seen = first["last_seen"].as_u64().unwrap();
    assert!(now_ms().saturating_sub(first_seen) < 5_000);

    // one pulse interval later the stamp has advanced
    tokio::time::sleep(std::time::Duration::from_millis(1_400)).await;
    let second = registry_entry(&swarm.docs.peek("registry"), "u1").unwrap();
    assert!(second["last_seen"].as_u64().unwrap() > first_seen);
}

/// Profile edits ride the next heartbeat into the registry.
#[tokio::test]
async fn pulse_carries_profile_edits() {
    let swarm = Swarm::new("pulse-edit");
    let u1 = swarm.login(user("u1")).await;
    settle().await;

    let mut edited = user("u1");
    edited.bio = "rewritten for the evening".to_string();
    u1.update_profile(&edited).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1_400)).await;
    let entry = registry_entry(&swarm.docs.peek("registry"), "u1").unwrap();
    assert_eq!(entry["profile"]["bio"], "rewritten for the evening");
}

/// Logout stops the pulse: the registry entry goes quiet and ages out.
/// Exactly one pulse timer per session, none leaked across login cycles.
#[tokio::test]
async fn logout_stops_the_pulse() {
    let swarm = Swarm::new("pulse-stop");
    let u1 = swarm.login(user("u1")).await;
    settle().await;

    u1.logout();
    let frozen = registry_entry(&swarm.docs.peek("registry"), "u1").unwrap();
    let frozen_seen = frozen["last_seen"].as_u64().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1_400)).await;
    let after = registry_entry(&swarm.docs.peek("registry"), "u1").unwrap();
    assert_eq!(
        after["last_seen"].as_u64().unwrap(),
        frozen_seen,
        "a logged-out session must not heartbeat"
    );
}

/// Pulse failures are swallowed; the loop resumes on the fixed cadence as
/// soon as the document host is back.
#[tokio::test]
async fn pulse_survives_document_outages() {
    let swarm = Swarm::new("pulse-outage");
    let _u1 = swarm.login(user("u1")).await;
    settle().await;

    swarm.docs.set_failing(true);
    tokio::time::sleep(std::time::Duration::from_millis(1_400)).await;
    swarm.docs.set_failing(false);
    tokio::time::sleep(std::time::Duration::from_millis(1_400)).await;

    let entry = registry_entry(&swarm.docs.peek("registry"), "u1").unwrap();
    assert!(now_ms().saturating_sub(entry["last_seen"].as_u64().unwrap()) < 5_000);
}

/// A second session of the same account cannot take the canonical address;
/// it runs degraded on a suffixed one and says so.
#[tokio::test]
async fn duplicate_account_session_degrades_to_fallback_address() {
    let swarm = Swarm::new("dup-session");
    let first = swarm.login(user("u1")).await;
    let second = swarm.login(user("u1")).await;

    assert_eq!(first.address(), "linkup-p2p-u1");
    assert!(!first.is_degraded());
    assert_eq!(second.address(), "linkup-p2p-u1-alt1");
    assert!(second.is_degraded());

    // the degraded session can still dial out
    let u2 = swarm.login(user("u2")).await;
    second.swipe_right(&user("u2")).unwrap();
    settle().await;
    assert_eq!(second.links().len(), 1);
    let _ = u2;
}
