//! LinkUp integration test harness.
//!
//! Every test runs an in-process swarm: all nodes share one in-memory
//! document store (the registry/feed host) and one local switchboard (the
//! peer-connection service), which is exactly the topology of a handful of
//! client instances pointed at the same endpoints.
//!
//! Timing: swarm configs use 1s pulse/refresh intervals so liveness tests
//! finish quickly; `settle()` gives background tasks a beat to run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use linkup_core::config::LinkupConfig;
use linkup_core::types::{PeerIdentity, User};
use linkup_core::wire::transport_address;
use linkup_services::{
    DocumentStore, LocalStore, LocalSwitchboard, MemoryDocumentStore, SessionController,
    StaticAssistant,
};

mod discovery;
mod feed;
mod messaging;
mod presence;

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Swarm {
    pub docs: MemoryDocumentStore,
    pub switchboard: LocalSwitchboard,
    root: PathBuf,
}

impl Swarm {
    /// A fresh swarm with its own store root. `name` must be unique per
    /// test — store directories are keyed on it.
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("linkup-swarm-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        Self {
            docs: MemoryDocumentStore::new(),
            switchboard: LocalSwitchboard::new(),
            root,
        }
    }

    /// Test timing: everything specified in seconds, shrunk to the minimum.
    pub fn config() -> LinkupConfig {
        let mut config = LinkupConfig::default();
        config.presence.pulse_interval_secs = 1;
        config.discovery.refresh_secs = 1;
        config.transport.dial_timeout_secs = 2;
        config
    }

    pub async fn login(&self, user: User) -> SessionController {
        let store = LocalStore::open(self.root.join(&user.id)).unwrap();
        // first login registers the account; repeat logins find it on disk
        if store.get_user_by_id(&user.id).is_none() {
            store
                .register_user(&format!("{}@linkup.test", user.id), "pw", user.clone())
                .unwrap();
        }
        SessionController::login(
            user,
            store,
            Arc::new(self.docs.clone()),
            Arc::new(self.switchboard.clone()),
            Arc::new(StaticAssistant),
            &Self::config(),
        )
        .await
        .unwrap()
    }

    /// Overwrite the shared registry document directly.
    pub async fn seed_registry(&self, entries: Vec<PeerIdentity>) {
        self.docs
            .put("registry", serde_json::to_value(entries).unwrap())
            .await
            .unwrap();
    }
}

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        name: id.to_uppercase(),
        age: 25,
        bio: format!("{id} looking around"),
        media: vec![format!("https://example.com/{id}.jpg")],
        is_video: vec![false],
        location: Some("nearby".to_string()),
    }
}

pub fn identity(id: &str, last_seen: u64) -> PeerIdentity {
    PeerIdentity {
        id: id.to_string(),
        profile: user(id),
        last_seen,
        transport_address: transport_address(id),
    }
}

/// Let spawned tasks (dials, link readers, first pulses) run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

// ── Swarm sanity ──────────────────────────────────────────────────────────────

/// Two freshly logged-in nodes see each other through the registry.
/// The fundamental liveness check for everything that follows.
#[tokio::test]
async fn nodes_discover_each_other_after_login() {
    let swarm = Swarm::new("sanity");
    let u1 = swarm.login(user("u1")).await;
    settle().await; // let u1's first heartbeat land before u2's read-modify-write
    let u2 = swarm.login(user("u2")).await;
    settle().await;

    let seen_by_u1: Vec<String> = u1
        .discovery_candidates()
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();
    let seen_by_u2: Vec<String> = u2
        .discovery_candidates()
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();

    assert_eq!(seen_by_u1, vec!["u2".to_string()]);
    assert_eq!(seen_by_u2, vec!["u1".to_string()]);
}

/// Snapshot export/import round-trips a whole store between nodes.
#[tokio::test]
async fn snapshot_roundtrip_between_nodes() {
    let swarm = Swarm::new("snapshot");
    let u1 = swarm.login(user("u1")).await;

    u1.swipe_right(&user("u2")).unwrap();
    u1.send_message("chat_u1_u2", "exported hello", None).unwrap();
    let snapshot = u1.export_snapshot();

    let u3 = swarm.login(user("u3")).await;
    assert!(u3.import_snapshot(&snapshot));
    let imported = u3.store().get_chat("chat_u1_u2").unwrap();
    assert_eq!(imported.messages.len(), 1);
    assert_eq!(imported.messages[0].text, "exported hello");

    assert!(!u3.import_snapshot("definitely not json"));
}
