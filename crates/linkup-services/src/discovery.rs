//! Discovery reconciliation — registry snapshots become the candidate list.
//!
//! Merges remote registry state with the local peer cache, drops our own
//! entry, and orders deterministically: descending `last_seen`, ties broken
//! by ascending id. (The UI may shuffle for presentation; the service layer
//! stays testable.)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use linkup_core::types::PeerIdentity;

use crate::directory::DirectoryClient;
use crate::store::LocalStore;
use crate::transport::Transport;

/// Outcome of a directed search. `NotFound` is a result, not an error —
/// the UI shows "not found" for this and "try again" for network trouble,
/// which surfaces earlier as an empty discovery list.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(Box<PeerIdentity>),
    NotFound,
}

/// The discovery feed for one session.
#[derive(Clone)]
pub struct DiscoveryFeed {
    directory: Arc<DirectoryClient>,
    store: LocalStore,
    transport: Transport,
    self_id: String,
    /// Session epoch shared with the controller. Bumped on logout; a
    /// refresh that started under an older epoch discards its results.
    epoch: Arc<AtomicU64>,
}

impl DiscoveryFeed {
    pub fn new(
        directory: Arc<DirectoryClient>,
        store: LocalStore,
        transport: Transport,
        self_id: &str,
        epoch: Arc<AtomicU64>,
    ) -> Self {
        Self {
            directory,
            store,
            transport,
            self_id: self_id.to_string(),
            epoch,
        }
    }

    /// Fetch, reconcile, and return the ordered candidate list.
    pub async fn refresh(&self) -> Vec<PeerIdentity> {
        let epoch_at_start = self.epoch.load(Ordering::SeqCst);
        let mut candidates = self.directory.fetch_discovery().await;

        // a late response after logout must not touch the cache
        if self.epoch.load(Ordering::SeqCst) != epoch_at_start {
            tracing::debug!("session changed mid-refresh, discarding results");
            return Vec::new();
        }

        candidates.retain(|identity| identity.id != self.self_id);

        for identity in &candidates {
            if let Err(e) = self.store.cache_peer(&identity.profile) {
                tracing::warn!(peer = %identity.id, error = %e, "peer cache write failed");
            }
        }

        candidates.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }

    /// Directed search by raw id input: trimmed, case-insensitive exact
    /// match against the account id or the transport address. A hit is
    /// cached and dialed.
    pub async fn search(&self, raw: &str) -> SearchOutcome {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return SearchOutcome::NotFound;
        }

        let candidates = self.directory.fetch_discovery().await;
        let hit = candidates.into_iter().find(|identity| {
            identity.id != self.self_id
                && (identity.id.to_lowercase() == needle
                    || identity.transport_address.to_lowercase() == needle)
        });

        match hit {
            Some(identity) => {
                if let Err(e) = self.store.cache_peer(&identity.profile) {
                    tracing::warn!(peer = %identity.id, error = %e, "peer cache write failed");
                }
                self.transport.dial(&identity.id);
                SearchOutcome::Found(Box::new(identity))
            }
            None => SearchOutcome::NotFound,
        }
    }
}

/// Background refresh at a fixed cadence. Cancel by aborting the task.
pub async fn refresh_loop(feed: DiscoveryFeed, interval: Duration) {
    let mut ticker = time::interval(interval);
    // the controller does an eager refresh at login; skip the immediate tick
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let count = feed.refresh().await.len();
        tracing::trace!(candidates = count, "discovery refreshed");
    }
}
