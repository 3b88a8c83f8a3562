//! Directory client — the shared registry and feed documents.
//!
//! Both documents are read-modify-write with no concurrency token.
//! Concurrent publishers race and the last writer replaces the whole
//! document; a lost update is re-added by the loser's next pulse. This is
//! the specified behavior — do not add locking here.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use linkup_core::config::DirectoryConfig;
use linkup_core::types::{now_ms, PeerIdentity, Post};

use crate::documents::{DocumentError, DocumentStore};

const REGISTRY_DOC: &str = "registry";
const FEED_DOC: &str = "feed";

/// Client for the shared registry and feed documents.
#[derive(Clone)]
pub struct DirectoryClient {
    docs: Arc<dyn DocumentStore>,
    staleness: Duration,
    feed_cap: usize,
}

impl DirectoryClient {
    pub fn new(docs: Arc<dyn DocumentStore>, config: &DirectoryConfig) -> Self {
        Self {
            docs,
            staleness: config.staleness(),
            feed_cap: config.feed_cap,
        }
    }

    fn staleness_ms(&self) -> u64 {
        self.staleness.as_millis() as u64
    }

    /// Upsert our identity into the registry and prune stale entries.
    ///
    /// Fetch failures are treated as an empty registry so a fresh swarm can
    /// bootstrap itself; write failures bubble up for the pulse loop to log.
    pub async fn publish_profile(&self, identity: PeerIdentity) -> Result<(), DocumentError> {
        let mut registry = match self.docs.get(REGISTRY_DOC).await {
            Ok(doc) => parse_collection::<PeerIdentity>(doc),
            Err(e) => {
                tracing::debug!(error = %e, "registry fetch failed, publishing into empty");
                Vec::new()
            }
        };

        match registry.iter_mut().find(|p| p.id == identity.id) {
            Some(existing) => *existing = identity,
            None => registry.push(identity),
        }

        let now = now_ms();
        let window = self.staleness_ms();
        registry.retain(|p| p.is_fresh(now, window));

        let doc = serde_json::to_value(&registry).expect("registry serialization cannot fail");
        self.docs.put(REGISTRY_DOC, doc).await
    }

    /// Fetch the registry, filtered to fresh entries. Never fails: any
    /// error produces an empty list, and the caller's refresh cadence is
    /// the retry policy.
    pub async fn fetch_discovery(&self) -> Vec<PeerIdentity> {
        let doc = match self.docs.get(REGISTRY_DOC).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "discovery fetch failed");
                return Vec::new();
            }
        };
        let now = now_ms();
        let window = self.staleness_ms();
        parse_collection::<PeerIdentity>(doc)
            .into_iter()
            .filter(|p| p.is_fresh(now, window))
            .collect()
    }

    /// Publish a post to the shared feed. Idempotent on post id. Returns
    /// whether the post was actually added — callers only broadcast on the
    /// first publication.
    pub async fn publish_post(&self, post: Post) -> Result<bool, DocumentError> {
        let mut feed = match self.docs.get(FEED_DOC).await {
            Ok(doc) => parse_collection::<Post>(doc),
            Err(e) => {
                tracing::debug!(error = %e, "feed fetch failed, publishing into empty");
                Vec::new()
            }
        };

        if feed.iter().any(|p| p.id == post.id) {
            return Ok(false);
        }

        feed.insert(0, post);
        feed.truncate(self.feed_cap);

        let doc = serde_json::to_value(&feed).expect("feed serialization cannot fail");
        self.docs.put(FEED_DOC, doc).await?;
        Ok(true)
    }

    /// Fetch the shared feed, newest first. Never fails.
    pub async fn fetch_feed(&self) -> Vec<Post> {
        match self.docs.get(FEED_DOC).await {
            Ok(doc) => parse_collection::<Post>(doc),
            Err(e) => {
                tracing::warn!(error = %e, "feed fetch failed");
                Vec::new()
            }
        }
    }
}

/// Parse a document expected to be a JSON array. Anything else — null,
/// an object, garbage entries — degrades to the entries that do parse,
/// or an empty collection. Malformed remote state must never crash a peer.
fn parse_collection<T: serde::de::DeserializeOwned>(doc: Value) -> Vec<T> {
    match doc {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}
