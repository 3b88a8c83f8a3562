//! Shared feed scenarios, including the accepted lost-update race.

use crate::*;
use std::sync::Arc;

use linkup_core::config::DirectoryConfig;
use linkup_core::types::{now_ms, Post};
use linkup_services::{DirectoryClient, DocumentError, MemoryDocumentStore, SessionEvent};
use serde_json::Value;
use tokio::time::timeout;

fn post(id: &str, user_id: &str) -> Post {
    Post {
        id: id.to_string(),
        user_id: user_id.to_string(),
        media: vec!["https://example.com/p.jpg".to_string()],
        is_video: vec![false],
        likes: Vec::new(),
        comments: Vec::new(),
        timestamp: now_ms(),
    }
}

fn directory(swarm: &Swarm) -> DirectoryClient {
    DirectoryClient::new(Arc::new(swarm.docs.clone()), &DirectoryConfig::default())
}

/// Publishing the same post id twice leaves exactly one feed entry, at the
/// head.
#[tokio::test]
async fn publishing_a_post_is_idempotent() {
    let swarm = Swarm::new("feed-idempotent");
    let dir = directory(&swarm);

    assert!(dir.publish_post(post("p1", "u1")).await.unwrap());
    assert!(!dir.publish_post(post("p1", "u1")).await.unwrap());

    let feed = dir.fetch_feed().await;
    assert_eq!(feed.iter().filter(|p| p.id == "p1").count(), 1);
    assert_eq!(feed[0].id, "p1");
}

/// A new post reaches peers with open links immediately, ahead of their
/// next feed fetch.
#[tokio::test]
async fn published_posts_broadcast_to_open_links() {
    let swarm = Swarm::new("feed-broadcast");
    let u1 = swarm.login(user("u1")).await;
    let u2 = swarm.login(user("u2")).await;
    let mut u2_events = u2.subscribe_events();

    u2.swipe_right(&user("u1")).unwrap();
    settle().await;

    let published = u1
        .publish_post(vec!["https://example.com/night.jpg".to_string()], vec![false])
        .await
        .unwrap();
    settle().await;

    assert!(u2.store().get_all_posts().iter().any(|p| p.id == published.id));
    match timeout(std::time::Duration::from_secs(2), u2_events.recv()).await {
        Ok(Ok(SessionEvent::PostReceived { post })) => assert_eq!(post.id, published.id),
        other => panic!("expected PostReceived, got {other:?}"),
    }

    // and it is on the shared feed for peers with no link at all
    let u3 = swarm.login(user("u3")).await;
    assert!(u3.feed().await.iter().any(|p| p.id == published.id));
}

/// Likes and comments stay local and survive a feed refresh.
#[tokio::test]
async fn likes_and_comments_attach_to_cached_posts() {
    let swarm = Swarm::new("feed-likes");
    let u1 = swarm.login(user("u1")).await;
    let u2 = swarm.login(user("u2")).await;

    let published = u1
        .publish_post(vec!["https://example.com/p.jpg".to_string()], vec![false])
        .await
        .unwrap();

    // u2 pulls the feed, then interacts
    u2.feed().await;
    assert!(u2.like_post(&published.id).unwrap());
    u2.comment_on_post(&published.id, "love this").unwrap();

    let posts = u2.feed().await;
    let seen = posts.iter().find(|p| p.id == published.id).unwrap();
    assert_eq!(seen.likes, vec!["u2".to_string()]);
    assert_eq!(seen.comments.len(), 1);
    assert_eq!(seen.comments[0].text, "love this");
}

/// Document store whose next read returns a pinned stale snapshot —
/// deterministically reproducing two writers racing the same document.
struct StaleReadStore {
    docs: MemoryDocumentStore,
    stale: std::sync::Mutex<Option<Value>>,
}

#[async_trait::async_trait]
impl linkup_services::DocumentStore for StaleReadStore {
    async fn get(&self, name: &str) -> Result<Value, DocumentError> {
        if let Some(snapshot) = self.stale.lock().unwrap().take() {
            return Ok(snapshot);
        }
        linkup_services::DocumentStore::get(&self.docs, name).await
    }

    async fn put(&self, name: &str, value: Value) -> Result<(), DocumentError> {
        linkup_services::DocumentStore::put(&self.docs, name, value).await
    }
}

/// The registry is read-modify-write with no concurrency control: when two
/// publishers race, the last writer wins and the other update is lost until
/// its next pulse. This asserts the accepted behavior — last write wins —
/// not "no data loss".
#[tokio::test]
async fn concurrent_registry_writers_lose_updates_last_write_wins() {
    let swarm = Swarm::new("lost-update");
    let dir = directory(&swarm);

    // writer A publishes u1
    dir.publish_profile(identity("u1", now_ms())).await.unwrap();

    // writer B raced A: its read happened before A's write landed
    let stale = StaleReadStore {
        docs: swarm.docs.clone(),
        stale: std::sync::Mutex::new(Some(Value::Null)),
    };
    let racing = DirectoryClient::new(Arc::new(stale), &DirectoryConfig::default());
    racing.publish_profile(identity("u2", now_ms())).await.unwrap();

    // u1's entry was clobbered — the accepted lost update
    let ids: Vec<String> = dir.fetch_discovery().await.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["u2".to_string()]);

    // the loser's next pulse restores it
    dir.publish_profile(identity("u1", now_ms())).await.unwrap();
    let mut ids: Vec<String> = dir.fetch_discovery().await.into_iter().map(|p| p.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["u1".to_string(), "u2".to_string()]);
}
