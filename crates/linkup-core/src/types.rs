//! Domain model for the LinkUp client core.
//!
//! These types travel three ways: persisted in the local store, serialized
//! into the shared registry/feed documents, and embedded in wire messages.
//! One serde representation covers all three.

use serde::{Deserialize, Serialize};

/// Media kind discriminator for message attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// A user profile as shown on cards, chats, and the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Durable account identifier.
    pub id: String,
    pub name: String,
    pub age: u8,
    pub bio: String,
    /// Profile media URLs or data URLs.
    pub media: Vec<String>,
    /// Parallel to `media`: whether each entry is a video.
    #[serde(default)]
    pub is_video: Vec<bool>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A registry entry: one peer's profile plus liveness bookkeeping.
///
/// `transport_address` is always derivable from `id` alone (see
/// [`crate::wire::transport_address`]) — the registry may be stale, so a
/// dial must never depend on a directory lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub id: String,
    pub profile: User,
    /// Unix timestamp in milliseconds of the peer's last heartbeat.
    pub last_seen: u64,
    pub transport_address: String,
}

impl PeerIdentity {
    /// Is this entry fresh enough to count as active?
    pub fn is_fresh(&self, now_ms: u64, staleness_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_seen) < staleness_ms
    }
}

/// A comment on a feed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub timestamp: u64,
}

/// A feed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub media: Vec<String>,
    #[serde(default)]
    pub is_video: Vec<bool>,
    /// Ids of users who liked the post.
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub timestamp: u64,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    pub timestamp: u64,
}

/// A chat thread between two or more participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub participants: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub is_group: bool,
}

impl Chat {
    /// Build the direct chat between two users. The id is order-independent.
    pub fn direct(a: &str, b: &str) -> Self {
        Self {
            id: direct_chat_id(a, b),
            name: None,
            participants: vec![a.to_string(), b.to_string()],
            messages: Vec::new(),
            is_group: false,
        }
    }

    /// Unordered participant-set equality — the identity rule for
    /// non-group chats.
    pub fn same_participants(&self, other: &Chat) -> bool {
        self.participants.len() == other.participants.len()
            && self
                .participants
                .iter()
                .all(|p| other.participants.contains(p))
    }

    /// The other participant of a direct chat, from `me`'s point of view.
    pub fn counterpart(&self, me: &str) -> Option<&str> {
        if self.is_group {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.as_str() != me)
            .map(|p| p.as_str())
    }
}

/// Canonical id for a direct chat: participants sorted, joined.
pub fn direct_chat_id(a: &str, b: &str) -> String {
    let mut pair = [a, b];
    pair.sort_unstable();
    format!("chat_{}_{}", pair[0], pair[1])
}

/// Content-derived id: `hex(blake3(sender || timestamp_le || payload))`,
/// truncated to 32 hex chars. Identical content produces identical ids,
/// which is what makes store writes idempotent.
pub fn content_id(sender: &str, timestamp: u64, payload: &[u8]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(sender.as_bytes());
    h.update(&timestamp.to_le_bytes());
    h.update(payload);
    hex::encode(h.finalize().as_bytes())[..32].to_string()
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
