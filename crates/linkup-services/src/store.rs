//! Local persistence — JSON collections on disk.
//!
//! Four collections (accounts, cached peers, chats, posts), each one JSON
//! file under the data dir. Writes are atomic: write to a temp file, then
//! rename. In-memory state is the source of truth for reads; every mutation
//! flushes the owning collection, and a failed flush surfaces as an error
//! rather than silently losing the write.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use linkup_core::types::{Chat, Comment, Message, Post, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create store dir {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("an account already exists for {0}")]
    AccountExists(String),
    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One registered account: credentials plus the profile.
///
/// Credentials are stored in the clear — authentication hardening is an
/// explicit non-goal of this client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub password: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collections {
    accounts: Vec<AccountRecord>,
    /// Profiles of remote peers, cached by discovery so chat and feed views
    /// resolve names/avatars without a network round trip.
    peers: Vec<User>,
    chats: Vec<Chat>,
    posts: Vec<Post>,
}

const ACCOUNTS_FILE: &str = "accounts.json";
const PEERS_FILE: &str = "peers.json";
const CHATS_FILE: &str = "chats.json";
const POSTS_FILE: &str = "posts.json";

/// The local store. Cheap to clone — all clones share state.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    dir: PathBuf,
    state: RwLock<Collections>,
}

impl LocalStore {
    /// Open (or create) a store rooted at the given directory.
    ///
    /// Missing collection files start empty. A malformed file is treated as
    /// empty and logged — same policy as malformed remote documents.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDir(dir.clone(), e))?;

        let state = Collections {
            accounts: load_collection(&dir.join(ACCOUNTS_FILE)),
            peers: load_collection(&dir.join(PEERS_FILE)),
            chats: load_collection(&dir.join(CHATS_FILE)),
            posts: load_collection(&dir.join(POSTS_FILE)),
        };

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                state: RwLock::new(state),
            }),
        })
    }

    // ── Accounts ──────────────────────────────────────────────────────────

    pub fn register_user(&self, email: &str, password: &str, user: User) -> Result<(), StoreError> {
        let mut state = self.inner.state.write().unwrap();
        if state.accounts.iter().any(|a| a.email == email) {
            return Err(StoreError::AccountExists(email.to_string()));
        }
        state.accounts.push(AccountRecord {
            email: email.to_string(),
            password: password.to_string(),
            user,
        });
        self.flush(ACCOUNTS_FILE, &state.accounts)
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        let state = self.inner.state.read().unwrap();
        state
            .accounts
            .iter()
            .find(|a| a.email == email && a.password == password)
            .map(|a| a.user.clone())
    }

    /// Resolve a user id: local accounts first, then the peer cache.
    pub fn get_user_by_id(&self, user_id: &str) -> Option<User> {
        let state = self.inner.state.read().unwrap();
        state
            .accounts
            .iter()
            .map(|a| &a.user)
            .chain(state.peers.iter())
            .find(|u| u.id == user_id)
            .cloned()
    }

    pub fn update_profile(&self, updated: &User) -> Result<(), StoreError> {
        let mut state = self.inner.state.write().unwrap();
        if let Some(account) = state.accounts.iter_mut().find(|a| a.user.id == updated.id) {
            account.user = updated.clone();
            return self.flush(ACCOUNTS_FILE, &state.accounts);
        }
        Ok(())
    }

    // ── Peer cache ────────────────────────────────────────────────────────

    /// Upsert a remote profile into the peer cache.
    pub fn cache_peer(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.inner.state.write().unwrap();
        match state.peers.iter_mut().find(|p| p.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => state.peers.push(user.clone()),
        }
        self.flush(PEERS_FILE, &state.peers)
    }

    pub fn cached_peers(&self) -> Vec<User> {
        self.inner.state.read().unwrap().peers.clone()
    }

    // ── Chats ─────────────────────────────────────────────────────────────

    pub fn get_chats_for_user(&self, user_id: &str) -> Vec<Chat> {
        let state = self.inner.state.read().unwrap();
        state
            .chats
            .iter()
            .filter(|c| c.participants.iter().any(|p| p == user_id))
            .cloned()
            .collect()
    }

    pub fn get_chat(&self, chat_id: &str) -> Option<Chat> {
        let state = self.inner.state.read().unwrap();
        state.chats.iter().find(|c| c.id == chat_id).cloned()
    }

    /// Create a chat unless an equivalent one exists. For non-group chats
    /// "equivalent" means the same unordered participant set. Returns
    /// whether a chat was created.
    pub fn create_chat_if_absent(&self, chat: Chat) -> Result<bool, StoreError> {
        let mut state = self.inner.state.write().unwrap();
        if !chat.is_group {
            let exists = state
                .chats
                .iter()
                .any(|c| !c.is_group && c.same_participants(&chat));
            if exists {
                return Ok(false);
            }
        }
        state.chats.push(chat);
        self.flush(CHATS_FILE, &state.chats)?;
        Ok(true)
    }

    /// Append a message to a chat. Idempotent on message id; a message for
    /// an unknown chat is dropped. Returns whether the message was stored.
    pub fn save_message(&self, chat_id: &str, message: Message) -> Result<bool, StoreError> {
        let mut state = self.inner.state.write().unwrap();
        let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) else {
            return Ok(false);
        };
        if chat.messages.iter().any(|m| m.id == message.id) {
            return Ok(false);
        }
        chat.messages.push(message);
        self.flush(CHATS_FILE, &state.chats)?;
        Ok(true)
    }

    // ── Posts ─────────────────────────────────────────────────────────────

    pub fn get_all_posts(&self) -> Vec<Post> {
        self.inner.state.read().unwrap().posts.clone()
    }

    pub fn get_posts_by_user(&self, user_id: &str) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .inner
            .state
            .read()
            .unwrap()
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        posts
    }

    /// Store a post. Idempotent on post id — remote broadcasts and feed
    /// fetches may hand us the same post more than once.
    pub fn create_post(&self, post: Post) -> Result<bool, StoreError> {
        let mut state = self.inner.state.write().unwrap();
        if state.posts.iter().any(|p| p.id == post.id) {
            return Ok(false);
        }
        state.posts.push(post);
        self.flush(POSTS_FILE, &state.posts)?;
        Ok(true)
    }

    pub fn delete_post(&self, post_id: &str) -> Result<(), StoreError> {
        let mut state = self.inner.state.write().unwrap();
        state.posts.retain(|p| p.id != post_id);
        self.flush(POSTS_FILE, &state.posts)
    }

    /// Toggle a like. Returns the new liked state for `user_id`.
    pub fn like_post(&self, post_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut state = self.inner.state.write().unwrap();
        let mut liked = false;
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            if let Some(i) = post.likes.iter().position(|id| id == user_id) {
                post.likes.remove(i);
            } else {
                post.likes.push(user_id.to_string());
                liked = true;
            }
            self.flush(POSTS_FILE, &state.posts)?;
        }
        Ok(liked)
    }

    pub fn comment_on_post(&self, post_id: &str, comment: Comment) -> Result<(), StoreError> {
        let mut state = self.inner.state.write().unwrap();
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            post.comments.push(comment);
            self.flush(POSTS_FILE, &state.posts)?;
        }
        Ok(())
    }

    // ── Snapshots ─────────────────────────────────────────────────────────

    /// Serialize the entire store to an opaque string.
    pub fn export_snapshot(&self) -> String {
        let state = self.inner.state.read().unwrap();
        serde_json::to_string(&*state).expect("collections serialization cannot fail")
    }

    /// Replace the entire store from a snapshot. Returns false (leaving the
    /// store untouched) if the snapshot does not parse.
    pub fn import_snapshot(&self, snapshot: &str) -> bool {
        let Ok(parsed) = serde_json::from_str::<Collections>(snapshot) else {
            return false;
        };
        let mut state = self.inner.state.write().unwrap();
        *state = parsed;
        for (file, result) in [
            (ACCOUNTS_FILE, self.flush(ACCOUNTS_FILE, &state.accounts)),
            (PEERS_FILE, self.flush(PEERS_FILE, &state.peers)),
            (CHATS_FILE, self.flush(CHATS_FILE, &state.chats)),
            (POSTS_FILE, self.flush(POSTS_FILE, &state.posts)),
        ] {
            if let Err(e) = result {
                tracing::warn!(file, error = %e, "snapshot flush failed");
            }
        }
        true
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Atomic write: tmp file → rename.
    fn flush<T: Serialize>(&self, file: &str, collection: &T) -> Result<(), StoreError> {
        let path = self.inner.dir.join(file);
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_vec_pretty(collection)?;
        {
            let mut f = fs::File::create(&tmp_path)
                .map_err(|e| StoreError::WriteFailed(tmp_path.clone(), e))?;
            f.write_all(&data)
                .map_err(|e| StoreError::WriteFailed(tmp_path.clone(), e))?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| StoreError::WriteFailed(path.clone(), e))
    }
}

fn load_collection<T: Default + for<'de> Deserialize<'de>>(path: &PathBuf) -> T {
    match fs::read(path) {
        Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "malformed collection file, starting empty");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkup_core::types::{content_id, direct_chat_id};

    fn tmp_store(name: &str) -> LocalStore {
        let dir = std::env::temp_dir().join(format!("linkup-store-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        LocalStore::open(dir).unwrap()
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            age: 24,
            bio: "hello".to_string(),
            media: Vec::new(),
            is_video: Vec::new(),
            location: None,
        }
    }

    fn message(sender: &str, text: &str, timestamp: u64) -> Message {
        Message {
            id: content_id(sender, timestamp, text.as_bytes()),
            sender_id: sender.to_string(),
            text: text.to_string(),
            media: None,
            media_type: None,
            timestamp,
        }
    }

    fn post(id: &str, user_id: &str) -> Post {
        Post {
            id: id.to_string(),
            user_id: user_id.to_string(),
            media: vec!["m".to_string()],
            is_video: vec![false],
            likes: Vec::new(),
            comments: Vec::new(),
            timestamp: 1,
        }
    }

    #[test]
    fn register_and_authenticate() {
        let store = tmp_store("auth");
        store.register_user("a@x", "pw", user("u1")).unwrap();

        assert_eq!(store.authenticate("a@x", "pw").unwrap().id, "u1");
        assert!(store.authenticate("a@x", "wrong").is_none());
        assert!(matches!(
            store.register_user("a@x", "pw2", user("u2")),
            Err(StoreError::AccountExists(_))
        ));
    }

    #[test]
    fn peer_cache_upserts_in_place() {
        let store = tmp_store("peers");
        store.cache_peer(&user("u2")).unwrap();
        let mut updated = user("u2");
        updated.bio = "new bio".to_string();
        store.cache_peer(&updated).unwrap();

        let peers = store.cached_peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].bio, "new bio");
        assert_eq!(store.get_user_by_id("u2").unwrap().bio, "new bio");
    }

    #[test]
    fn direct_chat_creation_is_idempotent_on_participant_set() {
        let store = tmp_store("chats");
        assert!(store.create_chat_if_absent(Chat::direct("u1", "u2")).unwrap());
        // same pair, other order
        assert!(!store.create_chat_if_absent(Chat::direct("u2", "u1")).unwrap());
        assert_eq!(store.get_chats_for_user("u1").len(), 1);
    }

    #[test]
    fn save_message_is_idempotent_on_id() {
        let store = tmp_store("messages");
        store.create_chat_if_absent(Chat::direct("u1", "u2")).unwrap();
        let chat_id = direct_chat_id("u1", "u2");
        let m = message("u1", "hey", 100);

        assert!(store.save_message(&chat_id, m.clone()).unwrap());
        assert!(!store.save_message(&chat_id, m).unwrap());
        assert_eq!(store.get_chat(&chat_id).unwrap().messages.len(), 1);

        // unknown chat: dropped, not an error
        assert!(!store.save_message("chat_nope", message("u1", "x", 1)).unwrap());
    }

    #[test]
    fn create_post_skips_duplicates_and_like_toggles() {
        let store = tmp_store("posts");
        assert!(store.create_post(post("p1", "u1")).unwrap());
        assert!(!store.create_post(post("p1", "u1")).unwrap());

        assert!(store.like_post("p1", "u2").unwrap());
        assert!(!store.like_post("p1", "u2").unwrap());
        assert!(store.get_all_posts()[0].likes.is_empty());
    }

    #[test]
    fn delete_post_removes_only_that_post() {
        let store = tmp_store("posts-delete");
        store.create_post(post("p1", "u1")).unwrap();
        store.create_post(post("p2", "u1")).unwrap();

        store.delete_post("p1").unwrap();
        let remaining = store.get_all_posts();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "p2");
    }

    #[test]
    fn posts_by_user_are_newest_first() {
        let store = tmp_store("posts-order");
        let mut a = post("p1", "u1");
        a.timestamp = 10;
        let mut b = post("p2", "u1");
        b.timestamp = 20;
        store.create_post(a).unwrap();
        store.create_post(b).unwrap();

        let posts = store.get_posts_by_user("u1");
        assert_eq!(posts[0].id, "p2");
        assert_eq!(posts[1].id, "p1");
    }

    #[test]
    fn snapshot_roundtrip_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("linkup-store-snap-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let store = LocalStore::open(&dir).unwrap();
        store.register_user("a@x", "pw", user("u1")).unwrap();
        store.create_chat_if_absent(Chat::direct("u1", "u2")).unwrap();
        let snapshot = store.export_snapshot();

        let other = tmp_store("snap-import");
        assert!(other.import_snapshot(&snapshot));
        assert_eq!(other.authenticate("a@x", "pw").unwrap().id, "u1");
        assert!(!other.import_snapshot("{ not json"));
        // failed import left state intact
        assert_eq!(other.get_chats_for_user("u1").len(), 1);

        // persisted state survives reopen
        drop(store);
        let reopened = LocalStore::open(&dir).unwrap();
        assert_eq!(reopened.authenticate("a@x", "pw").unwrap().id, "u1");
    }
}
