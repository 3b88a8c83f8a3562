//! Session controller — one per login, never a process-wide singleton.
//!
//! `login` constructs the whole service graph (store, directory, transport,
//! discovery, pulse) and owns its lifetime; `logout` tears it down: loop
//! tasks aborted, event handlers unsubscribed, links closed, and the
//! session epoch bumped so any in-flight fetch discards its results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use linkup_core::config::LinkupConfig;
use linkup_core::types::{
    content_id, direct_chat_id, now_ms, Chat, Comment, MediaType, Message, PeerIdentity, Post, User,
};
use linkup_core::wire::{self, WireMessage};

use crate::assistant::Assistant;
use crate::directory::DirectoryClient;
use crate::discovery::{refresh_loop, DiscoveryFeed, SearchOutcome};
use crate::documents::DocumentStore;
use crate::pulse::pulse_loop;
use crate::store::{LocalStore, StoreError};
use crate::switchboard::{Switchboard, SwitchboardError};
use crate::transport::{LinkInfo, Subscription, Transport};

/// What a UI consumer sees from a running session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageReceived { chat_id: String, message: Message },
    TypingChanged {
        chat_id: String,
        user_id: String,
        is_typing: bool,
    },
    PostReceived { post: Post },
}

/// The controller for one authenticated session. Cheap to clone.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    user_id: String,
    store: LocalStore,
    directory: Arc<DirectoryClient>,
    transport: Transport,
    discovery: DiscoveryFeed,
    assistant: Arc<dyn Assistant>,
    events: broadcast::Sender<SessionEvent>,
    epoch: Arc<AtomicU64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SessionController {
    /// Bring a session up: bind the transport, wire inbound events into the
    /// store, and start the pulse and discovery loops.
    pub async fn login(
        user: User,
        store: LocalStore,
        docs: Arc<dyn DocumentStore>,
        switchboard: Arc<dyn Switchboard>,
        assistant: Arc<dyn Assistant>,
        config: &LinkupConfig,
    ) -> Result<Self, SwitchboardError> {
        let user_id = user.id.clone();
        let directory = Arc::new(DirectoryClient::new(docs, &config.directory));
        let transport = Transport::bind(switchboard, &user_id, &config.transport).await?;
        let epoch = Arc::new(AtomicU64::new(0));
        let discovery = DiscoveryFeed::new(
            directory.clone(),
            store.clone(),
            transport.clone(),
            &user_id,
            epoch.clone(),
        );
        let (events, _) = broadcast::channel(256);

        let controller = Self {
            inner: Arc::new(SessionInner {
                user_id: user_id.clone(),
                store,
                directory: directory.clone(),
                transport,
                discovery: discovery.clone(),
                assistant,
                events,
                epoch,
                tasks: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(Vec::new()),
            }),
        };

        controller.wire_transport_events();

        let pulse = tokio::spawn(pulse_loop(
            directory,
            controller.inner.store.clone(),
            user_id.clone(),
            controller.inner.transport.address().to_string(),
            config.presence.pulse_interval(),
        ));
        let refresh = tokio::spawn(refresh_loop(
            discovery,
            config.discovery.refresh_interval(),
        ));
        controller.inner.tasks.lock().unwrap().extend([pulse, refresh]);

        tracing::info!(user = %user_id, "session started");
        Ok(controller)
    }

    /// Tear the session down. Safe to call more than once.
    pub fn logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        for task in self.inner.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        for subscription in self.inner.subscriptions.lock().unwrap().drain(..) {
            subscription.unsubscribe();
        }
        self.inner.transport.shutdown();
        tracing::info!(user = %self.inner.user_id, "session ended");
    }

    fn wire_transport_events(&self) {
        let mut subscriptions = Vec::new();

        subscriptions.push(self.inner.transport.on_message({
            let inner = self.inner.clone();
            move |event| {
                // a first message from a new match implies its direct chat
                if event.chat_id == direct_chat_id(&inner.user_id, &event.message.sender_id) {
                    let chat = Chat::direct(&inner.user_id, &event.message.sender_id);
                    if let Err(e) = inner.store.create_chat_if_absent(chat) {
                        tracing::warn!(error = %e, "chat creation for inbound message failed");
                    }
                }
                match inner.store.save_message(&event.chat_id, event.message.clone()) {
                    Ok(true) => {
                        let _ = inner.events.send(SessionEvent::MessageReceived {
                            chat_id: event.chat_id.clone(),
                            message: event.message.clone(),
                        });
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "inbound message persist failed"),
                }
            }
        }));

        subscriptions.push(self.inner.transport.on_typing({
            let inner = self.inner.clone();
            move |event| {
                if event.user_id == inner.user_id {
                    return;
                }
                let _ = inner.events.send(SessionEvent::TypingChanged {
                    chat_id: event.chat_id.clone(),
                    user_id: event.user_id.clone(),
                    is_typing: event.is_typing,
                });
            }
        }));

        subscriptions.push(self.inner.transport.on_post({
            let inner = self.inner.clone();
            move |event| match inner.store.create_post(event.post.clone()) {
                Ok(true) => {
                    let _ = inner.events.send(SessionEvent::PostReceived {
                        post: event.post.clone(),
                    });
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "inbound post persist failed"),
            }
        }));

        self.inner.subscriptions.lock().unwrap().extend(subscriptions);
    }

    // ── Chats ─────────────────────────────────────────────────────────────

    /// Swipe right / match: create the direct chat and dial the peer.
    /// Swiping left is a pure UI cursor move and has no service-side effect.
    pub fn swipe_right(&self, target: &User) -> Result<String, StoreError> {
        self.open_direct_chat(target)
    }

    /// Start a chat from a profile view or search hit.
    pub fn start_chat(&self, target: &User) -> Result<String, StoreError> {
        self.open_direct_chat(target)
    }

    fn open_direct_chat(&self, target: &User) -> Result<String, StoreError> {
        self.inner.store.cache_peer(target)?;
        let chat = Chat::direct(&self.inner.user_id, &target.id);
        let chat_id = chat.id.clone();
        self.inner.store.create_chat_if_absent(chat)?;
        self.inner.transport.dial(&target.id);
        Ok(chat_id)
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.inner.store.get_chats_for_user(&self.inner.user_id)
    }

    /// Persist our copy of the message, then deliver best-effort. With no
    /// open link the frame is dropped — the local copy is the only record,
    /// and that is the specified at-most-once behavior.
    pub fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        media: Option<(String, MediaType)>,
    ) -> Result<Message, StoreError> {
        let timestamp = now_ms();
        let (media, media_type) = match media {
            Some((url, kind)) => (Some(url), Some(kind)),
            None => (None, None),
        };
        let message = Message {
            id: content_id(&self.inner.user_id, timestamp, text.as_bytes()),
            sender_id: self.inner.user_id.clone(),
            text: text.to_string(),
            media,
            media_type,
            timestamp,
        };

        self.inner.store.save_message(chat_id, message.clone())?;

        if let Some(chat) = self.inner.store.get_chat(chat_id) {
            let frame = WireMessage::Message {
                chat_id: chat_id.to_string(),
                message: message.clone(),
            };
            for peer in chat.participants.iter().filter(|p| **p != self.inner.user_id) {
                if wire::is_synthetic(peer) {
                    self.spawn_persona_reply(chat_id, peer, &chat, &message);
                } else {
                    self.inner.transport.send(peer, &frame);
                }
            }
        }
        Ok(message)
    }

    pub fn set_typing(&self, chat_id: &str, is_typing: bool) {
        let Some(chat) = self.inner.store.get_chat(chat_id) else {
            return;
        };
        let frame = WireMessage::Typing {
            chat_id: chat_id.to_string(),
            user_id: self.inner.user_id.clone(),
            is_typing,
        };
        for peer in chat.participants.iter().filter(|p| **p != self.inner.user_id) {
            self.inner.transport.send(peer, &frame);
        }
    }

    /// A synthetic peer answers through the assistant instead of the wire.
    fn spawn_persona_reply(&self, chat_id: &str, persona_id: &str, chat: &Chat, last: &Message) {
        let inner = self.inner.clone();
        let chat_id = chat_id.to_string();
        let persona_id = persona_id.to_string();
        let history = chat.messages.clone();
        let last_text = last.text.clone();
        tokio::spawn(async move {
            let bio = inner
                .store
                .get_user_by_id(&persona_id)
                .map(|u| u.bio)
                .unwrap_or_default();
            let text = inner
                .assistant
                .chat_reply(&bio, &history, &last_text)
                .await
                .unwrap_or_else(|_| "Hey there!".to_string());
            let timestamp = now_ms();
            let reply = Message {
                id: content_id(&persona_id, timestamp, text.as_bytes()),
                sender_id: persona_id.clone(),
                text,
                media: None,
                media_type: None,
                timestamp,
            };
            match inner.store.save_message(&chat_id, reply.clone()) {
                Ok(true) => {
                    let _ = inner.events.send(SessionEvent::MessageReceived {
                        chat_id,
                        message: reply,
                    });
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "persona reply persist failed"),
            }
        });
    }

    // ── Feed ──────────────────────────────────────────────────────────────

    /// Create a post locally, publish it to the shared feed, and broadcast
    /// it to open links on first publication.
    pub async fn publish_post(
        &self,
        media: Vec<String>,
        is_video: Vec<bool>,
    ) -> Result<Post, StoreError> {
        let timestamp = now_ms();
        let post = Post {
            id: content_id(&self.inner.user_id, timestamp, media.join(",").as_bytes()),
            user_id: self.inner.user_id.clone(),
            media,
            is_video,
            likes: Vec::new(),
            comments: Vec::new(),
            timestamp,
        };

        self.inner.store.create_post(post.clone())?;

        match self.inner.directory.publish_post(post.clone()).await {
            Ok(true) => self
                .inner
                .transport
                .broadcast(&WireMessage::Post { post: post.clone() }),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "feed publication failed; post remains local")
            }
        }
        Ok(post)
    }

    /// The merged feed: remote posts cached locally, newest first.
    pub async fn feed(&self) -> Vec<Post> {
        for post in self.inner.directory.fetch_feed().await {
            if let Err(e) = self.inner.store.create_post(post) {
                tracing::warn!(error = %e, "feed cache write failed");
            }
        }
        let mut posts = self.inner.store.get_all_posts();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        posts
    }

    pub fn like_post(&self, post_id: &str) -> Result<bool, StoreError> {
        self.inner.store.like_post(post_id, &self.inner.user_id)
    }

    pub fn comment_on_post(&self, post_id: &str, text: &str) -> Result<(), StoreError> {
        let timestamp = now_ms();
        let user_name = self
            .inner
            .store
            .get_user_by_id(&self.inner.user_id)
            .map(|u| u.name)
            .unwrap_or_else(|| self.inner.user_id.clone());
        let comment = Comment {
            id: content_id(&self.inner.user_id, timestamp, text.as_bytes()),
            user_id: self.inner.user_id.clone(),
            user_name,
            text: text.to_string(),
            timestamp,
        };
        self.inner.store.comment_on_post(post_id, comment)
    }

    // ── Discovery ─────────────────────────────────────────────────────────

    pub async fn discovery_candidates(&self) -> Vec<PeerIdentity> {
        self.inner.discovery.refresh().await
    }

    pub async fn search(&self, raw: &str) -> SearchOutcome {
        self.inner.discovery.search(raw).await
    }

    // ── Profile / assistant ───────────────────────────────────────────────

    pub fn update_profile(&self, user: &User) -> Result<(), StoreError> {
        // the next pulse carries the edit into the registry
        self.inner.store.update_profile(user)
    }

    pub async fn rewrite_bio(&self, bio: &str) -> String {
        self.inner
            .assistant
            .rewrite_bio(bio)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "bio rewrite unavailable, keeping original");
                bio.to_string()
            })
    }

    pub async fn suggest_icebreaker(&self, name: &str) -> String {
        self.inner
            .assistant
            .suggest_icebreaker(name)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "icebreaker unavailable, using fallback");
                "Hey! How's your night going?".to_string()
            })
    }

    // ── Snapshots / introspection ─────────────────────────────────────────

    pub fn export_snapshot(&self) -> String {
        self.inner.store.export_snapshot()
    }

    pub fn import_snapshot(&self, snapshot: &str) -> bool {
        self.inner.store.import_snapshot(snapshot)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn address(&self) -> &str {
        self.inner.transport.address()
    }

    pub fn is_degraded(&self) -> bool {
        self.inner.transport.is_degraded()
    }

    pub fn links(&self) -> Vec<LinkInfo> {
        self.inner.transport.links()
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }
}
