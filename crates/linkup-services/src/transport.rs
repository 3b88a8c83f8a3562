//! Direct peer links — dialing, the per-link state machine, and inbound
//! dispatch.
//!
//! One transport per session. Links are keyed by peer account id, at most
//! one live link per peer. The state machine is linear:
//!
//!   Dialing → Open → Closed
//!
//! A closed link is removed from the table immediately; a new dial creates
//! a fresh link — there is no resurrection and no retry state. Delivery is
//! at-most-once: `send` without an open link drops the frame, observably,
//! and nothing is queued for later.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkup_core::config::TransportConfig;
use linkup_core::types::{Message, Post};
use linkup_core::wire::{self, WireMessage};

use crate::switchboard::{Channel, ChannelSender, Claim, Switchboard, SwitchboardError};

// ── Events ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub chat_id: String,
    pub message: Message,
}

#[derive(Debug, Clone)]
pub struct TypingEvent {
    pub chat_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone)]
pub struct PostEvent {
    pub post: Post,
}

/// Ordered multi-subscriber handler list. Handlers run synchronously, in
/// registration order, on the link reader task that received the frame.
struct HandlerList<T> {
    handlers: Arc<Mutex<Vec<(u64, Box<dyn Fn(&T) + Send + Sync>)>>>,
    next_id: AtomicU64,
}

impl<T> Default for HandlerList<T> {
    fn default() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T: 'static> HandlerList<T> {
    fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().push((id, Box::new(handler)));

        let handlers = Arc::downgrade(&self.handlers);
        Subscription {
            cancel: Box::new(move || {
                if let Some(handlers) = handlers.upgrade() {
                    handlers.lock().unwrap().retain(|(hid, _)| *hid != id);
                }
            }),
        }
    }

    fn emit(&self, event: &T) {
        let handlers = self.handlers.lock().unwrap();
        for (_, handler) in handlers.iter() {
            handler(event);
        }
    }
}

/// Handle returned by event registration. Dropping it does nothing;
/// call [`Subscription::unsubscribe`] to remove the handler.
pub struct Subscription {
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

// ── Links ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Dialing,
    Open,
    Closed,
}

struct Link {
    /// Monotonic per-transport serial; guards against a stale reader task
    /// removing a link that has since been replaced.
    serial: u64,
    state: LinkState,
    sender: Option<ChannelSender>,
    reader: Option<tokio::task::JoinHandle<()>>,
}

/// Snapshot of one link, for status surfaces.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub peer_id: String,
    pub state: LinkState,
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// The transport for one session. Cheap to clone.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    address: String,
    degraded: bool,
    switchboard: Arc<dyn Switchboard>,
    dial_timeout: Duration,
    links: DashMap<String, Link>,
    next_serial: AtomicU64,
    acceptor: Mutex<Option<tokio::task::JoinHandle<()>>>,
    on_message: HandlerList<MessageEvent>,
    on_typing: HandlerList<TypingEvent>,
    on_post: HandlerList<PostEvent>,
}

impl Transport {
    /// Claim our transport address and start accepting inbound links.
    ///
    /// When the canonical address is held by another live session of the
    /// same account (a second tab), fall back to a suffixed address. The
    /// fallback session can dial out but is not reachable at the canonical
    /// address — reported via [`Transport::is_degraded`], never hidden.
    pub async fn bind(
        switchboard: Arc<dyn Switchboard>,
        self_id: &str,
        config: &TransportConfig,
    ) -> Result<Self, SwitchboardError> {
        let canonical = wire::transport_address(self_id);
        let (claim, degraded) = match switchboard.claim(&canonical).await {
            Ok(claim) => (claim, false),
            Err(SwitchboardError::AddressTaken(_)) => {
                (Self::claim_fallback(&switchboard, self_id, &canonical).await?, true)
            }
            Err(e) => return Err(e),
        };

        if degraded {
            tracing::warn!(
                account = self_id,
                address = %claim.address,
                "canonical address in use by another session; running degraded on fallback address"
            );
        }

        let transport = Self {
            inner: Arc::new(TransportInner {
                address: claim.address.clone(),
                degraded,
                switchboard,
                dial_timeout: config.dial_timeout(),
                links: DashMap::new(),
                next_serial: AtomicU64::new(0),
                acceptor: Mutex::new(None),
                on_message: HandlerList::default(),
                on_typing: HandlerList::default(),
                on_post: HandlerList::default(),
            }),
        };
        transport.spawn_acceptor(claim.incoming);

        tracing::info!(address = %transport.inner.address, "transport bound");
        Ok(transport)
    }

    async fn claim_fallback(
        switchboard: &Arc<dyn Switchboard>,
        self_id: &str,
        canonical: &str,
    ) -> Result<Claim, SwitchboardError> {
        for n in 1..=4 {
            match switchboard.claim(&wire::alt_address(self_id, n)).await {
                Ok(claim) => return Ok(claim),
                Err(SwitchboardError::AddressTaken(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SwitchboardError::AddressTaken(canonical.to_string()))
    }

    /// The address this session is actually reachable at.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// True when bound to a fallback address instead of the canonical one.
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded
    }

    // ── Dialing ───────────────────────────────────────────────────────────

    /// Open a link to a peer. No-op when a live link (open or in-flight)
    /// already exists, or when the peer is synthetic. Never blocks — the
    /// handshake completes on a background task under the dial timeout.
    pub fn dial(&self, peer_id: &str) {
        if wire::is_synthetic(peer_id) {
            tracing::trace!(peer = peer_id, "synthetic peer is not dialable");
            return;
        }

        use dashmap::mapref::entry::Entry;
        let serial = self.inner.next_serial.fetch_add(1, Ordering::SeqCst);
        match self.inner.links.entry(peer_id.to_string()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(vacant) => {
                vacant.insert(Link {
                    serial,
                    state: LinkState::Dialing,
                    sender: None,
                    reader: None,
                });
            }
        }

        let inner = self.inner.clone();
        let peer = peer_id.to_string();
        tokio::spawn(async move {
            let remote = wire::transport_address(&peer);
            let dialed = tokio::time::timeout(
                inner.dial_timeout,
                inner.switchboard.dial(&inner.address, &remote),
            )
            .await;

            match dialed {
                Ok(Ok(channel)) => {
                    TransportInner::install_link(&inner, &peer, serial, channel);
                    tracing::debug!(peer, "link open (outbound)");
                }
                Ok(Err(e)) => {
                    tracing::debug!(peer, error = %e, "dial failed");
                    TransportInner::remove_link(&inner, &peer, serial);
                }
                Err(_) => {
                    tracing::debug!(peer, "dial timed out");
                    TransportInner::remove_link(&inner, &peer, serial);
                }
            }
        });
    }

    fn spawn_acceptor(&self, mut incoming: tokio::sync::mpsc::Receiver<Channel>) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            while let Some(channel) = incoming.recv().await {
                let Some(peer) = wire::peer_id_from_address(&channel.remote_address) else {
                    tracing::debug!(address = %channel.remote_address, "inbound channel with foreign address, dropping");
                    continue;
                };
                let peer = peer.to_string();
                let serial = inner.next_serial.fetch_add(1, Ordering::SeqCst);
                // Last one wins: an inbound link replaces whatever we had,
                // same as accepting a fresh connection from a reconnecting
                // peer.
                TransportInner::install_link(&inner, &peer, serial, channel);
                tracing::debug!(peer, "link open (inbound)");
            }
        });
        *self.inner.acceptor.lock().unwrap() = Some(handle);
    }

    // ── Sending ───────────────────────────────────────────────────────────

    /// Best-effort, at-most-once send. Drops the frame (with a debug log)
    /// unless an open link to the peer exists.
    pub fn send(&self, peer_id: &str, message: &WireMessage) {
        let Some(link) = self.inner.links.get(peer_id) else {
            tracing::debug!(peer = peer_id, "no link, frame dropped");
            return;
        };
        match (link.state, &link.sender) {
            (LinkState::Open, Some(sender)) => {
                if !sender.try_send(Bytes::from(message.encode())) {
                    tracing::debug!(peer = peer_id, "link saturated or closing, frame dropped");
                }
            }
            _ => tracing::debug!(peer = peer_id, "link not open, frame dropped"),
        }
    }

    /// Send a frame to every open link.
    pub fn broadcast(&self, message: &WireMessage) {
        let payload = Bytes::from(message.encode());
        for link in self.inner.links.iter() {
            if link.state == LinkState::Open {
                if let Some(sender) = &link.sender {
                    let _ = sender.try_send(payload.clone());
                }
            }
        }
    }

    // ── Events ────────────────────────────────────────────────────────────

    pub fn on_message(&self, handler: impl Fn(&MessageEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.on_message.subscribe(handler)
    }

    pub fn on_typing(&self, handler: impl Fn(&TypingEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.on_typing.subscribe(handler)
    }

    pub fn on_post(&self, handler: impl Fn(&PostEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.on_post.subscribe(handler)
    }

    // ── Introspection / teardown ──────────────────────────────────────────

    pub fn links(&self) -> Vec<LinkInfo> {
        self.inner
            .links
            .iter()
            .map(|entry| LinkInfo {
                peer_id: entry.key().clone(),
                state: entry.value().state,
            })
            .collect()
    }

    pub fn link_state(&self, peer_id: &str) -> Option<LinkState> {
        self.inner.links.get(peer_id).map(|l| l.state)
    }

    /// Tear down every link. Used by session teardown.
    pub fn close_all(&self) {
        let peers: Vec<String> = self.inner.links.iter().map(|e| e.key().clone()).collect();
        for peer in peers {
            if let Some((_, link)) = self.inner.links.remove(&peer) {
                if let Some(reader) = link.reader {
                    reader.abort();
                }
            }
        }
    }

    /// Full teardown: close every link and release the address claim so a
    /// later login of the same account binds canonically again.
    pub fn shutdown(&self) {
        if let Some(acceptor) = self.inner.acceptor.lock().unwrap().take() {
            acceptor.abort();
        }
        self.close_all();
    }
}

impl TransportInner {
    /// Transition a link to Open and start its reader task.
    fn install_link(inner: &Arc<TransportInner>, peer: &str, serial: u64, channel: Channel) {
        let (sender, mut receiver) = channel.split();

        let reader = {
            let inner = inner.clone();
            let peer = peer.to_string();
            tokio::spawn(async move {
                while let Some(bytes) = receiver.recv().await {
                    match WireMessage::decode(&bytes) {
                        Some(WireMessage::Message { chat_id, message }) => {
                            inner.on_message.emit(&MessageEvent { chat_id, message });
                        }
                        Some(WireMessage::Typing {
                            chat_id,
                            user_id,
                            is_typing,
                        }) => {
                            inner.on_typing.emit(&TypingEvent {
                                chat_id,
                                user_id,
                                is_typing,
                            });
                        }
                        Some(WireMessage::Post { post }) => {
                            inner.on_post.emit(&PostEvent { post });
                        }
                        None => tracing::trace!(peer, "undecodable frame ignored"),
                    }
                }
                // channel ended: Open → Closed, link leaves the table
                TransportInner::remove_link(&inner, &peer, serial);
                tracing::debug!(peer, "link closed");
            })
        };

        let replaced = inner.links.insert(
            peer.to_string(),
            Link {
                serial,
                state: LinkState::Open,
                sender: Some(sender),
                reader: Some(reader),
            },
        );
        if let Some(old) = replaced {
            if let Some(old_reader) = old.reader {
                old_reader.abort();
            }
        }
    }

    /// Remove a link, but only if it is still the one `serial` refers to.
    fn remove_link(inner: &Arc<TransportInner>, peer: &str, serial: u64) {
        inner.links.remove_if(peer, |_, link| link.serial == serial);
    }
}
