//! Switchboard — the seam to the external peer-connection service.
//!
//! A switchboard knows two verbs: `claim` an address so peers can reach
//! you, and `dial` a remote address to get a channel. Negotiation and
//! handshake details live behind this trait; the transport layer only sees
//! ordered, opaque byte payloads per channel.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    #[error("address already claimed: {0}")]
    AddressTaken(String),
    #[error("no peer listening at {0}")]
    Unreachable(String),
    #[error("switchboard unavailable: {0}")]
    Unavailable(String),
}

const CHANNEL_DEPTH: usize = 64;

/// One end of an established channel. Payloads arrive in the order they
/// were sent; the stream ending means the other side is gone.
#[derive(Debug)]
pub struct Channel {
    /// Address of the other end.
    pub remote_address: String,
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

impl Channel {
    /// Build a connected pair: what one half sends, the other receives.
    pub fn pair(a_address: &str, b_address: &str) -> (Channel, Channel) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (b_to_a_tx, b_to_a_rx) = mpsc::channel(CHANNEL_DEPTH);
        let a = Channel {
            remote_address: b_address.to_string(),
            tx: a_to_b_tx,
            rx: b_to_a_rx,
        };
        let b = Channel {
            remote_address: a_address.to_string(),
            tx: b_to_a_tx,
            rx: a_to_b_rx,
        };
        (a, b)
    }

    pub(crate) fn from_parts(
        remote_address: String,
        tx: mpsc::Sender<Bytes>,
        rx: mpsc::Receiver<Bytes>,
    ) -> Self {
        Self {
            remote_address,
            tx,
            rx,
        }
    }

    /// Split into independently owned halves.
    pub fn split(self) -> (ChannelSender, ChannelReceiver) {
        (
            ChannelSender {
                remote_address: self.remote_address,
                tx: self.tx,
            },
            ChannelReceiver { rx: self.rx },
        )
    }
}

/// Sending half of a channel.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    pub remote_address: String,
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSender {
    /// Non-blocking send. Returns false when the channel is closed or full
    /// — the caller drops the payload either way.
    pub fn try_send(&self, payload: Bytes) -> bool {
        self.tx.try_send(payload).is_ok()
    }
}

/// Receiving half of a channel.
#[derive(Debug)]
pub struct ChannelReceiver {
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelReceiver {
    /// Next payload, or `None` once the other side is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// A granted claim: the address actually bound (the requested one) plus
/// the stream of inbound channels from peers dialing it.
#[derive(Debug)]
pub struct Claim {
    pub address: String,
    pub incoming: mpsc::Receiver<Channel>,
}

/// The peer-connection service seam.
#[async_trait]
pub trait Switchboard: Send + Sync {
    /// Bind an address. Fails with [`SwitchboardError::AddressTaken`] when a
    /// live claimant already holds it.
    async fn claim(&self, address: &str) -> Result<Claim, SwitchboardError>;

    /// Open a channel to a claimed remote address.
    async fn dial(&self, local_address: &str, remote_address: &str)
        -> Result<Channel, SwitchboardError>;
}

// ── In-process implementation ─────────────────────────────────────────────────

/// In-process switchboard: a shared map from claimed address to the
/// claimant's inbound queue. Used by tests and single-process swarms.
#[derive(Clone, Default)]
pub struct LocalSwitchboard {
    lines: Arc<DashMap<String, mpsc::Sender<Channel>>>,
}

impl LocalSwitchboard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Switchboard for LocalSwitchboard {
    async fn claim(&self, address: &str) -> Result<Claim, SwitchboardError> {
        use dashmap::mapref::entry::Entry;

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        match self.lines.entry(address.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_closed() {
                    return Err(SwitchboardError::AddressTaken(address.to_string()));
                }
                // previous claimant went away without an explicit release
                occupied.insert(tx);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(tx);
            }
        }
        Ok(Claim {
            address: address.to_string(),
            incoming: rx,
        })
    }

    async fn dial(
        &self,
        local_address: &str,
        remote_address: &str,
    ) -> Result<Channel, SwitchboardError> {
        let line = self
            .lines
            .get(remote_address)
            .ok_or_else(|| SwitchboardError::Unreachable(remote_address.to_string()))?
            .clone();

        let (caller, callee) = Channel::pair(local_address, remote_address);
        line.send(callee)
            .await
            .map_err(|_| SwitchboardError::Unreachable(remote_address.to_string()))?;
        Ok(caller)
    }
}
