//! Relay switchboard — peer connections brokered by `linkup-relay`.
//!
//! The relay is the deployable stand-in for the external peer-connection
//! service: every client holds one TCP connection to it, claims its
//! transport address, and exchanges newline-delimited JSON frames. The
//! relay only routes by claimed address; it never looks inside payloads
//! (they travel hex-encoded and opaque).

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};

use async_trait::async_trait;

use crate::switchboard::{Channel, Claim, Switchboard, SwitchboardError};

/// One frame on the client↔relay connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Frame {
    /// Client → relay: bind this address. First frame on every connection.
    Claim { address: String },
    /// Relay → client: claim granted.
    Granted { address: String },
    /// Relay → client: claim denied, address is live elsewhere.
    Taken { address: String },
    /// Client → relay: open a logical link to a claimed address.
    Dial { to: String },
    /// Relay → client: a link to/from `peer` is open. Sent to both ends.
    Opened { peer: String },
    /// Relay → client: dial failed, nobody holds that address.
    Unreachable { peer: String },
    /// Either direction: one payload on an open link, hex-encoded.
    Data { peer: String, payload: String },
    /// Either direction: a link ended.
    Closed { peer: String },
}

impl Frame {
    pub fn encode_line(&self) -> String {
        let mut line = serde_json::to_string(self).expect("frame serialization cannot fail");
        line.push('\n');
        line
    }

    pub fn decode_line(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }
}

const LINK_DEPTH: usize = 64;

/// Switchboard implementation backed by a running relay.
pub struct RelaySwitchboard {
    relay_addr: String,
    connect_timeout: Duration,
    conn: Mutex<Option<Arc<RelayConn>>>,
}

struct RelayConn {
    writer_tx: mpsc::UnboundedSender<Frame>,
    /// Open links: peer address → inbound payload queue.
    links: DashMap<String, mpsc::Sender<Bytes>>,
    /// Dials awaiting an Opened/Unreachable verdict, by peer address.
    pending: DashMap<String, oneshot::Sender<Result<Channel, SwitchboardError>>>,
}

impl RelaySwitchboard {
    pub fn new(relay_addr: &str, connect_timeout: Duration) -> Self {
        Self {
            relay_addr: relay_addr.to_string(),
            connect_timeout,
            conn: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Switchboard for RelaySwitchboard {
    async fn claim(&self, address: &str) -> Result<Claim, SwitchboardError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.relay_addr))
            .await
            .map_err(|_| SwitchboardError::Unavailable(format!("relay {} timed out", self.relay_addr)))?
            .map_err(|e| SwitchboardError::Unavailable(e.to_string()))?;

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // claim handshake happens inline, before the reader task exists
        write_half
            .write_all(Frame::Claim { address: address.to_string() }.encode_line().as_bytes())
            .await
            .map_err(|e| SwitchboardError::Unavailable(e.to_string()))?;

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| SwitchboardError::Unavailable(e.to_string()))?
                .ok_or_else(|| SwitchboardError::Unavailable("relay closed the connection".to_string()))?;
            match Frame::decode_line(&line) {
                Some(Frame::Granted { .. }) => break,
                Some(Frame::Taken { address }) => {
                    return Err(SwitchboardError::AddressTaken(address))
                }
                Some(_) | None => continue,
            }
        }

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Frame>();
        let (incoming_tx, incoming_rx) = mpsc::channel(LINK_DEPTH);

        let conn = Arc::new(RelayConn {
            writer_tx,
            links: DashMap::new(),
            pending: DashMap::new(),
        });

        // writer task: serialize frames onto the socket
        tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                if write_half
                    .write_all(frame.encode_line().as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // reader task: demultiplex relay frames onto links
        {
            let conn = conn.clone();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    let Some(frame) = Frame::decode_line(&line) else {
                        continue;
                    };
                    match frame {
                        Frame::Opened { peer } => {
                            let channel = conn.open_link(&peer);
                            if let Some((_, verdict)) = conn.pending.remove(&peer) {
                                let _ = verdict.send(Ok(channel));
                            } else {
                                let _ = incoming_tx.send(channel).await;
                            }
                        }
                        Frame::Unreachable { peer } => {
                            if let Some((_, verdict)) = conn.pending.remove(&peer) {
                                let _ = verdict.send(Err(SwitchboardError::Unreachable(peer)));
                            }
                        }
                        Frame::Data { peer, payload } => {
                            if let Some(link) = conn.links.get(&peer) {
                                if let Ok(bytes) = hex::decode(&payload) {
                                    let _ = link.try_send(Bytes::from(bytes));
                                }
                            }
                        }
                        Frame::Closed { peer } => {
                            conn.links.remove(&peer);
                        }
                        _ => {}
                    }
                }
                // relay gone: dropping the link senders closes every channel
                conn.links.clear();
                tracing::warn!("relay connection lost");
            });
        }

        *self.conn.lock().await = Some(conn);
        Ok(Claim {
            address: address.to_string(),
            incoming: incoming_rx,
        })
    }

    async fn dial(
        &self,
        _local_address: &str,
        remote_address: &str,
    ) -> Result<Channel, SwitchboardError> {
        let conn = self
            .conn
            .lock()
            .await
            .clone()
            .ok_or_else(|| SwitchboardError::Unavailable("claim an address first".to_string()))?;

        let (verdict_tx, verdict_rx) = oneshot::channel();
        conn.pending.insert(remote_address.to_string(), verdict_tx);
        if conn
            .writer_tx
            .send(Frame::Dial { to: remote_address.to_string() })
            .is_err()
        {
            conn.pending.remove(remote_address);
            return Err(SwitchboardError::Unavailable("relay connection lost".to_string()));
        }

        verdict_rx
            .await
            .map_err(|_| SwitchboardError::Unavailable("relay connection lost".to_string()))?
    }
}

impl RelayConn {
    /// Register a link for `peer` and build the transport-facing channel.
    fn open_link(self: &Arc<Self>, peer: &str) -> Channel {
        let (in_tx, in_rx) = mpsc::channel(LINK_DEPTH);
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(LINK_DEPTH);
        self.links.insert(peer.to_string(), in_tx);

        // per-link forwarder: transport payloads become Data frames
        let conn = self.clone();
        let peer_owned = peer.to_string();
        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                let frame = Frame::Data {
                    peer: peer_owned.clone(),
                    payload: hex::encode(&bytes),
                };
                if conn.writer_tx.send(frame).is_err() {
                    break;
                }
            }
            let _ = conn.writer_tx.send(Frame::Closed { peer: peer_owned.clone() });
            conn.links.remove(&peer_owned);
        });

        Channel::from_parts(peer.to_string(), out_tx, in_rx)
    }
}
