//! linkup-relay — address-claim and forwarding relay.
//!
//! The deployable stand-in for the external peer-connection service. Each
//! client holds one TCP connection, claims exactly one transport address,
//! and frames are routed between claimed addresses. Payloads are opaque —
//! the relay never inspects them.
//!
//! Usage: linkup-relay [--port 9300]

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use linkup_services::relay::Frame;

/// Claimed addresses → the claimant's outbound frame queue.
type Registry = Arc<DashMap<String, mpsc::UnboundedSender<Frame>>>;

/// Open links, tracked from both ends: address → partner addresses.
/// Needed so a vanished client's links are closed toward its partners.
type Links = Arc<DashMap<String, Vec<String>>>;

const DEFAULT_PORT: u16 = 9300;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = parse_port(&std::env::args().skip(1).collect::<Vec<_>>())?;
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind relay port {port}"))?;
    tracing::info!(port, "relay listening");

    run(listener, Arc::new(DashMap::new()), Arc::new(DashMap::new())).await
}

fn parse_port(args: &[String]) -> Result<u16> {
    let mut port = DEFAULT_PORT;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        }
        i += 1;
    }
    Ok(port)
}

async fn run(listener: TcpListener, registry: Registry, links: Links) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await.context("accept failed")?;
        tracing::debug!(client = %addr, "connection accepted");
        let registry = registry.clone();
        let links = links.clone();
        tokio::spawn(async move {
            handle_client(stream, registry, links).await;
        });
    }
}

fn link_up(links: &Links, a: &str, b: &str) {
    for (from, to) in [(a, b), (b, a)] {
        let mut partners = links.entry(from.to_string()).or_default();
        if !partners.iter().any(|p| p == to) {
            partners.push(to.to_string());
        }
    }
}

fn link_down(links: &Links, a: &str, b: &str) {
    for (from, to) in [(a, b), (b, a)] {
        if let Some(mut partners) = links.get_mut(from) {
            partners.retain(|p| p != to);
        }
    }
}

async fn handle_client(stream: TcpStream, registry: Registry, links: Links) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write_half
                .write_all(frame.encode_line().as_bytes())
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // one claimed address per connection, set by the first Claim frame
    let mut claimed: Option<String> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(frame) = Frame::decode_line(&line) else {
            tracing::trace!("undecodable frame ignored");
            continue;
        };

        let bound = claimed.clone();
        match (frame, bound.as_deref()) {
            (Frame::Claim { address }, None) => {
                use dashmap::mapref::entry::Entry;
                let granted = match registry.entry(address.clone()) {
                    Entry::Occupied(mut occupied) => {
                        if occupied.get().is_closed() {
                            occupied.insert(tx.clone());
                            true
                        } else {
                            false
                        }
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(tx.clone());
                        true
                    }
                };
                if granted {
                    tracing::info!(address, "address claimed");
                    claimed = Some(address.clone());
                    let _ = tx.send(Frame::Granted { address });
                } else {
                    tracing::debug!(address, "claim denied, address is live");
                    let _ = tx.send(Frame::Taken { address });
                }
            }

            (Frame::Dial { to }, Some(from)) => {
                let reachable = registry
                    .get(&to)
                    .map(|dest| dest.send(Frame::Opened { peer: from.to_string() }).is_ok())
                    .unwrap_or(false);
                if reachable {
                    link_up(&links, from, &to);
                    let _ = tx.send(Frame::Opened { peer: to });
                } else {
                    let _ = tx.send(Frame::Unreachable { peer: to });
                }
            }

            (Frame::Data { peer, payload }, Some(from)) => {
                if let Some(dest) = registry.get(&peer) {
                    let _ = dest.send(Frame::Data {
                        peer: from.to_string(),
                        payload,
                    });
                }
            }

            (Frame::Closed { peer }, Some(from)) => {
                link_down(&links, from, &peer);
                if let Some(dest) = registry.get(&peer) {
                    let _ = dest.send(Frame::Closed { peer: from.to_string() });
                }
            }

            // anything else: a client speaking out of turn; ignore it
            _ => tracing::trace!("frame out of protocol order ignored"),
        }
    }

    // connection gone: release the claim and close links from our side
    if let Some(address) = claimed {
        registry.remove_if(&address, |_, sender| sender.same_channel(&tx));
        let partners = links.remove(&address).map(|(_, p)| p).unwrap_or_default();
        for peer in partners {
            link_down(&links, &address, &peer);
            if let Some(dest) = registry.get(&peer) {
                let _ = dest.send(Frame::Closed { peer: address.clone() });
            }
        }
        tracing::info!(address, "address released");
    }
    writer.abort();
}
