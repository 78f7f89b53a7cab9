//! Peers and the peer registry
//!
//! A `Peer` is the outbound half of one TCP connection. The write half sits
//! behind a mutex so frames from different tasks never interleave on the
//! wire. The registry guards membership and sending with a single lock;
//! peers whose sends fail are closed and evicted under that same lock.

use crate::protocol::{write_frame, Message};
use crate::{NetworkError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One connected peer, addressed by its remote `ip:port` string
pub struct Peer {
    addr: String,
    writer: Mutex<OwnedWriteHalf>,
}

impl Peer {
    pub fn new(addr: String, writer: OwnedWriteHalf) -> Self {
        Self {
            addr,
            writer: Mutex::new(writer),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Serialize and send one frame; the per-connection mutex keeps the
    /// encoder exclusive
    pub async fn send(&self, message: &Message) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, message).await
    }

    /// Half-close the connection; the peer's reader will observe EOF
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// All live connections, keyed by remote address
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<String, Arc<Peer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, peer: Arc<Peer>) {
        let mut peers = self.peers.lock().await;
        peers.insert(peer.addr().to_string(), peer);
    }

    pub async fn remove(&self, addr: &str) {
        let mut peers = self.peers.lock().await;
        if let Some(peer) = peers.remove(addr) {
            peer.close().await;
            debug!(peer = addr, "peer removed");
        }
    }

    pub async fn contains(&self, addr: &str) -> bool {
        self.peers.lock().await.contains_key(addr)
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }

    pub async fn addrs(&self) -> Vec<String> {
        self.peers.lock().await.keys().cloned().collect()
    }

    /// Send to one peer, evicting it when the send fails
    pub async fn send_to(&self, addr: &str, message: &Message) -> Result<()> {
        let mut peers = self.peers.lock().await;
        let peer = peers
            .get(addr)
            .cloned()
            .ok_or_else(|| NetworkError::PeerNotFound(addr.to_string()))?;
        if let Err(e) = peer.send(message).await {
            warn!(peer = addr, error = %e, "send failed, evicting peer");
            peers.remove(addr);
            peer.close().await;
            return Err(e);
        }
        Ok(())
    }

    /// Fan a message out to every peer
    pub async fn broadcast(&self, message: &Message) {
        self.broadcast_except(None, message).await;
    }

    /// Fan out to every peer except the message's source, evicting any peer
    /// whose send errors while the registry lock is held
    pub async fn broadcast_except(&self, except: Option<&str>, message: &Message) {
        let mut peers = self.peers.lock().await;
        let mut failed = Vec::new();
        for (addr, peer) in peers.iter() {
            if Some(addr.as_str()) == except {
                continue;
            }
            if let Err(e) = peer.send(message).await {
                warn!(peer = %addr, error = %e, "send failed, evicting peer");
                failed.push(addr.clone());
            }
        }
        for addr in failed {
            if let Some(peer) = peers.remove(&addr) {
                peer.close().await;
            }
        }
    }
}
