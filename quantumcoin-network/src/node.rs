//! Gossip node
//!
//! Owns the listener, the dialer and the per-message dispatch. All chain
//! mutations funnel through the shared `RwLock<Blockchain>`; gossip
//! rejections are logged and dropped without evicting the peer, while
//! transport and protocol failures close the connection.

use crate::peer::{Peer, PeerRegistry};
use crate::protocol::{read_frame, Message, MessageKind};
use crate::{NetworkError, Result};
use quantumcoin_core::{Block, Blockchain, Transaction};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub struct Node {
    chain: Arc<RwLock<Blockchain>>,
    peers: PeerRegistry,
    listen_addr: Mutex<Option<SocketAddr>>,
}

impl Node {
    pub fn new(chain: Arc<RwLock<Blockchain>>) -> Arc<Self> {
        Arc::new(Self {
            chain,
            peers: PeerRegistry::new(),
            listen_addr: Mutex::new(None),
        })
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Bind the listener and start accepting inbound peers. A listener
    /// that is already running is left alone and its address returned.
    pub async fn start_listener(self: &Arc<Self>, port: u16) -> Result<SocketAddr> {
        let mut guard = self.listen_addr.lock().await;
        if let Some(addr) = *guard {
            return Ok(addr);
        }
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let local_addr = listener.local_addr()?;
        *guard = Some(local_addr);
        drop(guard);
        info!(addr = %local_addr, "p2p listener started");

        let node = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!(peer = %addr, "inbound connection");
                        node.register_connection(stream, addr.to_string()).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        });
        Ok(local_addr)
    }

    /// Dial a remote node, register it and ask for its chain
    pub async fn connect_to_peer(self: &Arc<Self>, remote: &str) -> Result<()> {
        let stream = TcpStream::connect(remote).await?;
        let addr = stream.peer_addr()?.to_string();
        self.register_connection(stream, addr.clone()).await;
        self.peers.send_to(&addr, &Message::request()).await?;
        info!(peer = %addr, "connected to peer");
        Ok(())
    }

    async fn register_connection(self: &Arc<Self>, stream: TcpStream, addr: String) {
        let (read_half, write_half) = stream.into_split();
        let peer = Arc::new(Peer::new(addr.clone(), write_half));
        self.peers.add(peer).await;

        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.read_loop(read_half, addr).await;
        });
    }

    /// Per-connection reader: frames are dispatched until the transport or
    /// the codec fails, at which point the peer is evicted
    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf, addr: String) {
        loop {
            match read_frame(&mut reader).await {
                Ok(message) => self.dispatch(message, &addr).await,
                Err(NetworkError::ConnectionClosed) => {
                    debug!(peer = %addr, "connection closed");
                    break;
                }
                Err(e) => {
                    warn!(peer = %addr, error = %e, "dropping connection");
                    break;
                }
            }
        }
        self.peers.remove(&addr).await;
    }

    async fn dispatch(&self, message: Message, src: &str) {
        match message.kind {
            MessageKind::Block => self.handle_block(message, src).await,
            MessageKind::Tx => self.handle_tx(message, src).await,
            MessageKind::Chain => self.handle_chain(message, src).await,
            MessageKind::Request => self.handle_request(src).await,
            MessageKind::Ping => {
                let _ = self.peers.send_to(src, &Message::pong()).await;
            }
            MessageKind::Pong => {
                debug!(peer = %src, "pong");
            }
            MessageKind::PeerList => match message.decode_peer_list() {
                Ok(list) => debug!(peer = %src, count = list.len(), "peer list received"),
                Err(e) => warn!(peer = %src, error = %e, "bad peer list"),
            },
            MessageKind::Error => {
                let text = message.decode_error().unwrap_or_else(|_| "<garbled>".to_string());
                warn!(peer = %src, "peer reported error: {text}");
            }
        }
    }

    async fn handle_block(&self, message: Message, src: &str) {
        let block = match message.decode_block() {
            Ok(block) => block,
            Err(e) => {
                warn!(peer = %src, error = %e, "undecodable block");
                return;
            }
        };
        let height = block.index;
        let result = {
            let mut chain = self.chain.write().await;
            chain.add_block_from_peer(block)
        };
        match result {
            Ok(()) => {
                info!(peer = %src, height, "applied block from peer");
                self.peers.broadcast_except(Some(src), &message).await;
            }
            Err(e) => {
                debug!(peer = %src, height, error = %e, "rejected peer block");
            }
        }
    }

    async fn handle_tx(&self, message: Message, src: &str) {
        let tx = match message.decode_tx() {
            Ok(tx) => tx,
            Err(e) => {
                warn!(peer = %src, error = %e, "undecodable transaction");
                return;
            }
        };
        if !tx.verify() {
            warn!(peer = %src, "invalid transaction from peer");
            return;
        }
        // admission is this node's local decision; only a transaction that
        // is new to us is worth relaying, which also keeps gossip cycles
        // from echoing the same transaction forever
        let admitted = {
            let mut chain = self.chain.write().await;
            chain.add_transaction(tx).is_ok()
        };
        if admitted {
            self.peers.broadcast_except(Some(src), &message).await;
        }
    }

    async fn handle_chain(&self, message: Message, src: &str) {
        let candidate = match message.decode_chain() {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(peer = %src, error = %e, "undecodable chain");
                return;
            }
        };
        let height = candidate.len();
        let result = {
            let mut chain = self.chain.write().await;
            chain.replace_chain(candidate)
        };
        match result {
            Ok(()) => info!(peer = %src, blocks = height, "adopted longer chain from peer"),
            Err(e) => debug!(peer = %src, error = %e, "kept local chain"),
        }
    }

    async fn handle_request(&self, src: &str) {
        let message = {
            let chain = self.chain.read().await;
            Message::chain(chain.blocks())
        };
        match message {
            Ok(message) => {
                let _ = self.peers.send_to(src, &message).await;
            }
            Err(e) => warn!(error = %e, "failed to encode chain"),
        }
    }

    /// Gossip a locally-produced block to every peer
    pub async fn broadcast_block(&self, block: &Block) -> Result<()> {
        let message = Message::block(block)?;
        self.peers.broadcast(&message).await;
        Ok(())
    }

    /// Gossip a locally-admitted transaction to every peer
    pub async fn broadcast_transaction(&self, tx: &Transaction) -> Result<()> {
        let message = Message::tx(tx)?;
        self.peers.broadcast(&message).await;
        Ok(())
    }
}
