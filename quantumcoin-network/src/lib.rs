//! QuantumCoin gossip overlay
//!
//! Long-lived TCP connections carrying length-prefixed, bincode-framed
//! messages. Each node keeps a peer registry, fans blocks and transactions
//! out to every peer, and reconciles chains by the longest-valid-chain rule.

pub mod node;
pub mod peer;
pub mod protocol;

pub use node::Node;
pub use peer::{Peer, PeerRegistry};
pub use protocol::{Message, MessageKind};

/// Errors raised by the gossip layer
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("no such peer: {0}")]
    PeerNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

impl From<bincode::Error> for NetworkError {
    fn from(err: bincode::Error) -> Self {
        NetworkError::Protocol(err.to_string())
    }
}
