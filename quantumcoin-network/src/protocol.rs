//! Wire protocol
//!
//! Every frame on the wire is a 4-byte big-endian length followed by the
//! bincode encoding of a [`Message`]. The envelope carries a type tag and
//! an opaque payload which is itself bincode: a block, a transaction, a
//! whole chain, a peer list, or an error string. The encoder is the same
//! one used for persistence and is frozen.

use crate::{NetworkError, Result};
use quantumcoin_core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard cap on a single frame (32 MiB)
pub const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// A single freshly-mined block
    Block,
    /// A pending transaction
    Tx,
    /// The sender's full chain
    Chain,
    /// Ask the receiver for its chain
    Request,
    /// Keep-alive probe
    Ping,
    /// Keep-alive answer
    Pong,
    /// Known peer addresses
    PeerList,
    /// Human-readable error report
    Error,
}

/// Typed envelope travelling on every connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn block(block: &Block) -> Result<Self> {
        Ok(Self {
            kind: MessageKind::Block,
            payload: bincode::serialize(block)?,
        })
    }

    pub fn tx(tx: &Transaction) -> Result<Self> {
        Ok(Self {
            kind: MessageKind::Tx,
            payload: bincode::serialize(tx)?,
        })
    }

    pub fn chain(blocks: &[Block]) -> Result<Self> {
        Ok(Self {
            kind: MessageKind::Chain,
            payload: bincode::serialize(blocks)?,
        })
    }

    pub fn request() -> Self {
        Self {
            kind: MessageKind::Request,
            payload: Vec::new(),
        }
    }

    pub fn ping() -> Self {
        Self {
            kind: MessageKind::Ping,
            payload: Vec::new(),
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: MessageKind::Pong,
            payload: Vec::new(),
        }
    }

    pub fn peer_list(addrs: &[String]) -> Result<Self> {
        Ok(Self {
            kind: MessageKind::PeerList,
            payload: bincode::serialize(addrs)?,
        })
    }

    pub fn error(text: &str) -> Result<Self> {
        Ok(Self {
            kind: MessageKind::Error,
            payload: bincode::serialize(text)?,
        })
    }

    pub fn decode_block(&self) -> Result<Block> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    pub fn decode_tx(&self) -> Result<Transaction> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    pub fn decode_chain(&self) -> Result<Vec<Block>> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    pub fn decode_peer_list(&self) -> Result<Vec<String>> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    pub fn decode_error(&self) -> Result<String> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

/// Write one length-prefixed frame
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = bincode::serialize(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. A cleanly closed socket surfaces as
/// [`NetworkError::ConnectionClosed`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(NetworkError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}
