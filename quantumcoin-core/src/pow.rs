//! Proof-of-work
//!
//! The target for difficulty `d` is `1 << (256 - d)`; a digest wins iff it
//! is strictly below the target, which is exactly the condition that its top
//! `d` bits are zero.
//!
//! The preimage layout is consensus-frozen:
//! `prev_hash || SHA256(tx hashes) || dec(index) || dec(timestamp) ||
//! dec(nonce) || dec(difficulty) || miner`, with every integer rendered as
//! decimal ASCII. Any deviation silently forks the chain.

use crate::block::{hash_transactions, Block};
use crate::crypto::sha256;
use crate::{Hash256, Result};

/// Difficulty is expressed in leading zero bits, 1..=255
pub const MAX_DIFFICULTY_BITS: u8 = 255;

/// Map a configured difficulty to the effective one: 0 falls back to the
/// node default, everything else is clamped to at least one bit.
pub fn effective_difficulty(bits: u8, default_bits: u8) -> u8 {
    let bits = if bits == 0 { default_bits } else { bits };
    bits.max(1)
}

/// True iff the digest, read as a 256-bit big-endian integer, is below
/// `1 << (256 - difficulty)`
pub fn hash_meets_target(hash: &Hash256, difficulty: u8) -> bool {
    let difficulty = difficulty.max(1);
    let full_bytes = (difficulty / 8) as usize;
    let rem_bits = difficulty % 8;
    if hash[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }
    if rem_bits > 0 && (hash[full_bytes] >> (8 - rem_bits)) != 0 {
        return false;
    }
    true
}

/// Nonce search and validation over one block
pub struct ProofOfWork<'a> {
    block: &'a Block,
    tx_digest: Hash256,
    difficulty: u8,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(block: &'a Block) -> Result<Self> {
        Ok(Self {
            block,
            tx_digest: hash_transactions(&block.transactions)?,
            difficulty: block.difficulty.max(1),
        })
    }

    fn preimage(&self, nonce: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(128 + self.block.miner.len());
        data.extend_from_slice(&self.block.prev_hash);
        data.extend_from_slice(&self.tx_digest);
        data.extend_from_slice(self.block.index.to_string().as_bytes());
        data.extend_from_slice(self.block.timestamp.to_string().as_bytes());
        data.extend_from_slice(nonce.to_string().as_bytes());
        data.extend_from_slice(self.difficulty.to_string().as_bytes());
        data.extend_from_slice(self.block.miner.as_bytes());
        data
    }

    /// Search nonces from zero until a digest meets the target
    pub fn run(&self) -> (u64, Hash256) {
        let mut nonce: u64 = 0;
        loop {
            let hash = sha256(&self.preimage(nonce));
            if hash_meets_target(&hash, self.difficulty) {
                return (nonce, hash);
            }
            nonce += 1;
        }
    }

    /// Recompute the digest for the stored nonce; it must both meet the
    /// target and match the stored block hash
    pub fn validate(&self) -> bool {
        let hash = sha256(&self.preimage(self.block.nonce));
        hash == self.block.hash && hash_meets_target(&hash, self.difficulty)
    }
}
