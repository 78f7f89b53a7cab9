//! Blocks
//!
//! A block is sealed by proof-of-work at construction time and never
//! mutated afterwards.

use crate::crypto::sha256;
use crate::pow::ProofOfWork;
use crate::transaction::Transaction;
use crate::{Hash256, Hash256Ext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u32,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub prev_hash: Hash256,
    pub hash: Hash256,
    pub nonce: u64,
    pub miner: String,
    pub difficulty: u8,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Block {
    /// Assemble a block and run the nonce search until it seals
    pub fn mine(
        index: u32,
        transactions: Vec<Transaction>,
        prev_hash: Hash256,
        miner: String,
        difficulty: u8,
        timestamp: i64,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            prev_hash,
            hash: [0u8; 32],
            nonce: 0,
            miner,
            difficulty: difficulty.max(1),
            metadata: BTreeMap::new(),
        };
        let (nonce, hash) = {
            let pow = ProofOfWork::new(&block)?;
            pow.run()
        };
        block.nonce = nonce;
        block.hash = hash;
        Ok(block)
    }

    /// Re-run the stored nonce through the preimage and check the target
    pub fn validate_pow(&self) -> bool {
        match ProofOfWork::new(self) {
            Ok(pow) => pow.validate(),
            Err(_) => false,
        }
    }

    pub fn hash_hex(&self) -> String {
        self.hash.to_hex()
    }
}

/// SHA-256 over the concatenation of every transaction's canonical hash.
/// An empty list hashes as SHA-256 of the empty string.
pub fn hash_transactions(transactions: &[Transaction]) -> Result<Hash256> {
    let mut joined = Vec::with_capacity(transactions.len() * 32);
    for tx in transactions {
        joined.extend_from_slice(&tx.hash()?);
    }
    Ok(sha256(&joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_secret_key, uncompressed_pubkey};

    #[test]
    fn test_empty_tx_digest_is_sha_of_empty() {
        assert_eq!(hash_transactions(&[]).unwrap(), sha256(&[]));
    }

    #[test]
    fn test_mine_seals_block() {
        let block =
            Block::mine(0, Vec::new(), [0u8; 32], String::new(), 4, 1_725_158_400).unwrap();
        assert!(block.validate_pow());
        assert_eq!(block.index, 0);
    }

    #[test]
    fn test_tx_digest_changes_with_contents() {
        let secret = generate_secret_key();
        let miner = crate::address::pubkey_to_address(&uncompressed_pubkey(&secret));
        let tx = Transaction::coinbase(&miner, 50, 0, 1).unwrap();

        let with_tx = hash_transactions(std::slice::from_ref(&tx)).unwrap();
        assert_ne!(with_tx, hash_transactions(&[]).unwrap());
    }
}
