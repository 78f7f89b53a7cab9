//! Transactions over the UTXO model
//!
//! The canonical transaction hash and the per-input signing message are both
//! derived from the bincode encoding of the struct. That encoding is frozen:
//! reordering fields or changing the serializer forks the chain.

use crate::address::decode_address;
use crate::chain::Blockchain;
use crate::crypto::{hash160, sha256, verify_digest};
use crate::{Amount, CoreError, Hash256, Hash256Ext, PubKeyHash, Result};
use serde::{Deserialize, Serialize};

/// Sender-label prefix carried by coinbase transactions; the block height
/// follows the colon so that two rewards minted within the same second
/// still hash to distinct ids
pub const COINBASE_SENDER: &str = "COINBASE";

/// Spend of a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub tx_id: Hash256,
    pub out_index: u32,
    /// `len(r) || r || len(s) || s`, empty until signed
    pub signature: Vec<u8>,
    /// 65-byte uncompressed public key, empty until signed
    pub pubkey: Vec<u8>,
}

/// Value locked to a public-key hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: Amount,
    pub pubkey_hash: PubKeyHash,
}

impl TransactionOutput {
    pub fn new(amount: Amount, pubkey_hash: PubKeyHash) -> Self {
        Self { amount, pubkey_hash }
    }

    /// True iff the output is locked with the given key hash
    pub fn is_locked_with(&self, pubkey_hash: &PubKeyHash) -> bool {
        &self.pubkey_hash == pubkey_hash
    }
}

/// A QC transaction. `sender` and the top-level `amount` are informational;
/// consensus consults only inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Derived hash; empty while the transaction is being built
    pub id: Vec<u8>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub timestamp: i64,
    pub sender: String,
    pub amount: Amount,
}

impl Transaction {
    /// Coinbase: no inputs, the full reward locked to the miner's key hash.
    /// The target block height is folded into the sender label.
    pub fn coinbase(miner: &str, reward: Amount, timestamp: i64, height: u32) -> Result<Self> {
        if miner.trim().is_empty() {
            return Err(CoreError::MinerAddressEmpty);
        }
        let pubkey_hash = decode_address(miner)?;
        let mut tx = Self {
            id: Vec::new(),
            inputs: Vec::new(),
            outputs: vec![TransactionOutput::new(reward, pubkey_hash)],
            timestamp,
            sender: format!("{COINBASE_SENDER}:{height}"),
            amount: reward,
        };
        tx.id = tx.hash()?.to_vec();
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Canonical hash: SHA-256 of the serialized transaction with `id`
    /// cleared. Signatures and pubkeys are part of the serialized inputs,
    /// but the id is assigned before signing and never re-derived, so
    /// signing does not change it.
    pub fn hash(&self) -> Result<Hash256> {
        let mut copy = self.clone();
        copy.id = Vec::new();
        let bytes = bincode::serialize(&copy)?;
        Ok(sha256(&bytes))
    }

    /// Per-input signing message: the transaction with every input's
    /// signature and pubkey cleared, followed by the spent outpoint
    /// (`tx_id`, then `out_index` as four big-endian bytes).
    pub fn signing_hash(&self, input_index: usize) -> Result<Hash256> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or_else(|| CoreError::Serialization("input index out of range".to_string()))?;

        let mut trimmed = self.clone();
        for inp in &mut trimmed.inputs {
            inp.signature = Vec::new();
            inp.pubkey = Vec::new();
        }

        let mut data = bincode::serialize(&trimmed)?;
        data.extend_from_slice(&input.tx_id);
        data.extend_from_slice(&input.out_index.to_be_bytes());
        Ok(sha256(&data))
    }

    /// Verify the transaction on its own.
    ///
    /// Coinbase transactions verify iff they carry at least one output.
    /// For everything else, every input must present a valid uncompressed
    /// secp256k1 point whose HASH160 equals the hash decoded from the
    /// `sender` address, and an ECDSA signature over that input's signing
    /// message. Spendability of the referenced outputs is the chain's
    /// concern, not this method's.
    pub fn verify(&self) -> bool {
        if self.is_coinbase() {
            return !self.outputs.is_empty();
        }
        if self.outputs.is_empty() {
            return false;
        }
        let Ok(sender_pkh) = decode_address(&self.sender) else {
            return false;
        };
        for (index, input) in self.inputs.iter().enumerate() {
            if hash160(&input.pubkey) != sender_pkh {
                return false;
            }
            let Ok(digest) = self.signing_hash(index) else {
                return false;
            };
            if !verify_digest(&input.pubkey, &digest, &input.signature) {
                return false;
            }
        }
        true
    }

    /// Total value carried by the outputs
    pub fn output_total(&self) -> Amount {
        self.outputs.iter().map(|out| out.amount).sum()
    }

    pub fn id_hex(&self) -> String {
        hex::encode(&self.id)
    }
}

/// Build an unsigned transfer from `from` to `to`, greedily collecting
/// spendable outputs of the sender until the amount is covered. The inputs
/// come back with empty signatures and pubkeys; signing is the wallet's job.
pub fn new_transaction(
    from: &str,
    to: &str,
    amount: Amount,
    chain: &Blockchain,
) -> Result<Transaction> {
    if amount == 0 {
        return Err(CoreError::InvalidAmount);
    }
    let from_pkh = decode_address(from)?;
    let to_pkh = decode_address(to)?;

    let (spendable, accumulated) = chain.find_spendable_outputs(&from_pkh, amount);
    if accumulated < amount {
        return Err(CoreError::InsufficientFunds {
            needed: amount,
            available: accumulated,
        });
    }

    let mut inputs = Vec::with_capacity(spendable.len());
    for (txid_hex, out_index) in spendable {
        inputs.push(TransactionInput {
            tx_id: Hash256::from_hex(&txid_hex)?,
            out_index,
            signature: Vec::new(),
            pubkey: Vec::new(),
        });
    }

    let mut outputs = vec![TransactionOutput::new(amount, to_pkh)];
    if accumulated > amount {
        outputs.push(TransactionOutput::new(accumulated - amount, from_pkh));
    }

    let mut tx = Transaction {
        id: Vec::new(),
        inputs,
        outputs,
        timestamp: chrono::Utc::now().timestamp(),
        sender: from.to_string(),
        amount,
    };
    tx.id = tx.hash()?.to_vec();
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::pubkey_to_address;
    use crate::crypto::{generate_secret_key, uncompressed_pubkey};
    use crate::wallet::Wallet;

    fn dummy_transfer() -> (Wallet, Transaction) {
        let wallet = Wallet::new();
        let recipient = Wallet::new();
        let tx = Transaction {
            id: Vec::new(),
            inputs: vec![TransactionInput {
                tx_id: [7u8; 32],
                out_index: 0,
                signature: Vec::new(),
                pubkey: Vec::new(),
            }],
            outputs: vec![TransactionOutput::new(
                10,
                decode_address(&recipient.address()).unwrap(),
            )],
            timestamp: 1_725_158_400,
            sender: wallet.address(),
            amount: 10,
        };
        (wallet, tx)
    }

    #[test]
    fn test_coinbase_shape() {
        let secret = generate_secret_key();
        let miner = pubkey_to_address(&uncompressed_pubkey(&secret));
        let tx = Transaction::coinbase(&miner, 50, 0, 1).unwrap();

        assert!(tx.is_coinbase());
        assert!(tx.verify());
        assert_eq!(tx.output_total(), 50);
        assert_eq!(tx.id, tx.hash().unwrap().to_vec());
    }

    #[test]
    fn test_coinbase_requires_miner_address() {
        assert!(matches!(
            Transaction::coinbase("  ", 50, 0, 1),
            Err(CoreError::MinerAddressEmpty)
        ));
    }

    #[test]
    fn test_hash_ignores_signature_and_pubkey() {
        let (wallet, mut tx) = dummy_transfer();
        tx.id = tx.hash().unwrap().to_vec();
        let before = tx.hash().unwrap();

        wallet.sign_transaction(&mut tx).unwrap();
        assert_eq!(tx.hash().unwrap(), before);
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let (wallet, mut tx) = dummy_transfer();
        tx.id = tx.hash().unwrap().to_vec();
        wallet.sign_transaction(&mut tx).unwrap();
        assert!(tx.verify());
    }

    #[test]
    fn test_corrupted_signature_fails_verify() {
        let (wallet, mut tx) = dummy_transfer();
        tx.id = tx.hash().unwrap().to_vec();
        wallet.sign_transaction(&mut tx).unwrap();

        let sig = &mut tx.inputs[0].signature;
        let last = sig.len() - 1;
        sig[last] ^= 0x01;
        assert!(!tx.verify());
    }

    #[test]
    fn test_foreign_key_fails_verify() {
        // signed with a key that does not hash to the sender address
        let (_, mut tx) = dummy_transfer();
        tx.id = tx.hash().unwrap().to_vec();
        let stranger = Wallet::new();
        stranger.sign_transaction(&mut tx).unwrap();
        assert!(!tx.verify());
    }

    #[test]
    fn test_unsigned_fails_verify() {
        let (_, mut tx) = dummy_transfer();
        tx.id = tx.hash().unwrap().to_vec();
        assert!(!tx.verify());
    }

    #[test]
    fn test_empty_outputs_fails_verify() {
        let (_, mut tx) = dummy_transfer();
        tx.outputs.clear();
        assert!(!tx.verify());
    }

    #[test]
    fn test_signing_hash_depends_on_outpoint() {
        let (_, mut tx) = dummy_transfer();
        tx.inputs.push(TransactionInput {
            tx_id: [9u8; 32],
            out_index: 3,
            signature: Vec::new(),
            pubkey: Vec::new(),
        });
        let h0 = tx.signing_hash(0).unwrap();
        let h1 = tx.signing_hash(1).unwrap();
        assert_ne!(h0, h1);
    }
}
