//! Wallets and the on-disk wallet store
//!
//! A wallet is a secp256k1 keypair; the store persists `address → secret
//! hex` as JSON with an atomic temp-file + rename write.

use crate::address::pubkey_to_address;
use crate::crypto::{generate_secret_key, sign_digest, uncompressed_pubkey};
use crate::transaction::Transaction;
use crate::{CoreError, Result};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A keypair able to sign transactions
#[derive(Debug, Clone)]
pub struct Wallet {
    secret: SecretKey,
    public: [u8; 65],
}

impl Wallet {
    /// Generate a fresh keypair
    pub fn new() -> Self {
        let secret = generate_secret_key();
        let public = uncompressed_pubkey(&secret);
        Self { secret, public }
    }

    /// Restore a wallet from a 32-byte secret key in hex
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex)
            .map_err(|e| CoreError::Crypto(format!("invalid secret hex: {e}")))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| CoreError::Crypto(format!("invalid secret key: {e}")))?;
        let public = uncompressed_pubkey(&secret);
        Ok(Self { secret, public })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    /// 65-byte uncompressed public key
    pub fn public_key(&self) -> &[u8; 65] {
        &self.public
    }

    pub fn address(&self) -> String {
        pubkey_to_address(&self.public)
    }

    /// Sign every input of the transaction with this wallet's key,
    /// attaching the signature and the public key to each input.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        for index in 0..tx.inputs.len() {
            let digest = tx.signing_hash(index)?;
            let signature = sign_digest(&self.secret, &digest)?;
            tx.inputs[index].signature = signature;
            tx.inputs[index].pubkey = self.public.to_vec();
        }
        Ok(())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted wallet collection: `{ "wallets": { addr: priv_hex }, "default": addr }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletStore {
    #[serde(default)]
    pub wallets: BTreeMap<String, String>,
    #[serde(default)]
    pub default: String,
}

impl WalletStore {
    /// Load the store, treating a missing file as an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| CoreError::Serialization(format!("wallet store: {e}")))
    }

    /// Atomic write: serialize to a temp file, then rename over the target
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("wallet store: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Fetch a wallet by address
    pub fn get(&self, address: &str) -> Result<Wallet> {
        let secret_hex = self
            .wallets
            .get(address)
            .ok_or_else(|| CoreError::InvalidAddress(format!("no wallet for {address}")))?;
        Wallet::from_secret_hex(secret_hex)
    }

    /// Insert a wallet, making it the default when none is set
    pub fn insert(&mut self, wallet: &Wallet) {
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet.secret_hex());
        if self.default.is_empty() {
            self.default = address;
        }
    }

    /// Load the default wallet, creating and persisting a fresh one when the
    /// store is missing or empty
    pub fn ensure_default(path: &Path) -> Result<(Self, Wallet)> {
        let mut store = Self::load(path)?;
        if !store.default.is_empty() {
            if let Ok(wallet) = store.get(&store.default.clone()) {
                return Ok((store, wallet));
            }
        }
        let wallet = Wallet::new();
        store.insert(&wallet);
        store.default = wallet.address();
        store.save(path)?;
        Ok((store, wallet))
    }
}
