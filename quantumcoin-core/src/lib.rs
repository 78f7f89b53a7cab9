//! QuantumCoin consensus core
//!
//! Chain state, transactions, proof-of-work, mempool and persistence for the
//! QC network. Networking and the HTTP control plane live in the sibling
//! crates; everything consensus-critical is here.

/// 256-bit hash type used throughout the chain
pub type Hash256 = [u8; 32];

/// 160-bit public-key hash (RIPEMD160 of SHA256)
pub type PubKeyHash = [u8; 20];

/// Coin amount in whole QC
pub type Amount = u64;

/// Helper trait for Hash256 operations
pub trait Hash256Ext {
    fn to_hex(&self) -> String;
    fn from_hex(hex: &str) -> Result<Hash256>;
    fn is_zero(&self) -> bool;
}

impl Hash256Ext for Hash256 {
    fn to_hex(&self) -> String {
        hex::encode(self)
    }

    fn from_hex(s: &str) -> Result<Hash256> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidTxIdHex(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(CoreError::InvalidTxIdHex(s.to_string()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(hash)
    }

    fn is_zero(&self) -> bool {
        self.iter().all(|&b| b == 0)
    }
}

/// Error type for everything the core can reject
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // Validation
    #[error("invalid amount")]
    InvalidAmount,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("transaction has no inputs")]
    EmptyInputs,

    #[error("transaction has no outputs")]
    EmptyOutputs,

    #[error("invalid transaction id hex: {0}")]
    InvalidTxIdHex(String),

    // Chain
    #[error("prev hash mismatch")]
    PrevHashMismatch,

    #[error("invalid proof-of-work")]
    InvalidPoW,

    #[error("incoming chain is not longer")]
    IncomingChainNotLonger,

    #[error("incoming chain is invalid: {0}")]
    IncomingChainInvalid(String),

    #[error("blockchain not initialized (no genesis)")]
    ChainNotInitialized,

    #[error("no blocks in chain")]
    NoBlocks,

    // Economics
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("total supply exhausted")]
    SupplyExhausted,

    #[error("mining period has ended")]
    MiningEnded,

    #[error("miner address empty")]
    MinerAddressEmpty,

    // Mempool
    #[error("duplicate transaction")]
    DuplicateTransaction,

    #[error("input references a missing, spent or immature output")]
    UnspendableInput,

    #[error("output already spent by a pending transaction")]
    DoubleSpend,

    #[error("mempool is full")]
    MempoolFull,

    // Infrastructure
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<bincode::Error> for CoreError {
    fn from(err: bincode::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

pub mod address;
pub mod block;
pub mod bonus;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod mempool;
pub mod mined_balance;
pub mod pow;
pub mod storage;
pub mod transaction;
pub mod wallet;

pub use block::Block;
pub use chain::Blockchain;
pub use config::Config;
pub use mempool::Mempool;
pub use transaction::{Transaction, TransactionInput, TransactionOutput};
pub use wallet::{Wallet, WalletStore};
