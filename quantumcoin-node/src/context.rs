//! Shared node state
//!
//! One `NodeContext` is built at startup and handed to the miner, the HTTP
//! handlers and the gossip node. The chain sits behind a single writer
//! lock; every mutation path goes through it.

use crate::webmine::WebChallenge;
use quantumcoin_core::{Blockchain, Config};
use quantumcoin_network::Node;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

pub struct NodeContext {
    pub config: Config,
    pub chain: Arc<RwLock<Blockchain>>,
    pub network: Arc<Node>,
    /// Active external-miner challenge, if any
    pub webmine: Mutex<Option<WebChallenge>>,
    pub started: Instant,
}

impl NodeContext {
    pub fn new(config: Config, chain: Blockchain) -> Arc<Self> {
        let chain = Arc::new(RwLock::new(chain));
        let network = Node::new(Arc::clone(&chain));
        Arc::new(Self {
            config,
            chain,
            network,
            webmine: Mutex::new(None),
            started: Instant::now(),
        })
    }

    pub fn chain_path(&self) -> PathBuf {
        PathBuf::from(&self.config.chain_file)
    }

    pub fn wallet_path(&self) -> PathBuf {
        PathBuf::from(&self.config.wallet_file)
    }

    pub fn bonus_path(&self) -> PathBuf {
        PathBuf::from(&self.config.bonus_file)
    }

    /// The miner tally lives next to the chain file
    pub fn mined_balance_path(&self) -> PathBuf {
        match self.chain_path().parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join("mined_balance.json"),
            _ => PathBuf::from("mined_balance.json"),
        }
    }

    /// Persist the chain, logging instead of failing: in-memory state stays
    /// authoritative and the next autosave retries
    pub async fn persist_chain(&self) {
        let chain = self.chain.read().await;
        if let Err(e) = quantumcoin_core::storage::save_chain(&self.chain_path(), &chain) {
            warn!(error = %e, "chain save failed, will retry on next autosave");
        }
    }
}
