//! Chain persistence
//!
//! The whole chain is one bincode snapshot written atomically (temp file +
//! rename). The UTXO index is derivable and rebuilt on load; the mempool is
//! never persisted.

use crate::block::Block;
use crate::chain::{Blockchain, ChainParams};
use crate::{Amount, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk and on-wire representation of a full chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub total_supply: Amount,
    pub coinbase_maturity: u32,
}

impl ChainSnapshot {
    pub fn from_chain(chain: &Blockchain) -> Self {
        Self {
            blocks: chain.blocks().to_vec(),
            total_supply: chain.total_supply(),
            coinbase_maturity: chain.coinbase_maturity(),
        }
    }

    pub fn into_chain(self, params: ChainParams, mempool_capacity: usize) -> Result<Blockchain> {
        Blockchain::from_blocks(
            self.blocks,
            self.total_supply,
            self.coinbase_maturity,
            params,
            mempool_capacity,
        )
    }
}

/// Write the chain to `path` atomically
pub fn save_chain(path: &Path, chain: &Blockchain) -> Result<()> {
    let snapshot = ChainSnapshot::from_chain(chain);
    let data = bincode::serialize(&snapshot)?;
    let tmp = path.with_extension("dat.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), blocks = snapshot.blocks.len(), "chain saved");
    Ok(())
}

/// Load the chain from `path`. A missing file is not an error (the caller
/// creates a fresh genesis); a structurally corrupt file is.
pub fn load_chain(
    path: &Path,
    params: ChainParams,
    mempool_capacity: usize,
) -> Result<Option<Blockchain>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path)?;
    let snapshot: ChainSnapshot = bincode::deserialize(&data)
        .map_err(|e| CoreError::Serialization(format!("chain file {}: {e}", path.display())))?;
    Ok(Some(snapshot.into_chain(params, mempool_capacity)?))
}
