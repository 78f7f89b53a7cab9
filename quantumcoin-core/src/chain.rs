//! Chain state: blocks, UTXO index, reward schedule, mempool admission
//!
//! The `Blockchain` is the single source of truth for the node. Every
//! mutation path (`add_transaction`, `mine_block`, `add_block_from_peer`,
//! `replace_chain`) goes through one owner; callers in the node wrap it in
//! a single writer lock.

use crate::address::decode_address;
use crate::block::Block;
use crate::mempool::Mempool;
use crate::pow::effective_difficulty;
use crate::transaction::{Transaction, TransactionOutput};
use crate::{Amount, CoreError, Hash256, PubKeyHash, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Monetary-policy and PoW parameters, fixed at construction
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub initial_reward: Amount,
    pub genesis_unix: i64,
    pub halving_interval_secs: i64,
    /// 0 means mining never ends
    pub mining_period_secs: i64,
    pub default_difficulty_bits: u8,
    /// Optional genesis allocation `(address, amount)`
    pub premine: Option<(String, Amount)>,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            initial_reward: 50,
            genesis_unix: 1_725_158_400, // 2024-09-01 00:00:00 UTC
            halving_interval_secs: 2 * 365 * 24 * 60 * 60,
            mining_period_secs: 10 * 365 * 24 * 60 * 60,
            default_difficulty_bits: 16,
            premine: None,
        }
    }
}

/// One unspent output, kept with its position for maturity checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub out_index: u32,
    pub output: TransactionOutput,
    pub block_index: u32,
    pub coinbase: bool,
}

#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    /// hex(txid) → unspent outputs of that transaction
    utxo: HashMap<String, Vec<UtxoEntry>>,
    /// 0 means uncapped
    total_supply: Amount,
    /// Depth below the tip before a coinbase output becomes spendable
    coinbase_maturity: u32,
    mempool: Mempool,
    params: ChainParams,
}

impl Blockchain {
    /// Create a chain with a deterministic genesis block. Nodes sharing a
    /// config derive an identical genesis: its timestamp is `genesis_unix`,
    /// its difficulty is one bit, and the optional premine is a
    /// coinbase-shaped transaction counted against the supply cap.
    pub fn new(
        params: ChainParams,
        total_supply: Amount,
        coinbase_maturity: u32,
        mempool_capacity: usize,
    ) -> Result<Self> {
        let mut genesis_txs = Vec::new();
        if let Some((address, amount)) = &params.premine {
            if *amount > 0 {
                genesis_txs.push(Transaction::coinbase(
                    address,
                    *amount,
                    params.genesis_unix,
                    0,
                )?);
            }
        }
        let genesis = Block::mine(
            0,
            genesis_txs,
            [0u8; 32],
            String::new(),
            1,
            params.genesis_unix,
        )?;

        let mut chain = Self {
            blocks: vec![genesis],
            utxo: HashMap::new(),
            total_supply,
            coinbase_maturity,
            mempool: Mempool::new(mempool_capacity),
            params,
        };
        chain.reindex_utxo();
        Ok(chain)
    }

    /// Rebuild a chain from persisted blocks
    pub fn from_blocks(
        blocks: Vec<Block>,
        total_supply: Amount,
        coinbase_maturity: u32,
        params: ChainParams,
        mempool_capacity: usize,
    ) -> Result<Self> {
        if blocks.is_empty() {
            return Err(CoreError::ChainNotInitialized);
        }
        let mut chain = Self {
            blocks,
            utxo: HashMap::new(),
            total_supply,
            coinbase_maturity,
            mempool: Mempool::new(mempool_capacity),
            params,
        };
        chain.reindex_utxo();
        Ok(chain)
    }

    pub fn tip(&self) -> Result<&Block> {
        self.blocks.last().ok_or(CoreError::NoBlocks)
    }

    pub fn best_height(&self) -> u32 {
        self.blocks.last().map(|b| b.index).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_by_index(&self, index: u32) -> Option<&Block> {
        self.blocks.get(index as usize).filter(|b| b.index == index)
    }

    pub fn block_by_hash(&self, hash: &Hash256) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.hash == hash)
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn coinbase_maturity(&self) -> u32 {
        self.coinbase_maturity
    }

    pub fn set_coinbase_maturity(&mut self, maturity: u32) {
        self.coinbase_maturity = maturity;
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    // ---- reward schedule ----

    /// Scheduled reward at a wall-clock instant: halve every interval,
    /// never below one coin, zero once the mining period has elapsed
    pub fn current_reward_at(&self, now: i64) -> Amount {
        let elapsed = (now - self.params.genesis_unix).max(0);
        let halvings = if self.params.halving_interval_secs > 0 {
            (elapsed / self.params.halving_interval_secs) as u32
        } else {
            0
        };
        let reward = if halvings >= Amount::BITS {
            1
        } else {
            (self.params.initial_reward >> halvings).max(1)
        };
        if self.params.mining_period_secs > 0 && elapsed > self.params.mining_period_secs {
            return 0;
        }
        reward
    }

    pub fn current_reward(&self) -> Amount {
        self.current_reward_at(chrono::Utc::now().timestamp())
    }

    /// Sum of every coinbase output ever minted, premine included
    pub fn total_minted(&self) -> Amount {
        self.blocks
            .iter()
            .flat_map(|b| &b.transactions)
            .filter(|tx| tx.is_coinbase())
            .map(|tx| tx.output_total())
            .sum()
    }

    // ---- balances & UTXO queries ----

    fn coinbase_is_mature(&self, entry: &UtxoEntry) -> bool {
        if !entry.coinbase {
            return true;
        }
        let depth = self.best_height().saturating_sub(entry.block_index);
        depth >= self.coinbase_maturity
    }

    /// Greedily collect spendable outputs of `pubkey_hash` until `amount`
    /// is covered. Returns `(txid hex, out_index)` pairs and the total
    /// accumulated, which may fall short.
    pub fn find_spendable_outputs(
        &self,
        pubkey_hash: &PubKeyHash,
        amount: Amount,
    ) -> (Vec<(String, u32)>, Amount) {
        let mut accumulated = 0;
        let mut spendable = Vec::new();
        'outer: for (txid, entries) in &self.utxo {
            for entry in entries {
                if entry.output.is_locked_with(pubkey_hash) && self.coinbase_is_mature(entry) {
                    accumulated += entry.output.amount;
                    spendable.push((txid.clone(), entry.out_index));
                    if accumulated >= amount {
                        break 'outer;
                    }
                }
            }
        }
        (spendable, accumulated)
    }

    pub fn balance_of_pkh(&self, pubkey_hash: &PubKeyHash) -> Amount {
        self.utxo
            .values()
            .flatten()
            .filter(|e| e.output.is_locked_with(pubkey_hash))
            .map(|e| e.output.amount)
            .sum()
    }

    /// Balance excluding coinbase outputs that have not matured yet
    pub fn spendable_balance_of_pkh(&self, pubkey_hash: &PubKeyHash) -> Amount {
        self.utxo
            .values()
            .flatten()
            .filter(|e| e.output.is_locked_with(pubkey_hash) && self.coinbase_is_mature(e))
            .map(|e| e.output.amount)
            .sum()
    }

    pub fn balance(&self, address: &str) -> Result<Amount> {
        Ok(self.balance_of_pkh(&decode_address(address)?))
    }

    pub fn spendable_balance(&self, address: &str) -> Result<Amount> {
        Ok(self.spendable_balance_of_pkh(&decode_address(address)?))
    }

    // ---- mempool admission ----

    fn utxo_entry(&self, txid: &Hash256, vout: u32) -> Option<&UtxoEntry> {
        self.utxo
            .get(&hex::encode(txid))?
            .iter()
            .find(|e| e.out_index == vout)
    }

    /// Admit a pending transaction: structurally sound, fully verified,
    /// never a coinbase, spending only outputs that exist, are mature and
    /// are not already claimed by another pending transaction
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        if tx.inputs.is_empty() {
            return Err(CoreError::EmptyInputs);
        }
        if tx.outputs.is_empty() {
            return Err(CoreError::EmptyOutputs);
        }
        if !tx.verify() {
            return Err(CoreError::InvalidSignature);
        }
        for input in &tx.inputs {
            match self.utxo_entry(&input.tx_id, input.out_index) {
                None => return Err(CoreError::UnspendableInput),
                Some(entry) if !self.coinbase_is_mature(entry) => {
                    return Err(CoreError::UnspendableInput)
                }
                Some(_) => {}
            }
            let claimed = self.mempool.iter().any(|pending| {
                pending
                    .inputs
                    .iter()
                    .any(|p| p.tx_id == input.tx_id && p.out_index == input.out_index)
            });
            if claimed {
                return Err(CoreError::DoubleSpend);
            }
        }
        self.mempool.add(tx)
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.snapshot()
    }

    /// Whether a transaction id is already mined or still pending
    pub fn tx_status(&self, tx_id: &[u8]) -> (bool, bool) {
        let in_block = self
            .blocks
            .iter()
            .flat_map(|b| &b.transactions)
            .any(|tx| tx.id == tx_id);
        (in_block, self.mempool.has(tx_id))
    }

    // ---- block production & replication ----

    /// Every transaction destined for a block must hold: the coinbase needs
    /// outputs, everything else must verify in full
    pub fn validate_block_txs(&self, txs: &[Transaction]) -> Result<()> {
        for tx in txs {
            if tx.is_coinbase() {
                if tx.outputs.is_empty() {
                    return Err(CoreError::EmptyOutputs);
                }
            } else if !tx.verify() {
                return Err(CoreError::InvalidSignature);
            }
        }
        Ok(())
    }

    /// Assemble coinbase + mempool, seal with proof-of-work, append,
    /// reindex, clear the pool. Returns the appended block.
    pub fn mine_block(&mut self, miner: &str, difficulty: u8) -> Result<Block> {
        let now = chrono::Utc::now().timestamp();
        let mut reward = self.current_reward_at(now);
        if reward == 0 {
            return Err(CoreError::MiningEnded);
        }
        if self.total_supply > 0 {
            let minted = self.total_minted();
            if minted >= self.total_supply {
                return Err(CoreError::SupplyExhausted);
            }
            reward = reward.min(self.total_supply - minted);
        }

        let difficulty = effective_difficulty(difficulty, self.params.default_difficulty_bits);
        let (next_index, prev_hash) = {
            let tip = self.tip()?;
            (tip.index + 1, tip.hash)
        };

        let coinbase = Transaction::coinbase(miner, reward, now, next_index)?;
        let mut txs = vec![coinbase];
        txs.extend(self.mempool.snapshot());
        self.validate_block_txs(&txs)?;

        let block = Block::mine(next_index, txs, prev_hash, miner.to_string(), difficulty, now)?;

        self.blocks.push(block.clone());
        self.reindex_utxo();
        self.mempool.clear();
        Ok(block)
    }

    /// Append a gossiped block: PoW must hold and it must extend the tip.
    /// Out-of-order or duplicate blocks are rejected without touching state.
    pub fn add_block_from_peer(&mut self, block: Block) -> Result<()> {
        if !block.validate_pow() {
            return Err(CoreError::InvalidPoW);
        }
        let tip = self.tip()?;
        if block.prev_hash != tip.hash || block.index != tip.index + 1 {
            return Err(CoreError::PrevHashMismatch);
        }
        self.validate_block_txs(&block.transactions)?;

        for tx in &block.transactions {
            self.mempool.remove(&tx.id);
        }
        self.blocks.push(block);
        self.reindex_utxo();
        Ok(())
    }

    /// Longest-valid-chain rule: adopt a strictly longer candidate whose
    /// every non-genesis block passes PoW, linkage and transaction checks
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<()> {
        if candidate.is_empty() {
            return Err(CoreError::IncomingChainInvalid("empty chain".to_string()));
        }
        if candidate.len() <= self.blocks.len() {
            return Err(CoreError::IncomingChainNotLonger);
        }
        for i in 1..candidate.len() {
            let block = &candidate[i];
            let prev = &candidate[i - 1];
            if !block.validate_pow() {
                return Err(CoreError::IncomingChainInvalid(format!(
                    "invalid proof-of-work at height {}",
                    block.index
                )));
            }
            if block.prev_hash != prev.hash || block.index != prev.index + 1 {
                return Err(CoreError::IncomingChainInvalid(format!(
                    "broken linkage at height {}",
                    block.index
                )));
            }
            if self.validate_block_txs(&block.transactions).is_err() {
                return Err(CoreError::IncomingChainInvalid(format!(
                    "invalid transactions at height {}",
                    block.index
                )));
            }
        }

        for block in &candidate {
            for tx in &block.transactions {
                self.mempool.remove(&tx.id);
            }
        }
        self.blocks = candidate;
        self.reindex_utxo();
        Ok(())
    }

    /// Rebuild the UTXO index as the fold of every transaction in order,
    /// using a spent-set keyed by `(txid, vout)` for a single pass
    pub fn reindex_utxo(&mut self) {
        let mut spent: HashSet<(String, u32)> = HashSet::new();
        for block in &self.blocks {
            for tx in &block.transactions {
                if tx.is_coinbase() {
                    continue;
                }
                for input in &tx.inputs {
                    spent.insert((hex::encode(input.tx_id), input.out_index));
                }
            }
        }

        let mut utxo: HashMap<String, Vec<UtxoEntry>> = HashMap::new();
        for block in &self.blocks {
            for tx in &block.transactions {
                let txid = hex::encode(&tx.id);
                for (index, output) in tx.outputs.iter().enumerate() {
                    let index = index as u32;
                    if spent.contains(&(txid.clone(), index)) {
                        continue;
                    }
                    utxo.entry(txid.clone()).or_default().push(UtxoEntry {
                        out_index: index,
                        output: output.clone(),
                        block_index: block.index,
                        coinbase: tx.is_coinbase(),
                    });
                }
            }
        }
        self.utxo = utxo;
    }

    pub fn utxo_len(&self) -> usize {
        self.utxo.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn test_params() -> ChainParams {
        ChainParams {
            initial_reward: 50,
            genesis_unix: 1_725_158_400,
            // far enough out that wall-clock halvings never hit the tests
            halving_interval_secs: 100 * 365 * 24 * 60 * 60,
            mining_period_secs: 0,
            default_difficulty_bits: 4,
            premine: None,
        }
    }

    fn test_chain() -> Blockchain {
        Blockchain::new(test_params(), 0, 0, 0).unwrap()
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Blockchain::new(test_params(), 0, 0, 0).unwrap();
        let b = Blockchain::new(test_params(), 0, 0, 0).unwrap();
        assert_eq!(a.tip().unwrap().hash, b.tip().unwrap().hash);
        assert_eq!(a.best_height(), 0);
    }

    #[test]
    fn test_reward_halving_schedule() {
        let chain = test_chain();
        let genesis = chain.params.genesis_unix;
        let interval = chain.params.halving_interval_secs;

        assert_eq!(chain.current_reward_at(genesis), 50);
        assert_eq!(chain.current_reward_at(genesis + interval), 25);
        assert_eq!(chain.current_reward_at(genesis + 2 * interval), 12);
        // never below one coin while mining is open
        assert_eq!(chain.current_reward_at(genesis + 20 * interval), 1);
        // clock before genesis clamps to the initial reward
        assert_eq!(chain.current_reward_at(genesis - 1000), 50);
    }

    #[test]
    fn test_reward_zero_after_mining_period() {
        let mut params = test_params();
        params.mining_period_secs = 100;
        let chain = Blockchain::new(params, 0, 0, 0).unwrap();
        let genesis = chain.params.genesis_unix;
        assert_eq!(chain.current_reward_at(genesis + 100), 50);
        assert_eq!(chain.current_reward_at(genesis + 101), 0);
    }

    #[test]
    fn test_mine_block_pays_miner() {
        let mut chain = test_chain();
        let miner = Wallet::new();
        let block = chain.mine_block(&miner.address(), 4).unwrap();

        assert_eq!(block.index, 1);
        assert_eq!(chain.best_height(), 1);
        assert_eq!(chain.balance(&miner.address()).unwrap(), 50);
    }

    #[test]
    fn test_immature_coinbase_not_spendable() {
        let mut chain = Blockchain::new(test_params(), 0, 10, 0).unwrap();
        let miner = Wallet::new();
        chain.mine_block(&miner.address(), 4).unwrap();

        assert_eq!(chain.balance(&miner.address()).unwrap(), 50);
        assert_eq!(chain.spendable_balance(&miner.address()).unwrap(), 0);
    }

    #[test]
    fn test_coinbase_matures_with_depth() {
        let mut chain = Blockchain::new(test_params(), 0, 2, 0).unwrap();
        let miner = Wallet::new();
        chain.mine_block(&miner.address(), 4).unwrap();
        chain.mine_block(&miner.address(), 4).unwrap();
        chain.mine_block(&miner.address(), 4).unwrap();

        // only the first coinbase is two blocks deep
        assert_eq!(chain.spendable_balance(&miner.address()).unwrap(), 50);
        assert_eq!(chain.balance(&miner.address()).unwrap(), 150);
    }

    #[test]
    fn test_supply_cap() {
        let mut params = test_params();
        params.initial_reward = 100;
        let mut chain = Blockchain::new(params, 150, 0, 0).unwrap();
        let miner = Wallet::new();

        chain.mine_block(&miner.address(), 4).unwrap();
        assert_eq!(chain.total_minted(), 100);

        // second block is capped to the remainder
        chain.mine_block(&miner.address(), 4).unwrap();
        assert_eq!(chain.total_minted(), 150);

        assert!(matches!(
            chain.mine_block(&miner.address(), 4),
            Err(CoreError::SupplyExhausted)
        ));
    }

    #[test]
    fn test_premine_counts_toward_supply() {
        let recipient = Wallet::new();
        let mut params = test_params();
        params.premine = Some((recipient.address(), 1000));
        let chain = Blockchain::new(params, 0, 0, 0).unwrap();

        assert_eq!(chain.total_minted(), 1000);
        assert_eq!(chain.balance(&recipient.address()).unwrap(), 1000);
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let mut chain = test_chain();
        let miner = Wallet::new();
        let block = chain.mine_block(&miner.address(), 4).unwrap();
        let height = chain.best_height();

        assert!(matches!(
            chain.add_block_from_peer(block),
            Err(CoreError::PrevHashMismatch)
        ));
        assert_eq!(chain.best_height(), height);
    }

    #[test]
    fn test_peer_block_applies() {
        let mut a = test_chain();
        let mut b = test_chain();
        let miner = Wallet::new();

        let block = a.mine_block(&miner.address(), 4).unwrap();
        b.add_block_from_peer(block).unwrap();
        assert_eq!(b.best_height(), 1);
        assert_eq!(b.tip().unwrap().hash, a.tip().unwrap().hash);
    }

    #[test]
    fn test_peer_block_with_bad_pow_rejected() {
        let mut a = test_chain();
        let mut b = test_chain();
        let miner = Wallet::new();

        let mut block = a.mine_block(&miner.address(), 4).unwrap();
        block.nonce = block.nonce.wrapping_add(1);
        assert!(matches!(
            b.add_block_from_peer(block),
            Err(CoreError::InvalidPoW)
        ));
    }

    #[test]
    fn test_replace_chain_adopts_longer() {
        let mut short = test_chain();
        let mut long = test_chain();
        let miner = Wallet::new();

        short.mine_block(&miner.address(), 4).unwrap();
        long.mine_block(&miner.address(), 4).unwrap();
        long.mine_block(&miner.address(), 4).unwrap();

        short.replace_chain(long.blocks().to_vec()).unwrap();
        assert_eq!(short.best_height(), 2);
        assert_eq!(short.tip().unwrap().hash, long.tip().unwrap().hash);
        // balances reflect the adopted chain only
        assert_eq!(
            short.balance(&miner.address()).unwrap(),
            long.balance(&miner.address()).unwrap()
        );
    }

    #[test]
    fn test_replace_chain_rejects_shorter_and_equal() {
        let mut a = test_chain();
        let mut b = test_chain();
        let miner = Wallet::new();
        a.mine_block(&miner.address(), 4).unwrap();

        assert!(matches!(
            a.replace_chain(b.blocks().to_vec()),
            Err(CoreError::IncomingChainNotLonger)
        ));

        b.mine_block(&miner.address(), 4).unwrap();
        assert!(matches!(
            a.replace_chain(b.blocks().to_vec()),
            Err(CoreError::IncomingChainNotLonger)
        ));
    }

    #[test]
    fn test_replace_chain_rejects_broken_linkage() {
        let mut a = test_chain();
        let mut b = test_chain();
        let miner = Wallet::new();

        b.mine_block(&miner.address(), 4).unwrap();
        b.mine_block(&miner.address(), 4).unwrap();
        let mut candidate = b.blocks().to_vec();
        candidate[2].prev_hash = [9u8; 32];

        assert!(matches!(
            a.replace_chain(candidate),
            Err(CoreError::IncomingChainInvalid(_))
        ));
        assert_eq!(a.best_height(), 0);
    }

    #[test]
    fn test_add_transaction_rejects_coinbase() {
        let mut chain = test_chain();
        let miner = Wallet::new();
        let coinbase = Transaction::coinbase(&miner.address(), 50, 0, 1).unwrap();
        assert!(matches!(
            chain.add_transaction(coinbase),
            Err(CoreError::EmptyInputs)
        ));
    }

    #[test]
    fn test_add_transaction_rejects_unknown_input() {
        let mut chain = test_chain();
        let alice = Wallet::new();
        let bob = Wallet::new();
        chain.mine_block(&alice.address(), 4).unwrap();

        let mut tx =
            crate::transaction::new_transaction(&alice.address(), &bob.address(), 10, &chain)
                .unwrap();
        // point the input at an output that does not exist
        tx.inputs[0].tx_id = [0xaa; 32];
        tx.id = tx.hash().unwrap().to_vec();
        alice.sign_transaction(&mut tx).unwrap();

        assert!(matches!(
            chain.add_transaction(tx),
            Err(CoreError::UnspendableInput)
        ));
    }

    #[test]
    fn test_add_transaction_rejects_immature_coinbase_spend() {
        let mut chain = Blockchain::new(test_params(), 0, 5, 0).unwrap();
        let alice = Wallet::new();
        let bob = Wallet::new();
        chain.mine_block(&alice.address(), 4).unwrap();

        // bypass the maturity-aware selector by referencing the coinbase
        // output directly
        let coinbase = chain.blocks()[1].transactions[0].clone();
        let mut tx = Transaction {
            id: Vec::new(),
            inputs: vec![crate::transaction::TransactionInput {
                tx_id: coinbase.hash().unwrap(),
                out_index: 0,
                signature: Vec::new(),
                pubkey: Vec::new(),
            }],
            outputs: vec![TransactionOutput::new(
                10,
                crate::address::decode_address(&bob.address()).unwrap(),
            )],
            timestamp: 0,
            sender: alice.address(),
            amount: 10,
        };
        tx.id = tx.hash().unwrap().to_vec();
        alice.sign_transaction(&mut tx).unwrap();

        assert!(matches!(
            chain.add_transaction(tx),
            Err(CoreError::UnspendableInput)
        ));
    }

    #[test]
    fn test_add_transaction_rejects_pending_double_spend() {
        let mut chain = test_chain();
        let alice = Wallet::new();
        let bob = Wallet::new();
        chain.mine_block(&alice.address(), 4).unwrap();

        let mut first =
            crate::transaction::new_transaction(&alice.address(), &bob.address(), 10, &chain)
                .unwrap();
        alice.sign_transaction(&mut first).unwrap();
        chain.add_transaction(first).unwrap();

        // the second transfer selects the same coinbase output
        let mut second =
            crate::transaction::new_transaction(&alice.address(), &bob.address(), 20, &chain)
                .unwrap();
        alice.sign_transaction(&mut second).unwrap();

        assert!(matches!(
            chain.add_transaction(second),
            Err(CoreError::DoubleSpend)
        ));
        assert_eq!(chain.mempool().len(), 1);
    }

    #[test]
    fn test_mine_with_empty_mempool_yields_coinbase_only() {
        let mut chain = test_chain();
        let miner = Wallet::new();
        let block = chain.mine_block(&miner.address(), 4).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
    }
}
