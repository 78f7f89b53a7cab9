//! Mining loop
//!
//! One background task drains the mempool into a coinbase-led block, runs
//! the nonce search, announces the result and persists the chain. The loop
//! checks its stop flag between iterations only; the nonce search itself is
//! uninterrupted CPU work.

use crate::context::NodeContext;
use quantumcoin_core::{bonus, mined_balance, Block, CoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;
const YEARLY_BONUS: u64 = 100;

/// Mine exactly one block under the chain lock, then announce it, persist
/// the chain and update the miner tally. Backs the CLI `mine` command,
/// `/api/mine` and every iteration of the continuous loop.
pub async fn mine_and_announce(
    ctx: &Arc<NodeContext>,
    address: &str,
    difficulty: u8,
) -> Result<Block, CoreError> {
    let block = {
        let mut chain = ctx.chain.write().await;
        tokio::task::block_in_place(|| chain.mine_block(address, difficulty))?
    };

    let reward = block
        .transactions
        .first()
        .filter(|tx| tx.is_coinbase())
        .map(|tx| tx.output_total())
        .unwrap_or(0);

    println!(
        "{GREEN}block #{} accepted by {address} (+{reward} QC){RESET}  {CYAN}{}{RESET}",
        block.index,
        block.hash_hex()
    );
    log_split_preview(ctx, reward);

    if let Err(e) = ctx.network.broadcast_block(&block).await {
        warn!(error = %e, "block broadcast failed");
    }
    ctx.persist_chain().await;

    if let Err(e) = mined_balance::add_mined(&ctx.mined_balance_path(), address, reward) {
        warn!(error = %e, "mined balance tally failed");
    }
    record_yearly_bonus(ctx, address);

    Ok(block)
}

/// Reward split preview; the coinbase pays the miner in full, the split
/// percentages are operator information
fn log_split_preview(ctx: &Arc<NodeContext>, reward: u64) {
    if reward == 0 {
        return;
    }
    let cfg = &ctx.config;
    info!(
        miner = reward * cfg.reward_pct_miner as u64 / 100,
        stake = reward * cfg.reward_pct_stake as u64 / 100,
        dev = reward * cfg.reward_pct_dev as u64 / 100,
        burn = reward * cfg.reward_pct_burn as u64 / 100,
        community = reward * cfg.community_pct() as u64 / 100,
        "reward split preview"
    );
}

/// Append a 100 QC informational bonus record once per chain-year per
/// address
fn record_yearly_bonus(ctx: &Arc<NodeContext>, address: &str) {
    let now = chrono::Utc::now().timestamp();
    let year_index = ((now - ctx.config.genesis_unix) / SECONDS_PER_YEAR).max(0);
    let path = ctx.bonus_path();

    let already_given = match bonus::last_yearly_index(&path, address) {
        Ok(last) => last.map_or(false, |last| last >= year_index),
        Err(e) => {
            warn!(error = %e, "bonus log unreadable");
            return;
        }
    };
    if already_given {
        return;
    }

    let mut record =
        bonus::BonusRecord::new(address, bonus::BONUS_KIND_YEARLY, YEARLY_BONUS, "annual miner bonus");
    record.metadata = year_index.to_string();
    if let Err(e) = bonus::append(&path, &record) {
        warn!(error = %e, "bonus record append failed");
    } else {
        info!(address, year = year_index, "annual miner bonus recorded");
    }
}

/// Rolling statistics for the continuous miner
#[derive(Debug, Clone)]
pub struct MiningStats {
    pub blocks_mined: u64,
    pub nonces_tried: u64,
    pub started: Instant,
    pub last_block_at: Option<Instant>,
}

impl Default for MiningStats {
    fn default() -> Self {
        Self {
            blocks_mined: 0,
            nonces_tried: 0,
            started: Instant::now(),
            last_block_at: None,
        }
    }
}

impl MiningStats {
    /// Lifetime average in blocks per second
    pub fn block_rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.blocks_mined as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Continuous miner driven by a stop flag
pub struct Miner {
    ctx: Arc<NodeContext>,
    address: String,
    difficulty: u8,
    interval: Duration,
    stop: Arc<AtomicBool>,
    stats: Arc<tokio::sync::RwLock<MiningStats>>,
}

impl Miner {
    pub fn new(ctx: Arc<NodeContext>, address: String) -> Self {
        let difficulty = ctx.config.default_difficulty_bits;
        Self {
            ctx,
            address,
            difficulty,
            interval: Duration::from_millis(1200),
            stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(tokio::sync::RwLock::new(MiningStats::default())),
        }
    }

    /// Handle for cooperative shutdown
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Shared view of the loop's statistics
    pub fn stats_handle(&self) -> Arc<tokio::sync::RwLock<MiningStats>> {
        Arc::clone(&self.stats)
    }

    /// Run the loop in a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        info!(address = %self.address, difficulty = self.difficulty, "miner started");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("miner stopped");
                return;
            }
            let round_start = Instant::now();
            match mine_and_announce(&self.ctx, &self.address, self.difficulty).await {
                Ok(block) => {
                    let elapsed = round_start.elapsed();
                    let hashrate = if elapsed.as_secs_f64() > 0.0 {
                        (block.nonce + 1) as f64 / elapsed.as_secs_f64()
                    } else {
                        0.0
                    };
                    let mut stats = self.stats.write().await;
                    stats.blocks_mined += 1;
                    stats.nonces_tried += block.nonce + 1;
                    stats.last_block_at = Some(Instant::now());
                    let rate = format!("{:.3} blocks/s", stats.block_rate());
                    let hashrate = format!("{hashrate:.0} H/s");
                    info!(
                        blocks = stats.blocks_mined,
                        rate = %rate,
                        hashrate = %hashrate,
                        "mining round complete"
                    );
                    drop(stats);
                    tokio::time::sleep(self.interval).await;
                }
                Err(CoreError::MiningEnded) | Err(CoreError::SupplyExhausted) => {
                    info!("nothing left to mine, miner exiting");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "mining failed, backing off");
                    tokio::time::sleep(Duration::from_millis(450)).await;
                }
            }
        }
    }
}
