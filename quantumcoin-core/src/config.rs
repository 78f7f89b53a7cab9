//! Node configuration
//!
//! Resolution order: built-in defaults, then `config.json`, then the
//! environment — the environment always wins. Zero or empty fields in the
//! file fall back to the defaults, so a partial config is always usable.

use crate::chain::ChainParams;
use crate::{Amount, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Chain & monetary policy
    pub symbol: String,
    pub initial_reward: Amount,
    /// 0 = unlimited
    pub total_supply: Amount,
    pub genesis_unix: i64,
    pub halving_interval_secs: i64,
    /// 0 = mining never ends
    pub mining_period_secs: i64,
    pub target_block_time_secs: u64,
    pub default_difficulty_bits: u8,
    pub coinbase_maturity: u32,

    // Reward split percentages; the remainder below 100 goes to community
    pub reward_pct_miner: u8,
    pub reward_pct_stake: u8,
    pub reward_pct_dev: u8,
    pub reward_pct_burn: u8,

    // Split / burn destinations (informational unless a feature uses them)
    pub miner_address: String,
    pub stake_address: String,
    pub dev_address: String,
    pub burn_address: String,
    pub community_address: String,

    // Premine
    pub main_address: String,
    pub premine_percent: u8,
    pub premine_address: String,

    // Networking
    pub http_port: String,
    pub p2p_port: String,
    pub boot_peers: Vec<String>,

    // Storage
    pub chain_file: String,
    pub bonus_file: String,
    pub wallet_file: String,

    // Misc
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "QC".to_string(),
            initial_reward: 50,
            total_supply: 25_500_000,
            genesis_unix: 1_725_158_400, // 2024-09-01 00:00:00 UTC
            halving_interval_secs: 2 * 365 * 24 * 60 * 60,
            mining_period_secs: 10 * 365 * 24 * 60 * 60,
            target_block_time_secs: 30,
            default_difficulty_bits: 16,
            coinbase_maturity: 10,

            reward_pct_miner: 70,
            reward_pct_stake: 10,
            reward_pct_dev: 10,
            reward_pct_burn: 5,

            miner_address: String::new(),
            stake_address: String::new(),
            dev_address: String::new(),
            burn_address: String::new(),
            community_address: String::new(),

            main_address: String::new(),
            premine_percent: 0,
            premine_address: String::new(),

            http_port: ":8081".to_string(),
            p2p_port: ":3001".to_string(),
            boot_peers: Vec::new(),

            chain_file: "chain_data.dat".to_string(),
            bonus_file: "bonus_store.json".to_string(),
            wallet_file: "wallet_data.json".to_string(),

            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults ← file ← environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            if path.exists() {
                let data = fs::read(path)?;
                config = serde_json::from_slice(&data)
                    .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
                config.merge_defaults();
            }
        }
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Replace zero/empty fields with the built-in defaults
    pub fn merge_defaults(&mut self) {
        let d = Self::default();
        fn or_default(value: &mut String, default: String) {
            if value.is_empty() {
                *value = default;
            }
        }
        or_default(&mut self.symbol, d.symbol);
        if self.initial_reward == 0 {
            self.initial_reward = d.initial_reward;
        }
        if self.genesis_unix == 0 {
            self.genesis_unix = d.genesis_unix;
        }
        if self.halving_interval_secs == 0 {
            self.halving_interval_secs = d.halving_interval_secs;
        }
        if self.target_block_time_secs == 0 {
            self.target_block_time_secs = d.target_block_time_secs;
        }
        if self.default_difficulty_bits == 0 {
            self.default_difficulty_bits = d.default_difficulty_bits;
        }
        or_default(&mut self.http_port, d.http_port);
        or_default(&mut self.p2p_port, d.p2p_port);
        or_default(&mut self.chain_file, d.chain_file);
        or_default(&mut self.bonus_file, d.bonus_file);
        or_default(&mut self.wallet_file, d.wallet_file);
        or_default(&mut self.log_level, d.log_level);
    }

    /// Overlay environment variables; `get` abstracts the environment so
    /// resolution stays testable
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| CoreError::Config(format!("invalid {key}: {value}")))
        }

        if let Some(v) = get("HTTP_PORT") {
            self.http_port = v;
        }
        if let Some(v) = get("QC_MINER") {
            self.miner_address = v;
        }
        if let Some(v) = get("QC_MAIN_ADDRESS") {
            self.main_address = v;
        }
        if let Some(v) = get("QC_SYMBOL") {
            self.symbol = v;
        }
        if let Some(v) = get("QC_INITIAL_REWARD") {
            self.initial_reward = parse("QC_INITIAL_REWARD", &v)?;
        }
        if let Some(v) = get("QC_TOTAL_SUPPLY") {
            self.total_supply = parse("QC_TOTAL_SUPPLY", &v)?;
        }
        if let Some(v) = get("QC_GENESIS_UNIX") {
            self.genesis_unix = parse("QC_GENESIS_UNIX", &v)?;
        }
        if let Some(v) = get("QC_HALVING_INTERVAL_SECS") {
            self.halving_interval_secs = parse("QC_HALVING_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("QC_MINING_PERIOD_SECS") {
            self.mining_period_secs = parse("QC_MINING_PERIOD_SECS", &v)?;
        }
        if let Some(v) = get("QC_TARGET_BLOCK_TIME_SECS") {
            self.target_block_time_secs = parse("QC_TARGET_BLOCK_TIME_SECS", &v)?;
        }
        if let Some(v) = get("QC_DEFAULT_DIFFICULTY_BITS") {
            self.default_difficulty_bits = parse("QC_DEFAULT_DIFFICULTY_BITS", &v)?;
        }
        if let Some(v) = get("QC_COINBASE_MATURITY") {
            self.coinbase_maturity = parse("QC_COINBASE_MATURITY", &v)?;
        }
        if let Some(v) = get("QC_REWARD_PCT_MINER") {
            self.reward_pct_miner = parse("QC_REWARD_PCT_MINER", &v)?;
        }
        if let Some(v) = get("QC_REWARD_PCT_STAKE") {
            self.reward_pct_stake = parse("QC_REWARD_PCT_STAKE", &v)?;
        }
        if let Some(v) = get("QC_REWARD_PCT_DEV") {
            self.reward_pct_dev = parse("QC_REWARD_PCT_DEV", &v)?;
        }
        if let Some(v) = get("QC_REWARD_PCT_BURN") {
            self.reward_pct_burn = parse("QC_REWARD_PCT_BURN", &v)?;
        }
        if let Some(v) = get("QC_STAKE_ADDRESS") {
            self.stake_address = v;
        }
        if let Some(v) = get("QC_DEV_ADDRESS") {
            self.dev_address = v;
        }
        if let Some(v) = get("QC_BURN_ADDRESS") {
            self.burn_address = v;
        }
        if let Some(v) = get("QC_COMMUNITY_ADDRESS") {
            self.community_address = v;
        }
        if let Some(v) = get("QC_PREMINE_PERCENT") {
            self.premine_percent = parse("QC_PREMINE_PERCENT", &v)?;
        }
        if let Some(v) = get("QC_PREMINE_ADDRESS") {
            self.premine_address = v;
        }
        if let Some(v) = get("QC_P2P_PORT") {
            self.p2p_port = v;
        }
        if let Some(v) = get("QC_BOOT_PEERS") {
            self.boot_peers = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("QC_CHAIN_FILE") {
            self.chain_file = v;
        }
        if let Some(v) = get("QC_BONUS_FILE") {
            self.bonus_file = v;
        }
        if let Some(v) = get("QC_WALLET_FILE") {
            self.wallet_file = v;
        }
        if let Some(v) = get("QC_LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_difficulty_bits == 0 {
            return Err(CoreError::Config(
                "default_difficulty_bits must be 1..=255".to_string(),
            ));
        }
        let split = self.reward_pct_miner as u32
            + self.reward_pct_stake as u32
            + self.reward_pct_dev as u32
            + self.reward_pct_burn as u32;
        if split > 100 {
            return Err(CoreError::Config(format!(
                "reward percentages sum to {split}, must not exceed 100"
            )));
        }
        if self.premine_percent > 100 {
            return Err(CoreError::Config(
                "premine_percent must not exceed 100".to_string(),
            ));
        }
        if self.http_port.is_empty() || self.p2p_port.is_empty() {
            return Err(CoreError::Config("ports cannot be empty".to_string()));
        }
        self.http_port_number()?;
        self.p2p_port_number()?;
        Ok(())
    }

    /// Whatever the named split leaves over goes to the community pool
    pub fn community_pct(&self) -> u8 {
        let split = self.reward_pct_miner as u32
            + self.reward_pct_stake as u32
            + self.reward_pct_dev as u32
            + self.reward_pct_burn as u32;
        (100u32.saturating_sub(split)) as u8
    }

    pub fn http_port_number(&self) -> Result<u16> {
        parse_port("http_port", &self.http_port)
    }

    pub fn p2p_port_number(&self) -> Result<u16> {
        parse_port("p2p_port", &self.p2p_port)
    }

    /// Premine allocation derived from the cap and percentage; the
    /// dedicated premine address wins over the main address
    pub fn premine(&self) -> Option<(String, Amount)> {
        if self.premine_percent == 0 || self.total_supply == 0 {
            return None;
        }
        let address = if !self.premine_address.is_empty() {
            self.premine_address.clone()
        } else if !self.main_address.is_empty() {
            self.main_address.clone()
        } else {
            return None;
        };
        let amount = self.total_supply / 100 * self.premine_percent as Amount;
        Some((address, amount))
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            initial_reward: self.initial_reward,
            genesis_unix: self.genesis_unix,
            halving_interval_secs: self.halving_interval_secs,
            mining_period_secs: self.mining_period_secs,
            default_difficulty_bits: self.default_difficulty_bits,
            premine: self.premine(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| CoreError::Config(format!("serialize config: {e}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

fn parse_port(field: &str, value: &str) -> Result<u16> {
    value
        .trim_start_matches(':')
        .parse()
        .map_err(|_| CoreError::Config(format!("invalid {field}: {value}")))
}
