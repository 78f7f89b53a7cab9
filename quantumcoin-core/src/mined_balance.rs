//! Cumulative miner tally
//!
//! `mined_balance.json` tracks one address and its lifetime mined total.
//! Pointing the tally at a different address resets the counter. The file
//! is informational only and never feeds back into consensus.

use crate::{Amount, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedBalance {
    pub address: String,
    pub balance: Amount,
    pub updated: i64,
}

/// Read the tally, treating a missing or unreadable file as empty
pub fn load(path: &Path) -> MinedBalance {
    fs::read(path)
        .ok()
        .and_then(|data| serde_json::from_slice(&data).ok())
        .unwrap_or_default()
}

/// Add `delta` to the tally for `address`, atomically rewriting the file
pub fn add_mined(path: &Path, address: &str, delta: Amount) -> Result<()> {
    let address = address.trim();
    if address.is_empty() || delta == 0 {
        return Ok(());
    }

    let mut tally = load(path);
    if !tally.address.eq_ignore_ascii_case(address) {
        tally.address = address.to_string();
        tally.balance = 0;
    }
    tally.balance += delta;
    tally.updated = chrono::Utc::now().timestamp();

    let data = serde_json::to_vec_pretty(&tally)
        .map_err(|e| CoreError::Serialization(format!("mined balance: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_accumulates_for_one_address() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mined_balance.json");

        add_mined(&path, "addr-a", 50).unwrap();
        add_mined(&path, "addr-a", 25).unwrap();

        let tally = load(&path);
        assert_eq!(tally.address, "addr-a");
        assert_eq!(tally.balance, 75);
        assert!(tally.updated > 0);
    }

    #[test]
    fn test_switching_address_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mined_balance.json");

        add_mined(&path, "addr-a", 50).unwrap();
        add_mined(&path, "addr-b", 10).unwrap();

        let tally = load(&path);
        assert_eq!(tally.address, "addr-b");
        assert_eq!(tally.balance, 10);
    }

    #[test]
    fn test_empty_address_or_zero_delta_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mined_balance.json");

        add_mined(&path, "  ", 50).unwrap();
        add_mined(&path, "addr-a", 0).unwrap();
        assert!(!path.exists());
    }
}
