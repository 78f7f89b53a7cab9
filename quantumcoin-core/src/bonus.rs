//! Append-only bonus log
//!
//! `bonus_store.json` holds one JSON record per line. Records are purely
//! informational: they never mint coins and never touch consensus.

use crate::{Amount, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

pub const BONUS_KIND_EVENT: &str = "Event";
pub const BONUS_KIND_YEARLY: &str = "Yearly";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRecord {
    pub address: String,
    pub kind: String,
    pub amount: Amount,
    pub description: String,
    #[serde(default)]
    pub metadata: String,
    pub timestamp: i64,
}

impl BonusRecord {
    pub fn new(address: &str, kind: &str, amount: Amount, description: &str) -> Self {
        Self {
            address: address.to_string(),
            kind: kind.to_string(),
            amount,
            description: description.to_string(),
            metadata: String::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Append one record as a JSON line
pub fn append(path: &Path, record: &BonusRecord) -> Result<()> {
    let line = serde_json::to_string(record)
        .map_err(|e| CoreError::Serialization(format!("bonus record: {e}")))?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// All records, optionally filtered to one address. Unparseable lines are
/// skipped rather than failing the whole read.
pub fn list(path: &Path, address: Option<&str>) -> Result<Vec<BonusRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<BonusRecord>(&line) {
            if address.map_or(true, |a| record.address == a) {
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Latest yearly-bonus year index recorded for an address, if any
pub fn last_yearly_index(path: &Path, address: &str) -> Result<Option<i64>> {
    let records = list(path, Some(address))?;
    Ok(records
        .iter()
        .filter(|r| r.kind == BONUS_KIND_YEARLY)
        .filter_map(|r| r.metadata.parse().ok())
        .max())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bonus_store.json");

        append(&path, &BonusRecord::new("a", BONUS_KIND_EVENT, 5, "welcome")).unwrap();
        append(&path, &BonusRecord::new("b", BONUS_KIND_EVENT, 3, "welcome")).unwrap();
        append(&path, &BonusRecord::new("a", BONUS_KIND_YEARLY, 100, "annual")).unwrap();

        assert_eq!(list(&path, None).unwrap().len(), 3);
        let for_a = list(&path, Some("a")).unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[1].amount, 100);
    }

    #[test]
    fn test_missing_file_lists_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list(&dir.path().join("none.json"), None).unwrap().is_empty());
    }

    #[test]
    fn test_last_yearly_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bonus_store.json");

        let mut record = BonusRecord::new("a", BONUS_KIND_YEARLY, 100, "annual");
        record.metadata = "0".to_string();
        append(&path, &record).unwrap();
        record.metadata = "2".to_string();
        append(&path, &record).unwrap();

        assert_eq!(last_yearly_index(&path, "a").unwrap(), Some(2));
        assert_eq!(last_yearly_index(&path, "b").unwrap(), None);
    }
}
