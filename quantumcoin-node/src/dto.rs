//! HTTP transfer objects
//!
//! Binary fields travel as hex, timestamps as RFC 3339. Conversion is
//! strict: malformed hex or timestamps are rejected before anything touches
//! the chain.

use quantumcoin_core::{
    Block, CoreError, Hash256Ext, Transaction, TransactionInput, TransactionOutput,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInputDto {
    pub tx_id: String,
    pub out_index: u32,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub pubkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutputDto {
    pub amount: u64,
    pub pubkey_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDto {
    pub id: String,
    pub inputs: Vec<TxInputDto>,
    pub outputs: Vec<TxOutputDto>,
    /// RFC 3339
    pub timestamp: String,
    pub sender: String,
    pub amount: u64,
}

impl From<&Transaction> for TransactionDto {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: hex::encode(&tx.id),
            inputs: tx
                .inputs
                .iter()
                .map(|input| TxInputDto {
                    tx_id: hex::encode(input.tx_id),
                    out_index: input.out_index,
                    signature: hex::encode(&input.signature),
                    pubkey: hex::encode(&input.pubkey),
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| TxOutputDto {
                    amount: output.amount,
                    pubkey_hash: hex::encode(output.pubkey_hash),
                })
                .collect(),
            timestamp: rfc3339(tx.timestamp),
            sender: tx.sender.clone(),
            amount: tx.amount,
        }
    }
}

impl TryFrom<TransactionDto> for Transaction {
    type Error = CoreError;

    fn try_from(dto: TransactionDto) -> Result<Self, CoreError> {
        let id = hex::decode(&dto.id).map_err(|_| CoreError::InvalidTxIdHex(dto.id.clone()))?;

        let mut inputs = Vec::with_capacity(dto.inputs.len());
        for input in dto.inputs {
            inputs.push(TransactionInput {
                tx_id: quantumcoin_core::Hash256::from_hex(&input.tx_id)?,
                out_index: input.out_index,
                signature: hex::decode(&input.signature)
                    .map_err(|e| CoreError::Serialization(format!("signature hex: {e}")))?,
                pubkey: hex::decode(&input.pubkey)
                    .map_err(|e| CoreError::Serialization(format!("pubkey hex: {e}")))?,
            });
        }

        let mut outputs = Vec::with_capacity(dto.outputs.len());
        for output in dto.outputs {
            let bytes = hex::decode(&output.pubkey_hash)
                .map_err(|e| CoreError::Serialization(format!("pubkey_hash hex: {e}")))?;
            let pubkey_hash: [u8; 20] = bytes
                .try_into()
                .map_err(|_| CoreError::Serialization("pubkey_hash must be 20 bytes".to_string()))?;
            outputs.push(TransactionOutput {
                amount: output.amount,
                pubkey_hash,
            });
        }

        Ok(Transaction {
            id,
            inputs,
            outputs,
            timestamp: parse_rfc3339(&dto.timestamp)?,
            sender: dto.sender,
            amount: dto.amount,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockSummaryDto {
    pub index: u32,
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: String,
    pub miner: String,
    pub difficulty: u8,
    pub nonce: u64,
    pub tx_count: usize,
}

impl From<&Block> for BlockSummaryDto {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: hex::encode(block.hash),
            prev_hash: hex::encode(block.prev_hash),
            timestamp: rfc3339(block.timestamp),
            miner: block.miner.clone(),
            difficulty: block.difficulty,
            nonce: block.nonce,
            tx_count: block.transactions.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockDetailDto {
    #[serde(flatten)]
    pub summary: BlockSummaryDto,
    pub transactions: Vec<TransactionDto>,
}

impl From<&Block> for BlockDetailDto {
    fn from(block: &Block) -> Self {
        Self {
            summary: BlockSummaryDto::from(block),
            transactions: block.transactions.iter().map(TransactionDto::from).collect(),
        }
    }
}

fn rfc3339(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339()
}

fn parse_rfc3339(value: &str) -> Result<i64, CoreError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|e| CoreError::Serialization(format!("timestamp: {e}")))
}
