//! `getBlock` response parsing.
//!
//! Only the `"json"` transaction encoding is understood. Versioned
//! transactions index into the static account keys followed by the
//! writable and then readonly addresses loaded from lookup tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use slotstream_core::error::IndexerError;
use slotstream_core::types::{AccountKey, BlockBody, BlockId, Instruction, ProgramRef, Transaction};

/// A block as returned by `getBlock` with `transactionDetails: "full"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(default)]
    pub blockhash: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<RawTransactionWithMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransactionWithMeta {
    pub transaction: RawTransaction,
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: RawMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub account_keys: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    pub program_id_index: usize,
    #[serde(default)]
    pub accounts: Vec<usize>,
    /// Base58-encoded instruction data.
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    #[serde(default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

impl RawTransactionWithMeta {
    fn into_transaction(self, slot: BlockId) -> Transaction {
        let RawTransaction {
            signatures,
            message,
        } = self.transaction;

        let mut accounts: Vec<AccountKey> =
            message.account_keys.into_iter().map(AccountKey).collect();
        if let Some(loaded) = self.meta.and_then(|m| m.loaded_addresses) {
            accounts.extend(loaded.writable.into_iter().map(AccountKey));
            accounts.extend(loaded.readonly.into_iter().map(AccountKey));
        }

        let signature = signatures.into_iter().next();
        let instructions = message
            .instructions
            .into_iter()
            .map(|ix| {
                let payload = bs58::decode(&ix.data).into_vec().unwrap_or_else(|e| {
                    tracing::debug!(slot, signature = ?signature, error = %e, "instruction data is not base58");
                    Vec::new()
                });
                Instruction {
                    program: ProgramRef::Index(ix.program_id_index),
                    accounts: ix.accounts,
                    payload,
                }
            })
            .collect();

        Transaction {
            signature,
            accounts,
            instructions,
        }
    }
}

impl RawBlock {
    pub fn into_body(self, slot: BlockId) -> BlockBody {
        BlockBody {
            id: slot,
            blockhash: self.blockhash,
            block_time: self.block_time,
            transactions: self
                .transactions
                .into_iter()
                .map(|t| t.into_transaction(slot))
                .collect(),
        }
    }
}

/// Parse a `getBlock` result into a [`BlockBody`] for `slot`.
pub fn block_from_json(slot: BlockId, v: Value) -> Result<BlockBody, IndexerError> {
    if v.is_null() {
        return Err(IndexerError::Malformed(format!("slot {slot}: null block")));
    }
    let raw: RawBlock = serde_json::from_value(v)
        .map_err(|e| IndexerError::Malformed(format!("slot {slot}: {e}")))?;
    Ok(raw.into_body(slot))
}
