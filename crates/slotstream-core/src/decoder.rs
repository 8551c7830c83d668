//! Program filter and instruction decoding.
//!
//! Every instruction is first matched against the configured program id and
//! only then handed to the schema decoder. Unrelated programs can carry bytes
//! that happen to parse against our schema, so the order matters.

use crate::error::IndexerError;
use crate::types::{AccountKey, BlockBody, DecodedEvent, Transaction};

/// Result of decoding one instruction payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// A variant we persist.
    Relevant {
        schema: String,
        fields_json: serde_json::Value,
    },
    /// A valid variant we do not persist.
    Irrelevant { variant: &'static str },
}

/// A program-specific instruction schema.
pub trait InstructionDecoder: Send + Sync {
    /// Attempt to decode `payload`. Malformed bytes and unknown tags are
    /// [`IndexerError::Decode`].
    fn decode(&self, payload: &[u8]) -> Result<DecodeOutcome, IndexerError>;
}

/// Turns block bodies into ordered events for one target program.
pub struct BlockDecoder {
    program_id: AccountKey,
    decoder: Box<dyn InstructionDecoder>,
}

impl BlockDecoder {
    pub fn new(program_id: impl Into<AccountKey>, decoder: Box<dyn InstructionDecoder>) -> Self {
        Self {
            program_id: program_id.into(),
            decoder,
        }
    }

    pub fn program_id(&self) -> &AccountKey {
        &self.program_id
    }

    /// Decode every relevant instruction in `block`, in transaction then
    /// instruction order. Never fails: bad instructions are logged and skipped.
    pub fn decode_block(&self, block: &BlockBody) -> Vec<DecodedEvent> {
        let mut events = Vec::new();
        for (tx_index, tx) in block.transactions.iter().enumerate() {
            for (ix_index, ix) in tx.instructions.iter().enumerate() {
                match tx.resolve_program(&ix.program) {
                    Some(program) if *program == self.program_id => {}
                    Some(_) => continue,
                    None => {
                        tracing::debug!(
                            block = block.id,
                            tx_index,
                            ix_index,
                            "program index out of range"
                        );
                        continue;
                    }
                }

                match self.decoder.decode(&ix.payload) {
                    Ok(DecodeOutcome::Relevant {
                        schema,
                        fields_json,
                    }) => events.push(DecodedEvent {
                        schema,
                        tx_index: tx_index as u32,
                        instruction_index: ix_index as u32,
                        signature: tx.signature.clone(),
                        accounts: resolve_accounts(tx, &ix.accounts),
                        fields_json,
                    }),
                    Ok(DecodeOutcome::Irrelevant { variant }) => {
                        tracing::trace!(block = block.id, tx_index, variant, "irrelevant instruction");
                    }
                    Err(e) => {
                        tracing::warn!(
                            block = block.id,
                            tx_index,
                            ix_index,
                            error = %e,
                            "skipping undecodable instruction"
                        );
                    }
                }
            }
        }
        events
    }
}

/// Map instruction account indices to keys, dropping out-of-range indices.
fn resolve_accounts(tx: &Transaction, indices: &[usize]) -> Vec<AccountKey> {
    indices
        .iter()
        .filter_map(|&i| tx.accounts.get(i).cloned())
        .collect()
}
