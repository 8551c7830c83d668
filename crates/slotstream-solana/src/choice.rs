//! Instruction schema of the choice program.
//!
//! Payloads are borsh-encoded: a one-byte variant tag followed by the
//! variant's fields. Only `MakeChoice` is persisted.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use slotstream_core::decoder::{DecodeOutcome, InstructionDecoder};
use slotstream_core::error::IndexerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BlockChoices {
    pub num_choices: u32,
    pub choices: Vec<Choice>,
    pub weights: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChoiceData {
    pub blocks_to_process: u32,
    pub all_choices: Vec<BlockChoices>,
}

/// Every instruction the choice program accepts.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ChoiceInstruction {
    InitDataAccount,
    MakeChoice { choice: Choice },
    HandleChoices { choice_data: ChoiceData },
}

impl ChoiceInstruction {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::InitDataAccount => "InitDataAccount",
            Self::MakeChoice { .. } => "MakeChoice",
            Self::HandleChoices { .. } => "HandleChoices",
        }
    }
}

/// [`InstructionDecoder`] for [`ChoiceInstruction`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ChoiceDecoder;

impl InstructionDecoder for ChoiceDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodeOutcome, IndexerError> {
        let ix: ChoiceInstruction =
            borsh::from_slice(payload).map_err(|e| IndexerError::Decode(e.to_string()))?;
        Ok(match ix {
            ChoiceInstruction::MakeChoice { choice } => DecodeOutcome::Relevant {
                schema: "MakeChoice".into(),
                fields_json: serde_json::json!({ "choice": choice }),
            },
            other => DecodeOutcome::Irrelevant {
                variant: other.variant_name(),
            },
        })
    }
}
