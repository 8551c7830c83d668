//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// Ledger slot number. Monotonically increasing and totally ordered.
pub type BlockId = u64;

// ─── AccountKey ───────────────────────────────────────────────────────────────

/// A base58-encoded account public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(pub String);

impl AccountKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ─── Block / Transaction / Instruction ───────────────────────────────────────

/// How an instruction names the program it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramRef {
    /// The program key itself.
    Key(AccountKey),
    /// Index into the enclosing transaction's account list.
    Index(usize),
}

/// A single instruction inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program: ProgramRef,
    /// Indices into the transaction's account list.
    pub accounts: Vec<usize>,
    /// Raw instruction data.
    pub payload: Vec<u8>,
}

/// A transaction as seen by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// First signature, when the ledger returned one.
    pub signature: Option<String>,
    /// Static keys followed by any loaded (lookup table) addresses.
    pub accounts: Vec<AccountKey>,
    pub instructions: Vec<Instruction>,
}

impl Transaction {
    /// Resolve an instruction's program reference against this transaction.
    ///
    /// Returns `None` if an index points past the end of the account list.
    pub fn resolve_program<'a>(&'a self, program: &'a ProgramRef) -> Option<&'a AccountKey> {
        match program {
            ProgramRef::Key(key) => Some(key),
            ProgramRef::Index(idx) => self.accounts.get(*idx),
        }
    }
}

/// The body of one fetched block. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    pub id: BlockId,
    pub blockhash: Option<String>,
    /// Unix timestamp of the block, if the ledger reports one.
    pub block_time: Option<i64>,
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    /// A block with no metadata, used by adapters and tests.
    pub fn new(id: BlockId, transactions: Vec<Transaction>) -> Self {
        Self {
            id,
            blockhash: None,
            block_time: None,
            transactions,
        }
    }
}

// ─── DecodedEvent ─────────────────────────────────────────────────────────────

/// A relevant instruction after schema decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Variant name of the decoded instruction (e.g. `"MakeChoice"`).
    pub schema: String,
    /// Position of the transaction within its block.
    pub tx_index: u32,
    /// Position of the instruction within its transaction.
    pub instruction_index: u32,
    pub signature: Option<String>,
    /// Instruction accounts resolved to keys, in instruction order.
    pub accounts: Vec<AccountKey>,
    /// Decoded fields.
    pub fields_json: serde_json::Value,
}

// ─── Row ──────────────────────────────────────────────────────────────────────

/// What a persisted row carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowPayload {
    Event(DecodedEvent),
    /// The block was visited and yielded no relevant events.
    Sentinel,
}

impl RowPayload {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Sentinel)
    }
}

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    pub block_id: BlockId,
    pub payload: RowPayload,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> Transaction {
        Transaction {
            signature: None,
            accounts: vec!["payer".into(), "program".into()],
            instructions: vec![],
        }
    }

    #[test]
    fn resolve_program_by_index() {
        let t = tx();
        let key = t.resolve_program(&ProgramRef::Index(1)).unwrap();
        assert_eq!(key.as_str(), "program");
    }

    #[test]
    fn resolve_program_out_of_bounds() {
        let t = tx();
        assert!(t.resolve_program(&ProgramRef::Index(2)).is_none());
    }

    #[test]
    fn resolve_program_direct_key() {
        let t = tx();
        let program = ProgramRef::Key("elsewhere".into());
        assert_eq!(t.resolve_program(&program).unwrap().as_str(), "elsewhere");
    }

    #[test]
    fn sentinel_payload_json() {
        let json = serde_json::to_string(&RowPayload::Sentinel).unwrap();
        assert_eq!(json, r#"{"kind":"sentinel"}"#);
    }
}
