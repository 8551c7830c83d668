//! Row id assignment for one polling cycle.

use crate::checkpoint::Checkpoint;
use crate::types::{BlockId, DecodedEvent, Row, RowPayload};

/// All rows of a cycle plus the checkpoint that follows them.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    pub rows: Vec<Row>,
    pub checkpoint: Checkpoint,
}

/// Assign ids to the events of `blocks`, which must already be in ledger order.
///
/// A block without events still gets exactly one sentinel row, so every
/// visited block is visible in storage. Returns `None` for an empty cycle.
pub fn build_rows(next_row_id: u64, blocks: &[(BlockId, Vec<DecodedEvent>)]) -> Option<RowBatch> {
    let last_block = blocks.last()?.0;
    let mut next = next_row_id;
    let mut rows = Vec::with_capacity(blocks.iter().map(|(_, ev)| ev.len().max(1)).sum());

    for (block_id, events) in blocks {
        if events.is_empty() {
            rows.push(Row {
                id: next,
                block_id: *block_id,
                payload: RowPayload::Sentinel,
            });
            next += 1;
            continue;
        }
        for event in events {
            rows.push(Row {
                id: next,
                block_id: *block_id,
                payload: RowPayload::Event(event.clone()),
            });
            next += 1;
        }
    }

    Some(RowBatch {
        rows,
        checkpoint: Checkpoint::new(next, last_block),
    })
}
