//! Restores ledger order over parallel fetch results.

use std::collections::HashMap;

use crate::error::IndexerError;
use crate::types::{BlockBody, BlockId};

/// Reorder `bodies` to follow `ids` exactly.
///
/// Fetch completion order is arbitrary; storage order must not be.
pub fn sequence(
    ids: &[BlockId],
    mut bodies: HashMap<BlockId, BlockBody>,
) -> Result<Vec<(BlockId, BlockBody)>, IndexerError> {
    ids.iter()
        .map(|&id| {
            bodies
                .remove(&id)
                .map(|body| (id, body))
                .ok_or(IndexerError::MissingBlock(id))
        })
        .collect()
}
