//! Poller cursor - tracks the last block fetched from the node.

use serde::{Deserialize, Serialize};

/// The poller's current position in the chain.
///
/// Owned exclusively by the polling task; it is never shared, so it carries
/// no synchronization of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Height of the last successfully fetched block.
    pub block_number: u64,
}

impl Cursor {
    /// Create a cursor positioned at `block_number`.
    pub fn new(block_number: u64) -> Self {
        Self { block_number }
    }

    /// Move the cursor to a newly fetched block.
    ///
    /// Returns `false` (and leaves the cursor alone) unless `block_number` is ahead of it.
    pub fn advance(&mut self, block_number: u64) -> bool {
        if block_number <= self.block_number {
            return false;
        }
        self.block_number = block_number;
        true
    }

    /// Returns the next block to request (cursor + 1).
    pub fn next_block(&self) -> u64 {
        self.block_number.saturating_add(1)
    }
}
