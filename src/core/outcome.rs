//! What the ledger reports back to its callers.
//!
//! Insufficient balance and an exhausted supply are ordinary answers, so they
//! are outcomes rather than errors.

use crate::core::{Amount, Block, Transaction};
use serde::Serialize;

/// Result of one mining attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MineOutcome {
    Sealed {
        block: Block,
        difficulty: u32,
        reward: Amount,
        current_supply: Amount,
    },
    /// Sealing would have pushed supply over the cap; nothing changed
    SupplyExhausted {
        difficulty: u32,
        current_supply: Amount,
    },
}

impl MineOutcome {
    pub fn is_sealed(&self) -> bool {
        matches!(self, MineOutcome::Sealed { .. })
    }

    pub fn block(&self) -> Option<&Block> {
        match self {
            MineOutcome::Sealed { block, .. } => Some(block),
            MineOutcome::SupplyExhausted { .. } => None,
        }
    }

    pub fn difficulty(&self) -> u32 {
        match self {
            MineOutcome::Sealed { difficulty, .. }
            | MineOutcome::SupplyExhausted { difficulty, .. } => *difficulty,
        }
    }

    pub fn current_supply(&self) -> Amount {
        match self {
            MineOutcome::Sealed { current_supply, .. }
            | MineOutcome::SupplyExhausted { current_supply, .. } => *current_supply,
        }
    }
}

/// Result of a transaction submission
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Committed; expected to land in this block (not a guarantee)
    Accepted { expected_block_index: u64 },
    /// Rejected before any state changed
    InsufficientBalance { available: Amount, required: Amount },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

/// The full chain as handed to readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainView {
    pub chain: Vec<Block>,
    pub length: usize,
}

/// Snapshot of the ledger's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStatus {
    pub node_id: String,
    pub length: usize,
    pub difficulty: u32,
    pub current_supply: Amount,
    pub max_supply: Amount,
    pub next_reward: Amount,
    pub pending: Vec<Transaction>,
}
