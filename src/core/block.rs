use crate::core::{hasher, Transaction};
use crate::error::Result;
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};

/// Index of the first block in every chain
pub const GENESIS_INDEX: u64 = 1;

/// Fixed proof sealed into the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// Stand-in for the hash of the block before genesis
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: f64,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
}

impl Block {
    /// Seal a block at the current wall-clock time
    pub(crate) fn new_block(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Result<Block> {
        Ok(Block {
            index,
            timestamp: current_timestamp()?,
            transactions,
            proof,
            previous_hash,
        })
    }

    pub(crate) fn generate_genesis_block() -> Result<Block> {
        Self::new_block(
            GENESIS_INDEX,
            Vec::new(),
            GENESIS_PROOF,
            String::from(GENESIS_PREVIOUS_HASH),
        )
    }

    /// Rebuild a block from its stored record and its transactions
    pub(crate) fn from_parts(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Block {
        Block {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Create a test block with a custom timestamp (for testing only)
    #[cfg(test)]
    pub(crate) fn new_test_block(index: u64, timestamp: f64) -> Block {
        Block::from_parts(index, timestamp, Vec::new(), 0, String::from("test_prev_hash"))
    }

    pub fn hash(&self) -> Result<String> {
        hasher::hash_block(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == GENESIS_INDEX
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_proof(&self) -> u64 {
        self.proof
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::generate_genesis_block().unwrap();

        assert!(genesis.is_genesis());
        assert_eq!(genesis.get_index(), 1);
        assert_eq!(genesis.get_proof(), 100);
        assert_eq!(genesis.get_previous_hash(), "1");
        assert!(genesis.get_transactions().is_empty());
    }

    #[test]
    fn test_hash_depends_on_timestamp() {
        let a = Block::new_test_block(3, 10.0);
        let b = Block::new_test_block(3, 10.5);
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
        assert_eq!(a.hash().unwrap(), a.clone().hash().unwrap());
    }
}
