//! Core ledger functionality
//!
//! This module contains the fundamental ledger components including
//! blocks, transactions, hashing, the chain manager, and proof-of-work
//! consensus with its difficulty and subsidy schedules.

pub mod block;
pub mod blockchain;
pub mod difficulty;
pub mod hasher;
pub mod monetary;
pub mod outcome;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
pub use blockchain::{Blockchain, MiningTarget};
pub use difficulty::DifficultyAdjustment;
pub use hasher::{canonical_bytes, hash_block};
pub use monetary::{Amount, RewardSchedule, HALVING_INTERVAL, INITIAL_BLOCK_REWARD, MAX_SUPPLY};
pub use outcome::{ChainStatus, ChainView, MineOutcome, SubmitOutcome};
pub use proof_of_work::{ProofOfWork, ProofSearch};
pub use transaction::{Address, Transaction, MINT_SENDER};
