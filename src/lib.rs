//! # Ledger Chain - A Single-Node Proof-of-Work Ledger
//!
//! Account balances, a pool of pending transfers and a hash-linked chain of
//! blocks sealed by proof of work, all written through to an embedded sled
//! database and recovered from it on startup.
//!
//! ## How the Code Is Organized
//! - `core/`: blocks, transactions, hashing, mining, difficulty, subsidy and
//!   the chain manager tying them together
//! - `storage/`: the sled ledger store and the in-memory transaction pool
//! - `node/`: the thread-safe service every caller goes through
//! - `config/`: TOML and environment configuration
//! - `utils/`: hashing, timestamps and record serialization helpers
//! - `cli/`: command-line interface
//!
//! ## Where to Start
//! 1. `main.rs` for the CLI commands
//! 2. `core/blockchain.rs` for submission, sealing and recovery
//! 3. `storage/ledger_store.rs` for what is written and when
//! 4. `node/service.rs` for how mining and submissions share the chain

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod node;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{AmountPolicy, LedgerConfig};
pub use core::{
    Address, Amount, Block, Blockchain, ChainStatus, ChainView, DifficultyAdjustment, MineOutcome,
    MiningTarget, ProofOfWork, RewardSchedule, SubmitOutcome, Transaction,
};
pub use error::{LedgerError, Result};
pub use node::Node;
pub use storage::{LedgerStore, MemoryPool};
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
