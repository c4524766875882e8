//! Data storage and persistence
//!
//! The sled-backed ledger store the chain writes through, and the in-memory
//! pool of transactions waiting for the next block.

pub mod ledger_store;
pub mod memory_pool;

pub use ledger_store::{BlockRecord, LedgerStore, TransactionRecord};
pub use memory_pool::MemoryPool;
