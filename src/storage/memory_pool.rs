use crate::core::Transaction;

/// Pending transactions in submission order.
///
/// The order transactions are added in is the order they appear in the next
/// sealed block. Entries leave the pool only by being drained into a block.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    pending: Vec<Transaction>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            pending: Vec::new(),
        }
    }

    /// Pool restored from transactions that were committed but not yet sealed
    pub fn from_pending(pending: Vec<Transaction>) -> MemoryPool {
        MemoryPool { pending }
    }

    pub fn add(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    pub fn get_all(&self) -> &[Transaction] {
        self.pending.as_slice()
    }

    /// Copy of the pool as it stands, for building a block
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    /// Empty the pool, handing back its contents in order
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
