// Durable side of the ledger. Three sled trees mirror the tables the ledger
// writes through: balances (upserted), blocks and transactions (append-only).
// Block payloads are not duplicated into the blocks tree; they are rebuilt
// from the transactions tree by block index.

use crate::core::{Address, Amount, Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use log::debug;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const BALANCES_TREE: &str = "balances";
const BLOCKS_TREE: &str = "blocks";
const TRANSACTIONS_TREE: &str = "transactions";
const META_TREE: &str = "meta";

const NODE_ID_KEY: &str = "node_id";

// sled releases its file lock from background threads after the last handle
// is dropped, so a reopen in the same process can briefly find it held
const OPEN_ATTEMPTS: u32 = 20;
const OPEN_BACKOFF: Duration = Duration::from_millis(25);

type CommitResult<T> = ConflictableTransactionResult<T, LedgerError>;

/// Row of the blocks table
#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: f64,
    pub proof: u64,
    pub previous_hash: String,
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        BlockRecord {
            index: block.get_index(),
            timestamp: block.get_timestamp(),
            proof: block.get_proof(),
            previous_hash: block.get_previous_hash().to_string(),
        }
    }
}

/// Row of the transactions table
#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct TransactionRecord {
    /// Block the transaction was committed for
    pub block_index: u64,
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub timestamp: f64,
    /// Set on the mining subsidy only; mint-sender submissions are not supply
    pub subsidy: bool,
}

impl TransactionRecord {
    pub fn new(tx: &Transaction, block_index: u64, subsidy: bool) -> TransactionRecord {
        TransactionRecord {
            block_index,
            sender: tx.get_sender().clone(),
            recipient: tx.get_recipient().clone(),
            amount: tx.get_amount(),
            timestamp: tx.get_timestamp(),
            subsidy,
        }
    }

    pub fn to_transaction(&self) -> Transaction {
        Transaction::from_parts(
            self.sender.clone(),
            self.recipient.clone(),
            self.amount,
            self.timestamp,
        )
    }
}

#[derive(Clone)]
pub struct LedgerStore {
    db: Db,
    balances: Tree,
    blocks: Tree,
    transactions: Tree,
    meta: Tree,
    path: PathBuf,
}

impl LedgerStore {
    pub fn open(path: &Path) -> Result<LedgerStore> {
        let db = open_db(path)?;
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| LedgerError::Database(format!("Failed to open {name} tree: {e}")))
        };

        Ok(LedgerStore {
            balances: open_tree(BALANCES_TREE)?,
            blocks: open_tree(BLOCKS_TREE)?,
            transactions: open_tree(TRANSACTIONS_TREE)?,
            meta: open_tree(META_TREE)?,
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    /// Balance of `address`; zero when the address has never been touched
    pub fn get_balance(&self, address: &Address) -> Result<Amount> {
        match self
            .balances
            .get(address.as_str())
            .map_err(|e| LedgerError::Database(format!("Failed to read balance: {e}")))?
        {
            Some(bytes) => decode_balance(&bytes),
            None => Ok(Amount::ZERO),
        }
    }

    /// Add `delta` to the stored balance and return the new value.
    /// A negative result is written as-is; callers check sufficiency first.
    pub fn update_balance(&self, address: &Address, delta: Amount) -> Result<Amount> {
        let updated = self
            .balances
            .transaction(|balances| apply_delta(balances, address, delta))
            .map_err(commit_error)?;
        self.flush()?;
        Ok(updated)
    }

    pub fn append_block_record(&self, block: &Block) -> Result<()> {
        let value = serialize(&BlockRecord::from(block))?;
        self.blocks
            .insert(block.get_index().to_be_bytes(), value)
            .map_err(|e| LedgerError::Database(format!("Failed to append block: {e}")))?;
        self.flush()
    }

    pub fn append_transaction_record(&self, tx: &Transaction, block_index: u64) -> Result<()> {
        let key = self.next_transaction_key()?;
        let value = serialize(&TransactionRecord::new(tx, block_index, false))?;
        self.transactions
            .insert(key, value)
            .map_err(|e| LedgerError::Database(format!("Failed to append transaction: {e}")))?;
        self.flush()
    }

    /// Debit the sender (unless minting), credit the recipient and log the
    /// transaction, all or nothing.
    ///
    /// A flush failure after the commit is reported as a
    /// [`LedgerError::Database`] saying so; the store is then ahead of any
    /// in-memory state built on it, which must be reopened, not retried.
    pub fn commit_transfer(&self, tx: &Transaction, block_index: u64) -> Result<()> {
        let key = self.next_transaction_key()?;
        let value = serialize(&TransactionRecord::new(tx, block_index, false))?;

        (&self.balances, &self.transactions)
            .transaction(|(balances, transactions)| -> CommitResult<()> {
                if !tx.is_mint() {
                    apply_delta(balances, tx.get_sender(), -tx.get_amount())?;
                }
                apply_delta(balances, tx.get_recipient(), tx.get_amount())?;
                transactions.insert(&key[..], value.as_slice())?;
                Ok(())
            })
            .map_err(commit_error)?;

        debug!(
            "Committed transfer of {} from {} to {} for block {block_index}",
            tx.get_amount(),
            tx.get_sender(),
            tx.get_recipient()
        );
        self.flush_committed()
    }

    /// Credit the miner, log the subsidy and append the block, all or nothing
    pub fn commit_seal(&self, block: &Block, subsidy: &Transaction) -> Result<()> {
        let tx_key = self.next_transaction_key()?;
        let tx_value = serialize(&TransactionRecord::new(subsidy, block.get_index(), true))?;
        let block_key = block.get_index().to_be_bytes();
        let block_value = serialize(&BlockRecord::from(block))?;

        (&self.balances, &self.transactions, &self.blocks)
            .transaction(|(balances, transactions, blocks)| -> CommitResult<()> {
                apply_delta(balances, subsidy.get_recipient(), subsidy.get_amount())?;
                transactions.insert(&tx_key[..], tx_value.as_slice())?;
                blocks.insert(&block_key[..], block_value.as_slice())?;
                Ok(())
            })
            .map_err(commit_error)?;

        self.flush_committed()
    }

    /// Every block record in index order
    pub fn load_block_records(&self) -> Result<Vec<BlockRecord>> {
        self.blocks
            .iter()
            .values()
            .map(|item| {
                let bytes = item
                    .map_err(|e| LedgerError::Database(format!("Failed to read block: {e}")))?;
                deserialize::<BlockRecord>(&bytes)
            })
            .collect()
    }

    /// Every transaction record in commit order
    pub fn load_transaction_records(&self) -> Result<Vec<TransactionRecord>> {
        self.transactions
            .iter()
            .values()
            .map(|item| {
                let bytes = item.map_err(|e| {
                    LedgerError::Database(format!("Failed to read transaction: {e}"))
                })?;
                deserialize::<TransactionRecord>(&bytes)
            })
            .collect()
    }

    pub fn has_blocks(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn get_node_id(&self) -> Result<Option<String>> {
        let value = self
            .meta
            .get(NODE_ID_KEY)
            .map_err(|e| LedgerError::Database(format!("Failed to read node id: {e}")))?;
        value
            .map(|bytes| {
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| LedgerError::Database(format!("Invalid node id format: {e}")))
            })
            .transpose()
    }

    pub fn set_node_id(&self, node_id: &str) -> Result<()> {
        self.meta
            .insert(NODE_ID_KEY, node_id.as_bytes())
            .map_err(|e| LedgerError::Database(format!("Failed to store node id: {e}")))?;
        self.flush()
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| LedgerError::Database(format!("Failed to flush database: {e}")))?;
        Ok(())
    }

    // The commit already landed; only durability of it is in doubt
    fn flush_committed(&self) -> Result<()> {
        self.db.flush().map_err(flush_after_commit_error)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn remove_block_record(&self, index: u64) -> Result<()> {
        self.blocks.remove(index.to_be_bytes())?;
        self.flush()
    }

    // Big-endian ids keep sled's key order equal to commit order
    fn next_transaction_key(&self) -> Result<[u8; 8]> {
        let id = self
            .db
            .generate_id()
            .map_err(|e| LedgerError::Database(format!("Failed to allocate record id: {e}")))?;
        Ok(id.to_be_bytes())
    }
}

fn open_db(path: &Path) -> Result<Db> {
    let mut attempt = 1;
    loop {
        match sled::open(path) {
            Ok(db) => return Ok(db),
            Err(sled::Error::Io(e)) if is_lock_contention(&e) && attempt < OPEN_ATTEMPTS => {
                debug!(
                    "Database at {} is still locked (attempt {attempt}), retrying",
                    path.display()
                );
                thread::sleep(OPEN_BACKOFF * attempt);
                attempt += 1;
            }
            Err(e) => {
                return Err(LedgerError::Database(format!(
                    "Failed to open database: {e}"
                )))
            }
        }
    }
}

// sled reports a held file lock as an `Other` io error wrapping the
// underlying `WouldBlock`
fn is_lock_contention(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.to_string().contains("could not acquire lock")
}

fn flush_after_commit_error(err: sled::Error) -> LedgerError {
    LedgerError::Database(format!(
        "Committed but failed to flush: {err}; in-memory state is stale, reopen the ledger before retrying"
    ))
}

fn decode_balance(bytes: &[u8]) -> Result<Amount> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        LedgerError::Database(format!("Balance entry has {} bytes, expected 8", bytes.len()))
    })?;
    Amount::new(f64::from_be_bytes(raw))
}

fn apply_delta(
    balances: &TransactionalTree,
    address: &Address,
    delta: Amount,
) -> CommitResult<Amount> {
    let current = match balances.get(address.as_str())? {
        Some(bytes) => decode_balance(&bytes).map_err(ConflictableTransactionError::Abort)?,
        None => Amount::ZERO,
    };
    let updated = current + delta;
    balances.insert(address.as_str(), &updated.value().to_be_bytes()[..])?;
    Ok(updated)
}

fn commit_error(err: TransactionError<LedgerError>) -> LedgerError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => {
            LedgerError::Database(format!("Failed to commit to the ledger store: {e}"))
        }
    }
}
