use crate::config::LedgerConfig;
use crate::core::{
    Address, Amount, Blockchain, ChainStatus, ChainView, MineOutcome, SubmitOutcome, Transaction,
};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// A ledger node: one chain behind one lock, shared by every caller.
///
/// Mining snapshots the tip, searches for a proof without holding the lock
/// and seals only if the tip is still the one it searched on. Submissions
/// keep flowing while a search runs.
pub struct Node {
    id: Address,
    ledger: Mutex<Blockchain>,
}

impl Node {
    pub fn open(config: &LedgerConfig) -> Result<Node> {
        let blockchain = Blockchain::open(config)?;
        Self::with_blockchain(blockchain, config.node_id.as_deref())
    }

    /// Wrap an opened chain. Without a configured id the one stored in the
    /// ledger is reused, or a fresh one is generated and stored.
    pub fn with_blockchain(blockchain: Blockchain, configured_id: Option<&str>) -> Result<Node> {
        let id = match configured_id {
            Some(id) => id.to_string(),
            None => match blockchain.get_store().get_node_id()? {
                Some(id) => id,
                None => {
                    let id = Uuid::new_v4().simple().to_string();
                    blockchain.get_store().set_node_id(&id)?;
                    info!("Generated node id {id}");
                    id
                }
            },
        };

        Ok(Node {
            id: Address::new(id)?,
            ledger: Mutex::new(blockchain),
        })
    }

    pub fn id(&self) -> &Address {
        &self.id
    }

    fn lock(&self) -> Result<MutexGuard<'_, Blockchain>> {
        self.ledger
            .lock()
            .map_err(|e| LedgerError::Concurrency(format!("Ledger lock poisoned: {e}")))
    }

    /// Mine one block, paying the subsidy to `miner` or to this node
    pub fn mine(&self, miner: Option<&Address>) -> Result<MineOutcome> {
        self.mine_until_cancelled(miner, &AtomicBool::new(false))
    }

    pub fn mine_until_cancelled(
        &self,
        miner: Option<&Address>,
        cancel: &AtomicBool,
    ) -> Result<MineOutcome> {
        let miner = miner.unwrap_or(&self.id);
        loop {
            let target = self.lock()?.mining_target()?;
            let proof = target.proof_of_work().run_until_cancelled(cancel)?;

            let mut ledger = self.lock()?;
            if ledger.mining_target()? != target {
                warn!(
                    "Block {} was sealed elsewhere during the search, starting over",
                    target.next_index
                );
                continue;
            }
            return ledger.seal_block(proof, miner);
        }
    }

    pub fn submit_transaction(
        &self,
        sender: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> Result<SubmitOutcome> {
        self.lock()?.submit_transaction(sender, recipient, amount)
    }

    pub fn get_chain(&self) -> Result<ChainView> {
        Ok(self.lock()?.get_chain())
    }

    pub fn get_balance(&self, address: &Address) -> Result<Amount> {
        self.lock()?.get_balance(address)
    }

    pub fn get_pending_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.lock()?.get_pending_transactions().to_vec())
    }

    pub fn status(&self) -> Result<ChainStatus> {
        let ledger = self.lock()?;
        Ok(ChainStatus {
            node_id: self.id.to_string(),
            length: ledger.len(),
            difficulty: ledger.get_difficulty(),
            current_supply: ledger.get_current_supply(),
            max_supply: ledger.get_rewards().max_supply(),
            next_reward: ledger.next_reward(),
            pending: ledger.get_pending_transactions().to_vec(),
        })
    }

    pub fn verify_chain(&self) -> Result<()> {
        self.lock()?.verify_chain()
    }
}
