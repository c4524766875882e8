// This is the chain manager - it owns the chain, the pending pool and the
// supply counters. Every change goes through the ledger store first and only
// touches memory once the durable write succeeded.

use crate::config::{AmountPolicy, LedgerConfig};
use crate::core::block::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::core::{
    Address, Amount, Block, ChainView, DifficultyAdjustment, MineOutcome, ProofOfWork,
    RewardSchedule, SubmitOutcome, Transaction,
};
use crate::error::{LedgerError, Result};
use crate::storage::{LedgerStore, MemoryPool};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Everything a miner needs to search for the next proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningTarget {
    pub next_index: u64,
    pub last_proof: u64,
    pub difficulty: u32,
}

impl MiningTarget {
    pub fn proof_of_work(&self) -> ProofOfWork {
        ProofOfWork::new(self.last_proof, self.difficulty)
    }
}

pub struct Blockchain {
    blocks: Vec<Block>,       // Genesis first, never empty once opened
    pool: MemoryPool,         // Transactions waiting for the next block
    store: LedgerStore,       // Durable balances, blocks and transactions
    difficulty: u32,          // Leading zero hex digits required right now
    initial_difficulty: u32,  // Difficulty before any adjustment, for replays
    current_supply: Amount,   // Total minted by mining so far
    rewards: RewardSchedule,
    adjustment: DifficultyAdjustment,
    amount_policy: AmountPolicy,
}

impl Blockchain {
    // When I want a ledger at the configured path, created or recovered
    pub fn open(config: &LedgerConfig) -> Result<Blockchain> {
        config.validate()?;
        let store = LedgerStore::open(&config.db_path)?;
        Self::open_with_store(store, config)
    }

    pub fn open_with_store(store: LedgerStore, config: &LedgerConfig) -> Result<Blockchain> {
        config.validate()?;
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            pool: MemoryPool::new(),
            store,
            difficulty: config.initial_difficulty,
            initial_difficulty: config.initial_difficulty,
            current_supply: Amount::ZERO,
            rewards: config.reward_schedule()?,
            adjustment: config.difficulty_adjustment(),
            amount_policy: config.amount_policy,
        };

        if blockchain.store.has_blocks() {
            blockchain.recover()?;
        } else {
            blockchain.create_genesis()?;
        }
        Ok(blockchain)
    }

    fn create_genesis(&mut self) -> Result<()> {
        let genesis = Block::generate_genesis_block()?;
        self.store.append_block_record(&genesis)?;
        info!(
            "Created genesis block at {} in {}",
            genesis.get_timestamp(),
            self.store.get_path().display()
        );
        self.blocks.push(genesis);
        Ok(())
    }

    // Rebuild the in-memory state from the store: blocks get their
    // transactions back by block index, anything committed for a block that
    // was never sealed goes back into the pool.
    fn recover(&mut self) -> Result<()> {
        let records = self.store.load_block_records()?;

        let mut by_block: BTreeMap<u64, Vec<Transaction>> = BTreeMap::new();
        let mut rewarded = BTreeSet::new();
        let mut supply = Amount::ZERO;
        for record in self.store.load_transaction_records()? {
            if record.subsidy {
                supply = supply + record.amount;
                rewarded.insert(record.block_index);
            }
            by_block
                .entry(record.block_index)
                .or_default()
                .push(record.to_transaction());
        }

        let mut blocks = Vec::with_capacity(records.len());
        for record in records {
            let transactions = by_block.remove(&record.index).unwrap_or_default();
            blocks.push(Block::from_parts(
                record.index,
                record.timestamp,
                transactions,
                record.proof,
                record.previous_hash,
            ));
        }
        check_linkage(&blocks)?;

        let next_index = blocks.len() as u64 + GENESIS_INDEX;
        let pending = by_block.split_off(&next_index);
        if let Some(orphan) = by_block.keys().next() {
            return Err(LedgerError::InvalidBlock(format!(
                "Transactions recorded for block {orphan}, which is not in the chain"
            )));
        }
        // a subsidy is only ever written together with its block
        if let Some(missing) = rewarded.range(next_index..).next() {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {missing} paid a subsidy but has no block record"
            )));
        }
        let pending: Vec<Transaction> = pending.into_values().flatten().collect();

        let schedule = self.adjustment.replay(&blocks, self.initial_difficulty);
        self.difficulty = schedule.last().copied().unwrap_or(self.initial_difficulty);
        self.current_supply = supply;
        self.pool = MemoryPool::from_pending(pending);
        self.blocks = blocks;

        info!(
            "Recovered chain of {} blocks (difficulty: {}, supply: {}, pending: {})",
            self.blocks.len(),
            self.difficulty,
            self.current_supply,
            self.pool.len()
        );
        Ok(())
    }

    pub fn last_block(&self) -> Result<&Block> {
        self.blocks
            .last()
            .ok_or_else(|| LedgerError::InvalidBlock("Chain has no genesis block".to_string()))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn get_chain(&self) -> ChainView {
        ChainView {
            chain: self.blocks.clone(),
            length: self.blocks.len(),
        }
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_current_supply(&self) -> Amount {
        self.current_supply
    }

    pub fn get_rewards(&self) -> &RewardSchedule {
        &self.rewards
    }

    /// Subsidy the next sealed block would pay
    pub fn next_reward(&self) -> Amount {
        self.rewards.reward(self.blocks.len())
    }

    pub fn get_pending_transactions(&self) -> &[Transaction] {
        self.pool.get_all()
    }

    pub fn get_store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn get_balance(&self, address: &Address) -> Result<Amount> {
        self.store.get_balance(address)
    }

    // When someone wants to move funds: check, commit durably, then queue.
    // A Database error after the commit means the store moved on without
    // this chain, so I reopen rather than retry.
    pub fn submit_transaction(
        &mut self,
        sender: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> Result<SubmitOutcome> {
        self.amount_policy.check(amount)?;

        if !sender.is_mint() {
            let available = self.store.get_balance(sender)?;
            if available < amount {
                warn!("Rejected transfer of {amount} from {sender}: balance is {available}");
                return Ok(SubmitOutcome::InsufficientBalance {
                    available,
                    required: amount,
                });
            }
        }

        let transaction = Transaction::new(sender.clone(), recipient.clone(), amount)?;
        let expected_block_index = self.blocks.len() as u64 + 1;
        self.store
            .commit_transfer(&transaction, expected_block_index)?;
        self.pool.add(transaction);

        debug!("Queued transfer of {amount} from {sender} to {recipient} for block {expected_block_index}");
        Ok(SubmitOutcome::Accepted {
            expected_block_index,
        })
    }

    pub fn mining_target(&self) -> Result<MiningTarget> {
        let last = self.last_block()?;
        Ok(MiningTarget {
            next_index: last.get_index() + 1,
            last_proof: last.get_proof(),
            difficulty: self.difficulty,
        })
    }

    // When I want to mine right here, holding the chain for the whole search
    pub fn mine_block(&mut self, miner: &Address) -> Result<MineOutcome> {
        let proof = self.mining_target()?.proof_of_work().run()?;
        self.seal_block(proof, miner)
    }

    /// Seal the pending pool into a new block with an already found proof.
    ///
    /// The subsidy is appended after the pending transactions. When the
    /// subsidy would exceed the supply cap nothing is written and
    /// [`MineOutcome::SupplyExhausted`] is returned.
    pub fn seal_block(&mut self, proof: u64, miner: &Address) -> Result<MineOutcome> {
        let last = self.last_block()?;
        if !ProofOfWork::validate(last.get_proof(), proof, self.difficulty) {
            return Err(LedgerError::Mining(format!(
                "Proof {proof} does not satisfy difficulty {} on {}",
                self.difficulty,
                last.get_proof()
            )));
        }

        let reward = self.next_reward();
        if !self.rewards.within_cap(self.current_supply, reward) {
            warn!(
                "Maximum supply reached: {} + {reward} exceeds {}",
                self.current_supply,
                self.rewards.max_supply()
            );
            return Ok(MineOutcome::SupplyExhausted {
                difficulty: self.difficulty,
                current_supply: self.current_supply,
            });
        }

        let subsidy = Transaction::new_mint(miner.clone(), reward)?;
        let mut transactions = self.pool.snapshot();
        transactions.push(subsidy.clone());
        let block = Block::new_block(last.get_index() + 1, transactions, proof, last.hash()?)?;

        self.store.commit_seal(&block, &subsidy)?;

        self.pool.drain();
        self.blocks.push(block.clone());
        self.current_supply = self.current_supply + reward;
        self.adjust_difficulty();

        info!(
            "Sealed block {} with {} transactions (proof: {proof}, reward: {reward}, supply: {}, difficulty: {})",
            block.get_index(),
            block.get_transactions().len(),
            self.current_supply,
            self.difficulty
        );

        Ok(MineOutcome::Sealed {
            block,
            difficulty: self.difficulty,
            reward,
            current_supply: self.current_supply,
        })
    }

    fn adjust_difficulty(&mut self) {
        self.difficulty = self
            .adjustment
            .calculate_next_difficulty(&self.blocks, self.difficulty);
    }

    /// Check genesis, linkage and every proof at the difficulty it was
    /// sealed with
    pub fn verify_chain(&self) -> Result<()> {
        check_linkage(&self.blocks)?;

        if let Some(genesis) = self.blocks.first() {
            if genesis.get_proof() != GENESIS_PROOF {
                return Err(LedgerError::InvalidBlock(format!(
                    "Genesis proof is {}, expected {GENESIS_PROOF}",
                    genesis.get_proof()
                )));
            }
        }

        let schedule = self.adjustment.replay(&self.blocks, self.initial_difficulty);
        for (position, pair) in self.blocks.windows(2).enumerate() {
            let difficulty = schedule[position + 1];
            if !ProofOfWork::validate(pair[0].get_proof(), pair[1].get_proof(), difficulty) {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {} has an invalid proof at difficulty {difficulty}",
                    pair[1].get_index()
                )));
            }
        }
        Ok(())
    }
}

// Genesis shape, contiguous indices and hash linkage
fn check_linkage(blocks: &[Block]) -> Result<()> {
    let genesis = blocks
        .first()
        .ok_or_else(|| LedgerError::InvalidBlock("Chain has no genesis block".to_string()))?;
    if genesis.get_index() != GENESIS_INDEX || genesis.get_previous_hash() != GENESIS_PREVIOUS_HASH
    {
        return Err(LedgerError::InvalidBlock(format!(
            "Genesis block has index {} and previous hash {}",
            genesis.get_index(),
            genesis.get_previous_hash()
        )));
    }

    for pair in blocks.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);
        if block.get_index() != previous.get_index() + 1 {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} follows block {}",
                block.get_index(),
                previous.get_index()
            )));
        }
        if block.get_previous_hash() != previous.hash()? {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} does not link to block {}",
                block.get_index(),
                previous.get_index()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{address, amount, create_test_blockchain, create_test_blockchain_with};

    #[test]
    fn test_genesis_on_first_open() {
        let (blockchain, _dir) = create_test_blockchain().unwrap();
        let genesis = blockchain.last_block().unwrap();

        assert_eq!(blockchain.len(), 1);
        assert_eq!(genesis.get_index(), 1);
        assert_eq!(genesis.get_proof(), 100);
        assert_eq!(genesis.get_previous_hash(), "1");
        assert_eq!(blockchain.get_current_supply(), Amount::ZERO);
        assert!(blockchain.verify_chain().is_ok());
    }

    #[test]
    fn test_insufficient_balance_changes_nothing() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        let a = address("A");
        let b = address("B");
        blockchain.submit_transaction(&Address::mint(), &a, amount(10.0)).unwrap();

        let outcome = blockchain.submit_transaction(&a, &b, amount(15.0)).unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::InsufficientBalance {
                available: amount(10.0),
                required: amount(15.0)
            }
        );
        assert_eq!(blockchain.get_balance(&a).unwrap(), amount(10.0));
        assert_eq!(blockchain.get_balance(&b).unwrap(), Amount::ZERO);
        assert_eq!(blockchain.get_pending_transactions().len(), 1);
    }

    #[test]
    fn test_accepted_transfer_moves_balances() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        let a = address("A");
        let b = address("B");
        blockchain.submit_transaction(&Address::mint(), &a, amount(10.0)).unwrap();

        let outcome = blockchain.submit_transaction(&a, &b, amount(4.0)).unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                expected_block_index: 2
            }
        );
        assert_eq!(blockchain.get_balance(&a).unwrap(), amount(6.0));
        assert_eq!(blockchain.get_balance(&b).unwrap(), amount(4.0));
    }

    #[test]
    fn test_zero_and_negative_amounts_pass_by_default() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        let a = address("A");
        let b = address("B");

        assert!(blockchain
            .submit_transaction(&a, &b, Amount::ZERO)
            .unwrap()
            .is_accepted());
        assert!(blockchain
            .submit_transaction(&a, &b, amount(-2.0))
            .unwrap()
            .is_accepted());
        assert_eq!(blockchain.get_balance(&a).unwrap(), amount(2.0));
        assert_eq!(blockchain.get_balance(&b).unwrap(), amount(-2.0));
    }

    #[test]
    fn test_positive_only_policy_rejects_zero() {
        let (mut blockchain, _dir) = create_test_blockchain_with(|config| {
            config.amount_policy = AmountPolicy::PositiveOnly;
        })
        .unwrap();

        let result = blockchain.submit_transaction(&address("A"), &address("B"), Amount::ZERO);
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
        assert!(blockchain.get_pending_transactions().is_empty());
    }

    #[test]
    fn test_mine_seals_pool_and_subsidy() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        let miner = address("miner");
        let genesis_hash = blockchain.last_block().unwrap().hash().unwrap();
        blockchain
            .submit_transaction(&Address::mint(), &address("A"), amount(3.0))
            .unwrap();

        let outcome = blockchain.mine_block(&miner).unwrap();
        let block = outcome.block().unwrap();

        assert_eq!(block.get_index(), 2);
        assert_eq!(block.get_previous_hash(), genesis_hash);
        assert_eq!(block.get_transactions().len(), 2);
        assert_eq!(block.get_transactions()[0].get_recipient(), &address("A"));
        let subsidy = &block.get_transactions()[1];
        assert!(subsidy.is_mint());
        assert_eq!(subsidy.get_recipient(), &miner);
        assert_eq!(subsidy.get_amount(), amount(50.0));

        assert_eq!(blockchain.len(), 2);
        assert_eq!(blockchain.get_current_supply(), amount(50.0));
        assert_eq!(blockchain.get_balance(&miner).unwrap(), amount(50.0));
        assert!(blockchain.get_pending_transactions().is_empty());
        assert!(blockchain.verify_chain().is_ok());
    }

    #[test]
    fn test_invalid_proof_is_rejected() {
        let (mut blockchain, _dir) = create_test_blockchain_with(|config| {
            config.initial_difficulty = 3;
        })
        .unwrap();
        let target = blockchain.mining_target().unwrap();
        let bad_proof = (0..)
            .find(|&p| !ProofOfWork::validate(target.last_proof, p, target.difficulty))
            .unwrap();

        let result = blockchain.seal_block(bad_proof, &address("miner"));

        assert!(matches!(result, Err(LedgerError::Mining(_))));
        assert_eq!(blockchain.len(), 1);
        assert_eq!(blockchain.get_current_supply(), Amount::ZERO);
    }

    #[test]
    fn test_supply_cap_stops_mining() {
        let (mut blockchain, _dir) = create_test_blockchain_with(|config| {
            config.max_supply = 100.0;
        })
        .unwrap();
        let miner = address("miner");

        assert!(blockchain.mine_block(&miner).unwrap().is_sealed());
        assert!(blockchain.mine_block(&miner).unwrap().is_sealed());
        blockchain
            .submit_transaction(&miner, &address("A"), amount(1.0))
            .unwrap();

        let outcome = blockchain.mine_block(&miner).unwrap();

        assert_eq!(
            outcome,
            MineOutcome::SupplyExhausted {
                difficulty: 1,
                current_supply: amount(100.0)
            }
        );
        assert_eq!(blockchain.len(), 3);
        assert_eq!(blockchain.get_pending_transactions().len(), 1);
        assert_eq!(blockchain.get_balance(&miner).unwrap(), amount(99.0));
    }

    #[test]
    fn test_reward_halves_with_chain_length() {
        let (mut blockchain, _dir) = create_test_blockchain_with(|config| {
            config.halving_interval = 2;
        })
        .unwrap();
        let miner = address("miner");

        let rewards: Vec<Amount> = (0..4)
            .map(|_| match blockchain.mine_block(&miner).unwrap() {
                MineOutcome::Sealed { reward, .. } => reward,
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();

        assert_eq!(
            rewards,
            vec![amount(50.0), amount(25.0), amount(25.0), amount(12.5)]
        );
        assert_eq!(blockchain.get_current_supply(), amount(112.5));
    }

    #[test]
    fn test_fast_blocks_raise_difficulty_at_tenth_block() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        let miner = address("miner");

        for _ in 0..8 {
            blockchain.mine_block(&miner).unwrap();
            assert_eq!(blockchain.get_difficulty(), 1);
        }
        blockchain.mine_block(&miner).unwrap();

        assert_eq!(blockchain.len(), 10);
        assert_eq!(blockchain.get_difficulty(), 2);
        assert!(blockchain.verify_chain().is_ok());
    }

    // Reopen on the same store handle, as a restart would
    fn reopen(blockchain: Blockchain) -> Result<Blockchain> {
        let store = blockchain.get_store().clone();
        drop(blockchain);
        Blockchain::open_with_store(store, &LedgerConfig {
            initial_difficulty: 1,
            ..LedgerConfig::default()
        })
    }

    #[test]
    fn test_recovery_on_same_store() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        blockchain.mine_block(&address("miner")).unwrap();
        blockchain
            .submit_transaction(&address("miner"), &address("A"), amount(5.0))
            .unwrap();
        let blocks = blockchain.get_blocks().to_vec();

        let recovered = reopen(blockchain).unwrap();

        assert_eq!(recovered.get_blocks(), blocks.as_slice());
        assert_eq!(recovered.get_current_supply(), amount(50.0));
        assert_eq!(recovered.get_pending_transactions().len(), 1);
    }

    #[test]
    fn test_missing_middle_block_record_fails_recovery() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        blockchain.mine_block(&address("miner")).unwrap();
        blockchain.mine_block(&address("miner")).unwrap();
        blockchain.get_store().remove_block_record(2).unwrap();

        let result = reopen(blockchain);
        assert!(matches!(result, Err(LedgerError::InvalidBlock(_))));
    }

    #[test]
    fn test_missing_tip_block_record_fails_recovery() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        blockchain.mine_block(&address("miner")).unwrap();
        blockchain.mine_block(&address("miner")).unwrap();
        blockchain.get_store().remove_block_record(3).unwrap();

        match reopen(blockchain) {
            Err(LedgerError::InvalidBlock(message)) => assert!(message.contains("Block 3")),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("recovered a chain with a missing block"),
        }
    }

    #[test]
    fn test_verify_detects_tampering() {
        let (mut blockchain, _dir) = create_test_blockchain().unwrap();
        blockchain.mine_block(&address("miner")).unwrap();
        blockchain.mine_block(&address("miner")).unwrap();

        let sealed = blockchain.blocks[1].clone();
        blockchain.blocks[1] = Block::from_parts(
            sealed.get_index(),
            sealed.get_timestamp() + 1.0,
            sealed.get_transactions().to_vec(),
            sealed.get_proof(),
            sealed.get_previous_hash().to_string(),
        );

        assert!(matches!(
            blockchain.verify_chain(),
            Err(LedgerError::InvalidBlock(_))
        ));
    }
}
