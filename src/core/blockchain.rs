//! Blockchain implementation
//!
//! Manages the chain of confirmed blocks and the candidate lifecycle: at most
//! one candidate block is assembled at a time, proven by mining, and appended
//! once valid. Difficulty is retargeted from the observed block pace, and a
//! longer valid chain sharing the same genesis can replace this one.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::block::{Block, BlockData};
use crate::core::clock::Clock;
use crate::core::ledger::UnspentSet;
use crate::core::transaction::{OutputSpec, Transaction};
use crate::crypto::keys::KeyError;
use crate::wallet::Wallet;

/// Minimum seconds between a block and its successor candidate
pub const MINIMUM_INTERVAL: i64 = 59;

/// Target seconds per block
pub const BLOCK_INTERVAL: i64 = 600;

/// Number of blocks between difficulty evaluations (one day at target pace)
pub const DIFFICULTY_INTERVAL: usize = 144;

/// The chain of confirmed blocks plus the candidate being worked on.
///
/// The chain, the candidate, and the unspent cache change together: appending
/// or replacing blocks drops the cached unspent view, which is rebuilt on
/// demand by replaying the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockchain {
    /// Confirmed blocks, genesis first
    pub chain: Vec<Block>,
    /// Block assembled but not yet proven
    candidate: Option<Block>,
    /// Lazily rebuilt unspent view of the chain
    #[serde(skip)]
    unspent: Option<UnspentSet>,
    /// Minimum seconds between consecutive blocks
    pub minimum_interval: i64,
    /// Target seconds per block for retargeting
    pub block_interval: i64,
    /// Blocks between difficulty evaluations
    pub difficulty_interval: usize,
    /// Reward minted to a miner per candidate
    pub amount_mining: f64,
    /// Time source for defaulted timestamps
    pub clock: Clock,
}

impl Blockchain {
    /// Create a chain bootstrapped from a default genesis block
    pub fn new() -> Self {
        Self::with_clock(Clock::System)
    }

    /// Create a chain bootstrapped from a default genesis block, using the
    /// given time source
    pub fn with_clock(clock: Clock) -> Self {
        let genesis = Block::genesis(BlockData::Empty, None, 0, 0, false, &clock);
        Self::from_genesis_with_clock(genesis, clock)
    }

    /// Seed a chain from an explicit genesis block
    pub fn from_genesis(genesis: Block) -> Self {
        Self::from_genesis_with_clock(genesis, Clock::System)
    }

    /// Seed a chain from an explicit genesis block and time source.
    ///
    /// A valid block becomes the first confirmed block; an unmined one stays
    /// a pending candidate over an empty (not yet valid) chain until it is
    /// mined.
    pub fn from_genesis_with_clock(genesis: Block, clock: Clock) -> Self {
        let (chain, candidate) = if genesis.is_valid() {
            (vec![genesis], None)
        } else {
            (Vec::new(), Some(genesis))
        };

        Self {
            chain,
            candidate,
            unspent: None,
            minimum_interval: MINIMUM_INTERVAL,
            block_interval: BLOCK_INTERVAL,
            difficulty_interval: DIFFICULTY_INTERVAL,
            amount_mining: 0.0,
            clock,
        }
    }

    /// Create a new currency: a genesis block carrying one reward transaction
    /// to `address`. The same amount becomes the per-block mining reward.
    pub fn new_currency(
        address: &str,
        amount: f64,
        timestamp: Option<DateTime<Utc>>,
        proof: u64,
        difficulty: u32,
        mine: bool,
    ) -> Self {
        Self::new_currency_with_clock(address, amount, timestamp, proof, difficulty, mine, Clock::System)
    }

    /// `new_currency` with an explicit time source
    pub fn new_currency_with_clock(
        address: &str,
        amount: f64,
        timestamp: Option<DateTime<Utc>>,
        proof: u64,
        difficulty: u32,
        mine: bool,
        clock: Clock,
    ) -> Self {
        let reward = Transaction::reward(
            timestamp,
            OutputSpec {
                address: address.to_string(),
                amount,
            },
        );
        let genesis = Block::genesis(
            BlockData::Transactions(vec![reward]),
            timestamp,
            proof,
            difficulty,
            mine,
            &clock,
        );

        let mut blockchain = Self::from_genesis_with_clock(genesis, clock);
        blockchain.amount_mining = amount;
        blockchain
    }

    /// The last confirmed block, if the chain is bootstrapped
    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// The pending candidate block, if one exists
    pub fn candidate_block(&self) -> Option<&Block> {
        self.candidate.as_ref()
    }

    /// Number of confirmed blocks
    pub fn num_blocks(&self) -> usize {
        self.chain.len()
    }

    /// Walk the chain from the tail: every block must be valid, linked to its
    /// predecessor's hash, with strictly incrementing indices. An empty chain
    /// is invalid.
    pub fn is_valid(&self) -> bool {
        if self.chain.is_empty() {
            return false;
        }

        for step in (1..self.chain.len()).rev() {
            let block = &self.chain[step];
            let previous = &self.chain[step - 1];

            if !block.is_valid() {
                return false;
            }
            if block.previous_hash.as_deref() != Some(previous.hash.as_str()) {
                return false;
            }
            if block.index != previous.index + 1 {
                return false;
            }
        }

        self.chain[0].is_valid()
    }

    /// Assemble a new candidate linked to the chain tail.
    ///
    /// Fails while another candidate is pending, and when the timestamp is
    /// closer than `minimum_interval` to the last block. Difficulty is
    /// re-evaluated once per `difficulty_interval` blocks, otherwise carried
    /// over from the last block.
    pub fn add_candidate(
        &mut self,
        data: BlockData,
        timestamp: Option<DateTime<Utc>>,
        proof: u64,
    ) -> bool {
        if self.candidate.is_some() {
            return false;
        }
        let last = match self.chain.last() {
            Some(block) => block,
            None => return false,
        };

        let timestamp = self.clock.resolve(timestamp);
        let interval = (timestamp - last.timestamp).num_seconds();
        if interval < self.minimum_interval {
            debug!(
                "candidate rejected: {}s since last block (minimum {}s)",
                interval, self.minimum_interval
            );
            return false;
        }

        let index = last.index + 1;
        let previous_hash = last.hash.clone();
        let difficulty = self.next_difficulty(last);

        self.candidate = Some(Block::new(
            index,
            data,
            Some(previous_hash),
            timestamp,
            proof,
            difficulty,
        ));
        true
    }

    /// Difficulty for the next block.
    ///
    /// Re-evaluated only on a window boundary: the average seconds-per-block
    /// over the last `difficulty_interval` blocks is compared against
    /// `block_interval`; a slower pace lowers the difficulty, a faster one
    /// raises it, an exact tie keeps it.
    fn next_difficulty(&self, last: &Block) -> u32 {
        let length = self.chain.len();
        if length == 0 || length % self.difficulty_interval != 0 {
            return last.difficulty;
        }

        let window = &self.chain[length - self.difficulty_interval..];
        let elapsed = (last.timestamp - window[0].timestamp).num_seconds() as f64;
        let average = elapsed / (self.difficulty_interval - 1) as f64;
        let target = self.block_interval as f64;

        if average > target {
            let difficulty = last.difficulty.saturating_sub(1);
            info!(
                "difficulty lowered to {} ({:.1}s average over {} blocks, target {}s)",
                difficulty, average, self.difficulty_interval, self.block_interval
            );
            difficulty
        } else if average < target {
            let difficulty = last.difficulty + 1;
            info!(
                "difficulty raised to {} ({:.1}s average over {} blocks, target {}s)",
                difficulty, average, self.difficulty_interval, self.block_interval
            );
            difficulty
        } else {
            // Exact tie: carry the difficulty over
            last.difficulty
        }
    }

    /// Apply a proof to the pending candidate and append it when it becomes
    /// valid. A rejected proof stays applied to the candidate.
    pub fn candidate_proof(&mut self, proof: u64) -> bool {
        let candidate = match self.candidate.as_mut() {
            Some(block) => block,
            None => return false,
        };

        candidate.set_proof(proof);
        if candidate.is_valid() {
            self.append_candidate();
            return true;
        }
        false
    }

    /// Run the proof search on the pending candidate and append it on
    /// success. On failure the candidate keeps its last tried proof.
    pub fn mining_candidate(&mut self, init: Option<u64>, max_iterations: u64) -> bool {
        let candidate = match self.candidate.as_mut() {
            Some(block) => block,
            None => return false,
        };

        if candidate.mine(init, max_iterations) {
            self.append_candidate();
            return true;
        }
        false
    }

    /// Move the proven candidate onto the chain and drop the stale unspent
    /// view
    fn append_candidate(&mut self) {
        if let Some(block) = self.candidate.take() {
            info!("block {} appended with hash {}", block.index, block.hash);
            self.chain.push(block);
            self.unspent = None;
        }
    }

    /// The unspent view of this chain, rebuilt on demand and cached until the
    /// chain changes
    pub fn unspent_list(&mut self) -> &mut UnspentSet {
        if self.unspent.is_none() {
            let rebuilt = self.rebuild_unspent();
            self.unspent = Some(rebuilt);
        }
        self.unspent.get_or_insert_with(UnspentSet::new)
    }

    /// Replay every block's transactions through staging, confirming them per
    /// valid block
    fn rebuild_unspent(&self) -> UnspentSet {
        let mut unspent = UnspentSet::new();

        for block in &self.chain {
            for transaction in block.data.transactions() {
                if !unspent.append_unconfirmed(transaction.clone()) {
                    warn!(
                        "block {}: transaction {} no longer validates during replay",
                        block.index, transaction.hash_id
                    );
                }
            }
            if block.is_valid() {
                unspent.confirm_unconfirmed();
            }
        }

        unspent
    }

    /// Build, sign, and stage a transfer from the key's wallet to `address`
    pub fn add_transaction(&mut self, key: &str, address: &str, amount: f64) -> bool {
        let wallet = match Wallet::from_private_key(key) {
            Ok(wallet) => wallet,
            Err(_) => return false,
        };

        let unspent = self.unspent_list();
        let transaction = match wallet.generate_transaction_to(address, amount, unspent) {
            Some(transaction) => transaction,
            None => return false,
        };

        unspent.append_unconfirmed(transaction)
    }

    /// Stage a mining reward to `address` and assemble a candidate from
    /// everything currently staged
    pub fn generate_candidate(
        &mut self,
        address: &str,
        timestamp: Option<DateTime<Utc>>,
        proof: u64,
    ) -> bool {
        let reward = Transaction::reward(
            timestamp,
            OutputSpec {
                address: address.to_string(),
                amount: self.amount_mining,
            },
        );

        let unspent = self.unspent_list();
        unspent.append_unconfirmed(reward);
        let data = unspent.unconfirmed.clone();

        self.add_candidate(BlockData::Transactions(data), timestamp, proof)
    }

    /// Adopt a strictly longer, valid chain sharing this chain's genesis
    pub fn replace_chain(&mut self, other: &Blockchain) -> bool {
        if other.num_blocks() <= self.num_blocks() {
            return false;
        }
        if other.chain.first() != self.chain.first() {
            return false;
        }
        if !other.is_valid() {
            return false;
        }

        info!(
            "chain replaced: {} blocks -> {}",
            self.num_blocks(),
            other.num_blocks()
        );
        self.chain = other.chain.clone();
        self.candidate = other.candidate.clone();
        self.unspent = None;
        true
    }

    /// A wallet over this chain's ledger: an imported key, or a fresh pair
    pub fn wallet(&self, key: Option<&str>) -> Result<Wallet, KeyError> {
        match key {
            Some(key) => Wallet::from_private_key(key),
            None => Ok(Wallet::new()),
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}
