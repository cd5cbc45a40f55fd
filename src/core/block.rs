//! Block implementation: hashing, proof-of-work search, validity
//!
//! A block commits to its payload and its predecessor through a cached
//! SHA-256 hash. The hash is recomputed on every proof assignment, so it is
//! always a trustworthy snapshot of the current fields and `is_valid` can
//! detect any direct tampering by comparing against a fresh recomputation.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::core::transaction::Transaction;
use crate::crypto::hash::{hash_fields, meets_difficulty, sha256_hex};

/// Default bound on proof attempts in one mining call
pub const DEFAULT_MINING_ITERATIONS: u64 = 1000;

/// Payload carried by a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockData {
    /// No payload
    Empty,
    /// Arbitrary annotation
    Note(String),
    /// Settled transactions
    Transactions(Vec<Transaction>),
}

impl BlockData {
    /// Canonical form committed to by the block hash. A transaction payload
    /// is committed through the transaction ids.
    fn canonical(&self) -> String {
        match self {
            BlockData::Empty => String::new(),
            BlockData::Note(note) => note.clone(),
            BlockData::Transactions(transactions) => transactions
                .iter()
                .map(|transaction| transaction.hash_id.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// The transactions settled by this payload, if any
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            BlockData::Transactions(transactions) => transactions,
            _ => &[],
        }
    }
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Height of the block
    pub index: u64,
    /// Payload
    pub data: BlockData,
    /// Hash of the predecessor; `None` only for detached blocks built from
    /// explicit fields
    pub previous_hash: Option<String>,
    /// Creation time (hashed at whole-second precision)
    pub timestamp: DateTime<Utc>,
    /// Proof of work
    pub proof: u64,
    /// Required number of leading zero bits in the hash
    pub difficulty: u32,
    /// Cached hash of the block fields
    pub hash: String,
}

impl Block {
    /// Create a block from explicit fields
    pub fn new(
        index: u64,
        data: BlockData,
        previous_hash: Option<String>,
        timestamp: DateTime<Utc>,
        proof: u64,
        difficulty: u32,
    ) -> Self {
        let mut block = Self {
            index,
            data,
            previous_hash,
            timestamp,
            proof,
            difficulty,
            hash: String::new(),
        };
        block.set_proof(proof);
        block
    }

    /// Create the successor of `previous`, inheriting its difficulty
    pub fn after(previous: &Block, data: BlockData, timestamp: DateTime<Utc>, proof: u64) -> Self {
        Self::new(
            previous.index + 1,
            data,
            Some(previous.hash.clone()),
            timestamp,
            proof,
            previous.difficulty,
        )
    }

    /// Generate a genesis block.
    ///
    /// The previous hash is the SHA-256 of the empty string, or of the
    /// timestamp's canonical second form when one is given. With `mine` the
    /// block is mined until valid, without an overall iteration cap.
    pub fn genesis(
        data: BlockData,
        timestamp: Option<DateTime<Utc>>,
        proof: u64,
        difficulty: u32,
        mine: bool,
        clock: &Clock,
    ) -> Self {
        let previous_hash = match timestamp {
            None => sha256_hex(b""),
            Some(instant) => sha256_hex(instant.timestamp().to_string().as_bytes()),
        };
        let timestamp = clock.resolve(timestamp);

        let mut block = Self::new(0, data, Some(previous_hash), timestamp, proof, difficulty);
        if mine {
            while !block.is_valid() {
                block.mine(None, DEFAULT_MINING_ITERATIONS);
            }
        }
        block
    }

    /// Assign the proof and recompute the cached hash
    pub fn set_proof(&mut self, proof: u64) {
        self.proof = proof;
        self.hash = self.calculate_hash();
    }

    /// Hash of the current block fields under the canonical encoding
    pub fn calculate_hash(&self) -> String {
        let fields = [
            self.index.to_string(),
            match &self.previous_hash {
                Some(hash) => hash.clone(),
                None => "null".to_string(),
            },
            self.timestamp.timestamp().to_string(),
            self.data.canonical(),
            self.proof.to_string(),
            self.difficulty.to_string(),
        ];
        hash_fields(&fields)
    }

    /// Whether the hash has the required number of leading zero bits
    pub fn hash_satisfies_difficulty(&self) -> bool {
        let hash = hex::decode(&self.hash).unwrap_or_default();
        meets_difficulty(&hash, self.difficulty)
    }

    /// Whether the block carries a satisfying proof and an untampered hash
    pub fn is_valid(&self) -> bool {
        self.hash_satisfies_difficulty() && self.hash == self.calculate_hash()
    }

    /// Search for a valid proof.
    ///
    /// Starts from `init` when given, otherwise from the current proof, and
    /// tries successive values until the block is valid or `max_iterations`
    /// attempts are spent. Returns the final validity. The search is
    /// synchronous and CPU-bound; the iteration cap is its only bound.
    pub fn mine(&mut self, init: Option<u64>, max_iterations: u64) -> bool {
        if let Some(init) = init {
            self.set_proof(init);
        }

        let mut iterations = 0;
        while !self.is_valid() && iterations < max_iterations {
            self.set_proof(self.proof + 1);
            iterations += 1;
        }

        let valid = self.is_valid();
        if valid {
            debug!(
                "block {} proof {} found after {} iterations",
                self.index, self.proof, iterations
            );
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_hash_matches_fixed_vectors() {
        let base = Block::new(
            0,
            BlockData::Note("block data".to_string()),
            None,
            epoch(0),
            0,
            0,
        );
        assert_eq!(
            base.hash,
            "c6dbff4ced46ad206447685a9f0d969aaf7833053355ac75403fdcd30b797e98"
        );

        let next = Block::after(&base, BlockData::Note("block data".to_string()), epoch(0), 0);
        assert_eq!(
            next.hash,
            "8413fc936be2091874c8e7c886115f24ad125168834346e2bb7deb8ff7b6735b"
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        let make = || {
            Block::new(
                3,
                BlockData::Note("payload".to_string()),
                Some("abc".to_string()),
                epoch(100),
                7,
                2,
            )
        };
        let a = make();
        let b = make();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash, a.calculate_hash());
    }

    #[test]
    fn test_set_proof_recomputes_hash() {
        let mut block = Block::new(0, BlockData::Empty, None, epoch(0), 0, 0);
        let before = block.hash.clone();

        block.set_proof(42);
        assert_ne!(block.hash, before);
        assert_eq!(block.hash, block.calculate_hash());
        assert!(block.is_valid());
    }

    #[test]
    fn test_zero_difficulty_always_satisfied() {
        let block = Block::new(0, BlockData::Empty, None, epoch(0), 0, 0);
        assert!(block.hash_satisfies_difficulty());
        assert!(block.is_valid());
    }

    #[test]
    fn test_tampering_is_detected() {
        let fresh = || {
            Block::new(
                0,
                BlockData::Note("data".to_string()),
                None,
                epoch(0),
                0,
                0,
            )
        };

        let mut block = fresh();
        assert!(block.is_valid());
        block.data = BlockData::Note("changed".to_string());
        assert!(!block.is_valid());

        let mut block = fresh();
        block.index = 5;
        assert!(!block.is_valid());

        let mut block = fresh();
        block.hash = "0".repeat(64);
        assert!(!block.is_valid());
    }

    #[test]
    fn test_mining_with_no_budget_fails_unless_already_valid() {
        let clock = Clock::Fixed(epoch(946684800));
        let mut block = Block::genesis(
            BlockData::Empty,
            Some(epoch(946684800)),
            0,
            4,
            false,
            &clock,
        );
        assert!(!block.is_valid());

        assert!(!block.mine(None, 0));
        assert_eq!(block.proof, 0);

        assert!(block.mine(None, 1000));
        assert_eq!(block.proof, 31);

        // Already valid: no budget needed
        assert!(block.mine(None, 0));
    }

    #[test]
    fn test_genesis_previous_hash_commits_to_timestamp() {
        let block = Block::genesis(BlockData::Empty, None, 0, 0, false, &Clock::System);
        assert_eq!(
            block.previous_hash.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );

        let clock = Clock::Fixed(epoch(946684800));
        let block = Block::genesis(
            BlockData::Empty,
            Some(epoch(946684800)),
            0,
            0,
            false,
            &clock,
        );
        assert_eq!(
            block.previous_hash.as_deref(),
            Some("95147b43ecfcf4cdb069a500ac1eb7b29bcb901638ac4c35a06863d526bb055b")
        );
    }

    #[test]
    fn test_mined_genesis_is_deterministic() {
        let clock = Clock::Fixed(epoch(946684800));
        let block = Block::genesis(BlockData::Empty, Some(epoch(946684800)), 0, 6, true, &clock);

        assert!(block.is_valid());
        assert_eq!(block.proof, 29);
        assert_eq!(
            block.hash,
            "03fb316e122adf9f9ceef5529f251ad46c85c20bc5d96a78a0db57f52816d055"
        );
    }

    #[test]
    fn test_mining_converges() {
        let mut block = Block::new(
            1,
            BlockData::Note("x".to_string()),
            Some("h".to_string()),
            epoch(0),
            0,
            5,
        );
        assert!(block.mine(None, 100_000));
        assert!(block.is_valid());
        assert_eq!(block.proof, 115);
    }

    #[test]
    fn test_mining_resumes_from_current_proof() {
        let mut block = Block::new(
            1,
            BlockData::Note("x".to_string()),
            Some("h".to_string()),
            epoch(0),
            0,
            5,
        );
        // Spend the budget in two installments; the search picks up where it
        // stopped
        assert!(!block.mine(None, 50));
        assert_eq!(block.proof, 50);
        assert!(block.mine(None, 100_000));
        assert_eq!(block.proof, 115);
    }

    #[test]
    fn test_mining_with_init_restarts_the_search() {
        let mut block = Block::new(
            1,
            BlockData::Note("x".to_string()),
            Some("h".to_string()),
            epoch(0),
            0,
            5,
        );
        assert!(block.mine(Some(100), 100_000));
        assert_eq!(block.proof, 115);
    }

    #[test]
    fn test_successor_links_to_predecessor() {
        let base = Block::new(
            4,
            BlockData::Empty,
            Some("prev".to_string()),
            epoch(0),
            0,
            3,
        );
        let next = Block::after(&base, BlockData::Note("n".to_string()), epoch(60), 0);

        assert_eq!(next.index, 5);
        assert_eq!(next.previous_hash.as_deref(), Some(base.hash.as_str()));
        assert_eq!(next.difficulty, 3);
    }

    #[test]
    fn test_transactions_payload_commits_to_ids() {
        use crate::core::transaction::{OutputSpec, Transaction};

        let reward = Transaction::reward(
            Some(epoch(0)),
            OutputSpec {
                address: "miner".to_string(),
                amount: 10.0,
            },
        );
        let one = Block::new(
            0,
            BlockData::Transactions(vec![reward.clone()]),
            None,
            epoch(0),
            0,
            0,
        );
        let other_reward = Transaction::reward(
            Some(epoch(0)),
            OutputSpec {
                address: "miner".to_string(),
                amount: 11.0,
            },
        );
        let other = Block::new(
            0,
            BlockData::Transactions(vec![other_reward]),
            None,
            epoch(0),
            0,
            0,
        );
        assert_ne!(one.hash, other.hash);

        // The payload accessor exposes the settled transactions
        assert_eq!(one.data.transactions().len(), 1);
        assert_eq!(one.data.transactions()[0].hash_id, reward.hash_id);
        assert!(BlockData::Empty.transactions().is_empty());
    }
}
