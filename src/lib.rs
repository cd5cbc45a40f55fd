//! Minicoin: a minimal proof-of-work cryptocurrency ledger
//!
//! This crate implements the core of a small blockchain currency:
//! - Hash-linked blocks secured by adjustable-difficulty proof of work
//! - A UTXO transaction model with ECDSA signatures (secp256k1)
//! - Unconfirmed-transaction staging with double-spend-free settlement
//! - Longest-valid-chain replacement between competing chains
//!
//! It is a library: there is no networking, persistence, or process entry
//! point here, only the consensus and ledger rules.
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use minicoin::{Blockchain, Clock, Wallet};
//!
//! let genesis_time = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
//! let miner = Wallet::new();
//!
//! // A currency whose genesis credits the miner with 100 coins
//! let mut chain = Blockchain::new_currency_with_clock(
//!     &miner.address(),
//!     100.0,
//!     Some(genesis_time),
//!     0,
//!     4,
//!     true,
//!     Clock::Fixed(genesis_time),
//! );
//! assert!(chain.is_valid());
//!
//! // Transfer some coins and mine the next block
//! let friend = Wallet::new();
//! assert!(chain.add_transaction(&miner.private_key(), &friend.address(), 40.0));
//! assert!(chain.generate_candidate(
//!     &miner.address(),
//!     Some(genesis_time + Duration::minutes(10)),
//!     0,
//! ));
//! assert!(chain.mining_candidate(None, 10_000));
//!
//! let unspent = chain.unspent_list();
//! assert_eq!(unspent.address_amount(&friend.address()), 40.0);
//! ```

pub mod core;
pub mod crypto;
pub mod wallet;

// Re-export commonly used types
pub use core::{
    Block, BlockData, Blockchain, Clock, InputRef, InputsSpec, OutputSpec, Transaction,
    UnspentRecord, UnspentSet, BLOCK_INTERVAL, DEFAULT_MINING_ITERATIONS, DIFFICULTY_INTERVAL,
    MINIMUM_INTERVAL,
};
pub use crypto::{KeyError, KeyPair};
pub use wallet::Wallet;
