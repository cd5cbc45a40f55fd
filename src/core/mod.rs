//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Blocks with proof of work and tamper-evident hashing
//! - The blockchain candidate lifecycle, difficulty retargeting, and
//!   longest-valid-chain replacement
//! - Transactions (UTXO model with reward minting)
//! - The unspent output set with unconfirmed staging
//! - The injectable clock behind every defaulted timestamp

pub mod block;
pub mod blockchain;
pub mod clock;
pub mod ledger;
pub mod transaction;

pub use block::{Block, BlockData, DEFAULT_MINING_ITERATIONS};
pub use blockchain::{Blockchain, BLOCK_INTERVAL, DIFFICULTY_INTERVAL, MINIMUM_INTERVAL};
pub use clock::Clock;
pub use ledger::UnspentSet;
pub use transaction::{InputRef, InputsSpec, OutputSpec, Transaction, UnspentRecord};
