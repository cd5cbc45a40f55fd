//! Wallet management
//!
//! A thin consumer of the ledger's read/write contract: balance queries and
//! signed transaction construction.

pub mod wallet;

pub use wallet::Wallet;
