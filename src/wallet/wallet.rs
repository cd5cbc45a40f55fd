//! Wallet implementation
//!
//! A wallet is a key pair consuming the ledger's read/write contract: it
//! queries spendable balances and builds signed transfers against an unspent
//! set.

use crate::core::ledger::UnspentSet;
use crate::core::transaction::{InputRef, InputsSpec, OutputSpec, Transaction};
use crate::crypto::keys::{KeyError, KeyPair};

/// A key pair bound to the ledger's read/write contract
pub struct Wallet {
    key_pair: KeyPair,
}

impl Wallet {
    /// Create a wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    /// Import a wallet from a hex-encoded private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, KeyError> {
        Ok(Self {
            key_pair: KeyPair::from_private_key_hex(private_key_hex)?,
        })
    }

    /// The wallet's address: its hex public key
    pub fn address(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// The wallet's private key (hex).
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Spendable balance in the given unspent view
    pub fn balance(&self, unspent: &UnspentSet) -> f64 {
        unspent.address_amount(&self.address())
    }

    /// Build and sign a transfer to `address`.
    ///
    /// Selects owned records until the amount is covered and returns the
    /// exact change to this wallet; `None` when the balance is insufficient
    /// or signing fails.
    pub fn generate_transaction_to(
        &self,
        address: &str,
        amount: f64,
        unspent: &UnspentSet,
    ) -> Option<Transaction> {
        if self.balance(unspent) < amount {
            return None;
        }

        let mut inputs = Vec::new();
        let mut used = 0.0;
        for record in unspent.address_transactions(&self.address()) {
            used += record.amount;
            inputs.push(InputRef {
                hash_id: record.hash_id,
                index: record.index,
            });
            if used >= amount {
                break;
            }
        }

        let change = used - amount;
        let mut outputs = vec![OutputSpec {
            address: address.to_string(),
            amount,
        }];
        if change != 0.0 {
            outputs.push(OutputSpec {
                address: self.address(),
                amount: change,
            });
        }

        let mut transaction = Transaction::new(InputsSpec::Spend(inputs), outputs);
        transaction.sign(&self.private_key()).ok()?;
        Some(transaction)
    }

    /// Transfer directly: build, sign, and spend without staging
    pub fn transfer_to(&self, address: &str, amount: f64, unspent: &mut UnspentSet) -> bool {
        match self.generate_transaction_to(address, amount, unspent) {
            Some(transaction) => unspent.spend_transaction(&transaction),
            None => false,
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
