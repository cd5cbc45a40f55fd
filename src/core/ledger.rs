//! Unspent output set with unconfirmed staging
//!
//! Maintains the set of spendable records together with the staging area for
//! transactions waiting to be mined into a block. Staged transactions are
//! validated at admission; their inputs count as promised and are excluded
//! from balances until confirmation settles them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::transaction::{InputRef, InputsSpec, Transaction, UnspentRecord};
use crate::crypto::keys;

/// The set of spendable outputs plus the unconfirmed staging area
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnspentSet {
    /// Spendable records keyed by `hash_id:index`
    pub unspent: HashMap<String, UnspentRecord>,
    /// Staged transactions in arrival order
    pub unconfirmed: Vec<Transaction>,
}

impl UnspentSet {
    /// Create an empty unspent set
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, input: &InputRef) -> Option<&UnspentRecord> {
        self.unspent
            .get(&format!("{}:{}", input.hash_id, input.index))
    }

    /// Whether a record's `(hash_id, index)` is consumed by a staged spend
    fn is_promised(&self, hash_id: &str, index: u32) -> bool {
        self.unconfirmed.iter().any(|staged| match &staged.inputs {
            InputsSpec::Spend(inputs) => inputs
                .iter()
                .any(|input| input.hash_id == hash_id && input.index == index),
            InputsSpec::Reward(_) => false,
        })
    }

    /// Validate a transaction against the current set and staging area.
    ///
    /// A reward is rejected only when one of its outputs duplicates an output
    /// already staged. A spend must resolve every input to a live record that
    /// is not promised elsewhere, carry the owner's signature over the
    /// transaction id, and conserve value exactly.
    pub fn validate_transaction(&self, transaction: &Transaction) -> bool {
        match &transaction.inputs {
            InputsSpec::Reward(_) => !self.unconfirmed.iter().any(|staged| {
                staged
                    .outputs
                    .iter()
                    .any(|staged_output| transaction.outputs.contains(staged_output))
            }),
            InputsSpec::Spend(inputs) => self.validate_spend(transaction, inputs),
        }
    }

    fn validate_spend(&self, transaction: &Transaction, inputs: &[InputRef]) -> bool {
        for input in inputs {
            if self.is_promised(&input.hash_id, input.index) {
                return false;
            }
        }

        let mut consumed = Vec::with_capacity(inputs.len());
        for input in inputs {
            if let Some(record) = self.find(input) {
                if !keys::verify(&transaction.hash_id, &transaction.signature, &record.address) {
                    return false;
                }
                consumed.push(record);
            }
        }

        // Every input must have resolved to exactly one live record
        if consumed.len() != inputs.len() {
            return false;
        }

        // Value is conserved exactly: no fees, no tolerance
        let total_in: f64 = consumed.iter().map(|record| record.amount).sum();
        let total_out: f64 = transaction.outputs.iter().map(|output| output.amount).sum();
        total_in == total_out
    }

    /// Execute a spend: consumed records leave the set and the outputs enter
    /// it keyed by the spending transaction's own id
    fn spend(&mut self, transaction: &Transaction) {
        if let InputsSpec::Spend(inputs) = &transaction.inputs {
            for input in inputs {
                self.unspent
                    .remove(&format!("{}:{}", input.hash_id, input.index));
            }
        }

        for (index, output) in transaction.outputs.iter().enumerate() {
            let record = UnspentRecord {
                hash_id: transaction.hash_id.clone(),
                index: index as u32,
                address: output.address.clone(),
                amount: output.amount,
            };
            self.unspent.insert(record.key(), record);
        }
    }

    /// Stage a transaction for the next block; no mutation on failure
    pub fn append_unconfirmed(&mut self, transaction: Transaction) -> bool {
        if self.validate_transaction(&transaction) {
            self.unconfirmed.push(transaction);
            return true;
        }
        false
    }

    /// Confirm every staged transaction in arrival order and clear staging.
    ///
    /// Staged entries were validated at admission; a record that left the set
    /// through another path since then is skipped without rollback.
    pub fn confirm_unconfirmed(&mut self) -> bool {
        let staged = std::mem::take(&mut self.unconfirmed);
        for transaction in &staged {
            self.spend(transaction);
        }
        true
    }

    /// Validate and immediately execute a spend, bypassing staging
    pub fn spend_transaction(&mut self, transaction: &Transaction) -> bool {
        if self.validate_transaction(transaction) {
            self.spend(transaction);
            return true;
        }
        false
    }

    /// Spendable balance of an address: owned records not promised to a
    /// staged transaction
    pub fn address_amount(&self, address: &str) -> f64 {
        self.address_transactions(address)
            .iter()
            .map(|record| record.amount)
            .sum()
    }

    /// Owned records available for spending, in stable `(hash_id, index)`
    /// order so that input selection is deterministic
    pub fn address_transactions(&self, address: &str) -> Vec<UnspentRecord> {
        let mut records: Vec<UnspentRecord> = self
            .unspent
            .values()
            .filter(|record| record.address == address)
            .filter(|record| !self.is_promised(&record.hash_id, record.index))
            .cloned()
            .collect();
        records.sort_by(|a, b| (&a.hash_id, a.index).cmp(&(&b.hash_id, b.index)));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::OutputSpec;
    use crate::wallet::Wallet;
    use chrono::{TimeZone, Utc};

    fn seed(set: &mut UnspentSet, hash_id: &str, address: &str, amount: f64) {
        let record = UnspentRecord {
            hash_id: hash_id.to_string(),
            index: 0,
            address: address.to_string(),
            amount,
        };
        set.unspent.insert(record.key(), record);
    }

    #[test]
    fn test_staged_spend_is_excluded_until_confirmed() {
        let alice = Wallet::new();
        let bob = Wallet::new();
        let mut unspent = UnspentSet::new();
        seed(&mut unspent, "d749929f", &alice.address(), 250.0);

        assert_eq!(unspent.address_amount(&alice.address()), 250.0);
        assert_eq!(unspent.address_amount(&bob.address()), 0.0);

        // Not enough balance
        assert!(alice
            .generate_transaction_to(&bob.address(), 900.0, &unspent)
            .is_none());

        let transaction = alice
            .generate_transaction_to(&bob.address(), 200.0, &unspent)
            .unwrap();
        assert!(unspent.append_unconfirmed(transaction.clone()));

        // The same inputs are promised now
        assert!(!unspent.append_unconfirmed(transaction));

        // Promised records do not count towards any balance
        assert_eq!(unspent.address_amount(&alice.address()), 0.0);
        assert_eq!(unspent.address_amount(&bob.address()), 0.0);

        assert!(unspent.confirm_unconfirmed());
        assert_eq!(unspent.address_amount(&alice.address()), 50.0);
        assert_eq!(unspent.address_amount(&bob.address()), 200.0);
        assert!(unspent.unconfirmed.is_empty());
    }

    #[test]
    fn test_confirmed_inputs_cannot_be_spent_again() {
        let alice = Wallet::new();
        let bob = Wallet::new();
        let mut unspent = UnspentSet::new();
        seed(&mut unspent, "seed", &alice.address(), 100.0);

        let transaction = alice
            .generate_transaction_to(&bob.address(), 100.0, &unspent)
            .unwrap();
        assert!(unspent.spend_transaction(&transaction));
        assert_eq!(unspent.address_amount(&bob.address()), 100.0);

        // The consumed record is gone; any reuse of it fails validation
        assert!(!unspent.spend_transaction(&transaction));
        assert!(!unspent.append_unconfirmed(transaction));
    }

    #[test]
    fn test_unknown_input_is_rejected() {
        let alice = Wallet::new();
        let mut unspent = UnspentSet::new();

        let transaction = Transaction::signed(
            vec![InputRef {
                hash_id: "missing".to_string(),
                index: 0,
            }],
            vec![OutputSpec {
                address: "anyone".to_string(),
                amount: 10.0,
            }],
            &alice.private_key(),
        )
        .unwrap();

        assert!(!unspent.validate_transaction(&transaction));
    }

    #[test]
    fn test_amount_mismatch_is_rejected() {
        let alice = Wallet::new();
        let mut unspent = UnspentSet::new();
        seed(&mut unspent, "seed", &alice.address(), 100.0);

        let transaction = Transaction::signed(
            vec![InputRef {
                hash_id: "seed".to_string(),
                index: 0,
            }],
            vec![OutputSpec {
                address: "anyone".to_string(),
                amount: 90.0,
            }],
            &alice.private_key(),
        )
        .unwrap();

        assert!(!unspent.validate_transaction(&transaction));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let alice = Wallet::new();
        let mallory = Wallet::new();
        let mut unspent = UnspentSet::new();
        seed(&mut unspent, "seed", &alice.address(), 100.0);

        // Mallory signs a spend of Alice's record
        let transaction = Transaction::signed(
            vec![InputRef {
                hash_id: "seed".to_string(),
                index: 0,
            }],
            vec![OutputSpec {
                address: mallory.address(),
                amount: 100.0,
            }],
            &mallory.private_key(),
        )
        .unwrap();

        assert!(!unspent.validate_transaction(&transaction));
    }

    #[test]
    fn test_duplicate_reward_staging_is_rejected() {
        let miner = Wallet::new();
        let mut unspent = UnspentSet::new();
        let timestamp = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();

        let reward = Transaction::reward(
            Some(timestamp),
            OutputSpec {
                address: miner.address(),
                amount: 5.0,
            },
        );

        assert!(unspent.append_unconfirmed(reward.clone()));
        assert!(!unspent.append_unconfirmed(reward));

        assert!(unspent.confirm_unconfirmed());
        assert_eq!(unspent.address_amount(&miner.address()), 5.0);
    }

    #[test]
    fn test_balance_is_conserved_across_transfers() {
        let alice = Wallet::new();
        let bob = Wallet::new();
        let carol = Wallet::new();
        let mut unspent = UnspentSet::new();
        seed(&mut unspent, "issue", &alice.address(), 100.0);

        assert!(alice.transfer_to(&bob.address(), 30.0, &mut unspent));
        assert!(bob.transfer_to(&carol.address(), 10.0, &mut unspent));

        let total = unspent.address_amount(&alice.address())
            + unspent.address_amount(&bob.address())
            + unspent.address_amount(&carol.address());
        assert_eq!(total, 100.0);
        assert_eq!(unspent.address_amount(&alice.address()), 70.0);
        assert_eq!(unspent.address_amount(&bob.address()), 20.0);
        assert_eq!(unspent.address_amount(&carol.address()), 10.0);
    }

    #[test]
    fn test_address_transactions_sorted_and_filtered() {
        let alice = Wallet::new();
        let bob = Wallet::new();
        let mut unspent = UnspentSet::new();
        seed(&mut unspent, "bbbb", &alice.address(), 10.0);
        seed(&mut unspent, "aaaa", &alice.address(), 20.0);
        seed(&mut unspent, "cccc", &bob.address(), 30.0);

        let records = unspent.address_transactions(&alice.address());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash_id, "aaaa");
        assert_eq!(records[1].hash_id, "bbbb");

        // Staging a spend of one record hides it
        let transaction = alice
            .generate_transaction_to(&bob.address(), 20.0, &unspent)
            .unwrap();
        assert!(unspent.append_unconfirmed(transaction));
        let records = unspent.address_transactions(&alice.address());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash_id, "bbbb");
    }
}
