//! Transaction handling for the ledger
//!
//! Implements the UTXO value-transfer model: a transaction consumes unspent
//! records it proves ownership of and creates new ones, or mints a reward
//! with no real inputs. The transaction id is fixed at construction and the
//! detached signature covers it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::hash::hash_fields;
use crate::crypto::keys::{self, KeyError};

/// Reference to one spendable output of an earlier transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRef {
    /// Id of the transaction that created the output
    pub hash_id: String,
    /// Output index within that transaction
    pub index: u32,
}

/// A value assignment to an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Receiving address (hex public key)
    pub address: String,
    /// Amount of currency
    pub amount: f64,
}

/// One spendable output, uniquely keyed by `(hash_id, index)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentRecord {
    pub hash_id: String,
    pub index: u32,
    pub address: String,
    pub amount: f64,
}

impl UnspentRecord {
    /// Map key of this record within an unspent set
    pub fn key(&self) -> String {
        format!("{}:{}", self.hash_id, self.index)
    }
}

/// Funding side of a transaction, fixed at construction.
///
/// A `Reward` mints new value to a miner and carries no real inputs; its
/// optional timestamp keeps otherwise-identical rewards distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputsSpec {
    /// Mints new value (coinbase); exempt from input-sum validation
    Reward(Option<DateTime<Utc>>),
    /// Consumes existing unspent records
    Spend(Vec<InputRef>),
}

impl InputsSpec {
    /// Whether this is a reward (coinbase) funding
    pub fn is_reward(&self) -> bool {
        matches!(self, InputsSpec::Reward(_))
    }
}

/// A value-transfer transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Consumed outputs, or the reward marker
    pub inputs: InputsSpec,
    /// Created outputs
    pub outputs: Vec<OutputSpec>,
    /// Transaction id, computed once at construction
    pub hash_id: String,
    /// Hex ECDSA signature over `hash_id`
    pub signature: String,
}

impl Transaction {
    /// Create a new unsigned transaction; the id is fixed here and never
    /// changes afterwards
    pub fn new(inputs: InputsSpec, outputs: Vec<OutputSpec>) -> Self {
        let hash_id = Self::compute_hash_id(&inputs, &outputs);
        Self {
            inputs,
            outputs,
            hash_id,
            signature: String::new(),
        }
    }

    /// Create and sign a spending transaction
    pub fn signed(
        inputs: Vec<InputRef>,
        outputs: Vec<OutputSpec>,
        private_key_hex: &str,
    ) -> Result<Self, KeyError> {
        let mut transaction = Self::new(InputsSpec::Spend(inputs), outputs);
        transaction.sign(private_key_hex)?;
        Ok(transaction)
    }

    /// Create a reward transaction minting `output` to a miner
    pub fn reward(timestamp: Option<DateTime<Utc>>, output: OutputSpec) -> Self {
        Self::new(InputsSpec::Reward(timestamp), vec![output])
    }

    /// Sign the transaction id with the owner's private key
    pub fn sign(&mut self, private_key_hex: &str) -> Result<(), KeyError> {
        self.signature = keys::sign(&self.hash_id, private_key_hex)?;
        Ok(())
    }

    /// Transaction id over the outputs and the funding side.
    ///
    /// Outputs contribute address and amount pairs; a reward contributes its
    /// timestamp (when present), a spend the ids of the consumed
    /// transactions.
    fn compute_hash_id(inputs: &InputsSpec, outputs: &[OutputSpec]) -> String {
        let mut fields = Vec::new();

        for output in outputs {
            fields.push(output.address.clone());
            fields.push(output.amount.to_string());
        }

        match inputs {
            InputsSpec::Reward(Some(timestamp)) => {
                fields.push(timestamp.timestamp().to_string());
            }
            InputsSpec::Reward(None) => {}
            InputsSpec::Spend(refs) => {
                for input in refs {
                    fields.push(input.hash_id.clone());
                }
            }
        }

        hash_fields(&fields)
    }
}
