//! Cryptographic hashing utilities for the ledger
//!
//! Provides the SHA-256 helpers used for block hashes and transaction ids,
//! the canonical field encoding every hash commits to, and the difficulty
//! check on leading zero bits.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Encodes a list of fields into the canonical byte form used for hashing.
///
/// Each field is emitted as `<byte length>:<utf-8 bytes>` and the pieces are
/// concatenated. The length prefix keeps the encoding unambiguous whatever
/// the field contents are.
pub fn canonical_fields(fields: &[String]) -> Vec<u8> {
    let mut data = Vec::new();
    for field in fields {
        data.extend_from_slice(field.len().to_string().as_bytes());
        data.push(b':');
        data.extend_from_slice(field.as_bytes());
    }
    data
}

/// SHA-256 over the canonical encoding of `fields`, as a hex string
pub fn hash_fields(fields: &[String]) -> String {
    sha256_hex(&canonical_fields(fields))
}

/// Checks if a hash meets the difficulty target
/// The hash must have `difficulty` leading zero bits
pub fn meets_difficulty(hash: &[u8], difficulty: u32) -> bool {
    let required_zeros = difficulty as usize / 8;
    let remaining_bits = difficulty as usize % 8;

    if required_zeros + usize::from(remaining_bits > 0) > hash.len() {
        return false;
    }

    // Check full zero bytes
    for byte in hash.iter().take(required_zeros) {
        if *byte != 0 {
            return false;
        }
    }

    // Check remaining bits
    if remaining_bits > 0 {
        let mask = 0xFF << (8 - remaining_bits);
        if hash[required_zeros] & mask != 0 {
            return false;
        }
    }

    true
}
