//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing with the canonical field encoding
//! - The ECDSA signing service (secp256k1, hex-string surface)

pub mod hash;
pub mod keys;

pub use hash::{canonical_fields, hash_fields, meets_difficulty, sha256, sha256_hex};
pub use keys::{derive_public_key, sign, verify, KeyError, KeyPair};
