//! ECDSA key management and the signing service
//!
//! Key pairs live on the secp256k1 curve. The ledger consumes a string-level
//! contract: messages, keys, and signatures are hex strings, addresses are
//! compressed public keys, and verification is total: malformed input is a
//! failed verification, never an error.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha256;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format).
    /// This doubles as the ledger address of the key pair.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a message with this key pair's private key
    pub fn sign(&self, message: &str) -> Result<String, KeyError> {
        let secp = Secp256k1::new();
        let digest = sha256(message.as_bytes());
        let message = Message::from_digest_slice(&digest)?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(signature.serialize_compact()))
    }
}

/// Sign a message with a hex-encoded private key, returning the compact
/// signature as hex
pub fn sign(message: &str, private_key_hex: &str) -> Result<String, KeyError> {
    KeyPair::from_private_key_hex(private_key_hex)?.sign(message)
}

/// Derive the hex public key for a hex-encoded private key
pub fn derive_public_key(private_key_hex: &str) -> Result<String, KeyError> {
    Ok(KeyPair::from_private_key_hex(private_key_hex)?.public_key_hex())
}

/// Validate a signature for a message against a hex-encoded public key.
///
/// Malformed keys or signatures count as a failed verification.
pub fn verify(message: &str, signature_hex: &str, public_key_hex: &str) -> bool {
    let public_key = match hex::decode(public_key_hex) {
        Ok(bytes) => match PublicKey::from_slice(&bytes) {
            Ok(key) => key,
            Err(_) => return false,
        },
        Err(_) => return false,
    };

    let signature = match hex::decode(signature_hex) {
        Ok(bytes) => match Signature::from_compact(&bytes) {
            Ok(signature) => signature,
            Err(_) => return false,
        },
        Err(_) => return false,
    };

    let digest = sha256(message.as_bytes());
    let message = match Message::from_digest_slice(&digest) {
        Ok(message) => message,
        Err(_) => return false,
    };

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}
